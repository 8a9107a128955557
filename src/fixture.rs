//! Fixture assembly: turns a sub-test descriptor into a generated devfile.
//!
//! A generated document is the header line followed by every fragment's raw
//! bytes, with a single newline between consecutive fragments.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::config::RunnerConfig;
use crate::errors::ConformanceError;
use crate::manifest::SubTestDescriptor;

/// A fully written, closed document ready for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub path: PathBuf,
    pub bytes_written: usize,
}

/// Why a document could not be assembled. Every unreadable fragment is listed.
#[derive(Debug)]
pub struct AssemblyFailure {
    pub errors: Vec<ConformanceError>,
}

impl AssemblyFailure {
    fn single(error: ConformanceError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// True if the failure stems from test authoring rather than I/O.
    pub fn is_configuration_error(&self) -> bool {
        self.errors.iter().any(ConformanceError::is_configuration_error)
    }

    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Writes `header` then `fragments`, inserting one `\n` between fragments.
pub fn write_document<W: Write, F: AsRef<[u8]>>(
    out: &mut W,
    header: &str,
    fragments: &[F],
) -> io::Result<usize> {
    let mut written = 0;
    out.write_all(header.as_bytes())?;
    written += header.len();
    for (i, fragment) in fragments.iter().enumerate() {
        if i > 0 {
            out.write_all(b"\n")?;
            written += 1;
        }
        out.write_all(fragment.as_ref())?;
        written += fragment.as_ref().len();
    }
    Ok(written)
}

/// Checks that an output name is a single plain path component.
pub fn validate_file_name(name: &str) -> Result<(), ConformanceError> {
    let invalid = |reason: &str| ConformanceError::InvalidFileName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("must be a plain file name without directories")),
    }
}

/// Deletes and recreates the work root and its output sub-directory.
pub fn prepare_work_dir(config: &RunnerConfig) -> Result<PathBuf, ConformanceError> {
    let root = &config.work_root;
    ensure_safe_to_wipe(root, config)?;

    if root.exists() {
        debug!(path = %root.display(), "wiping work directory");
        fs::remove_dir_all(root).map_err(|e| ConformanceError::WorkDir {
            path: root.clone(),
            source: e,
        })?;
    }
    let output_dir = config.output_dir();
    fs::create_dir_all(&output_dir).map_err(|e| ConformanceError::WorkDir {
        path: output_dir.clone(),
        source: e,
    })?;
    Ok(output_dir)
}

/// Removes the work root after a run.
pub fn remove_work_dir(config: &RunnerConfig) -> Result<(), ConformanceError> {
    let root = &config.work_root;
    ensure_safe_to_wipe(root, config)?;
    if root.exists() {
        fs::remove_dir_all(root).map_err(|e| ConformanceError::WorkDir {
            path: root.clone(),
            source: e,
        })?;
    }
    Ok(())
}

fn ensure_safe_to_wipe(root: &Path, config: &RunnerConfig) -> Result<(), ConformanceError> {
    let unsafe_dir = |reason: &str| ConformanceError::UnsafeWorkDir {
        path: root.to_path_buf(),
        reason: reason.to_string(),
    };
    if root.as_os_str().is_empty() || root == Path::new(".") {
        return Err(unsafe_dir("work directory must not be the current directory"));
    }
    if root.parent().is_none() {
        return Err(unsafe_dir("work directory must not be a filesystem root"));
    }
    let root = absolute(root);
    if absolute(&config.manifest_dir).starts_with(&root) {
        return Err(unsafe_dir("it contains the manifest directory"));
    }
    if absolute(&config.fixture_root).starts_with(&root) {
        return Err(unsafe_dir("it contains the fixture root"));
    }
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    // Lexical normalisation only; the paths may not exist yet.
    let mut normal = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other.as_os_str()),
        }
    }
    normal
}

/// Builds generated documents from fragments under a fixture root.
#[derive(Debug, Clone)]
pub struct FixtureAssembler {
    fixture_root: PathBuf,
    output_dir: PathBuf,
    header: String,
}

impl FixtureAssembler {
    pub fn new(
        fixture_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        header: impl Into<String>,
    ) -> Self {
        Self {
            fixture_root: fixture_root.into(),
            output_dir: output_dir.into(),
            header: header.into(),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(
            config.fixture_root.clone(),
            config.output_dir(),
            config.header_line(),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reads every fragment of `descriptor`, then writes the document.
    ///
    /// Nothing is written if any fragment is unreadable. The file is flushed
    /// and closed before this returns.
    pub fn assemble(
        &self,
        descriptor: &SubTestDescriptor,
    ) -> Result<GeneratedDocument, AssemblyFailure> {
        validate_file_name(&descriptor.file_name).map_err(AssemblyFailure::single)?;

        let mut fragments = Vec::with_capacity(descriptor.files.len());
        let mut errors = Vec::new();
        for fragment in &descriptor.files {
            let path = self.fixture_root.join(fragment);
            match fs::read(&path) {
                Ok(bytes) => fragments.push(bytes),
                Err(e) => errors.push(ConformanceError::FragmentRead { path, source: e }),
            }
        }
        if !errors.is_empty() {
            return Err(AssemblyFailure { errors });
        }

        let path = self.output_dir.join(&descriptor.file_name);
        let bytes_written = self
            .write_file(&path, &fragments)
            .map_err(|e| AssemblyFailure::single(ConformanceError::DocumentWrite {
                path: path.clone(),
                source: e,
            }))?;
        debug!(
            document = %path.display(),
            fragments = fragments.len(),
            bytes = bytes_written,
            "assembled document"
        );
        Ok(GeneratedDocument {
            path,
            bytes_written,
        })
    }

    fn write_file(&self, path: &Path, fragments: &[Vec<u8>]) -> io::Result<usize> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let written = write_document(&mut writer, &self.header, fragments)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "schemaVersion: \"2.0.0\"\n";

    fn render(fragments: &[&str]) -> String {
        let mut out = Vec::new();
        write_document(&mut out, HEADER, fragments).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn fragments_are_separated_by_a_single_newline() {
        assert_eq!(
            render(&["a: 1", "b: 2\n"]),
            "schemaVersion: \"2.0.0\"\na: 1\nb: 2\n"
        );
        assert_eq!(render(&[]), HEADER);
        assert_eq!(render(&["only"]), format!("{HEADER}only"));
    }

    #[test]
    fn swapping_fragments_only_moves_the_separator() {
        let ab = render(&["A", "B"]);
        let ba = render(&["B", "A"]);
        assert_eq!(ab, format!("{HEADER}A\nB"));
        assert_eq!(ba, format!("{HEADER}B\nA"));
        assert_eq!(ab.len(), ba.len());
    }

    #[test]
    fn file_names_must_be_plain() {
        assert!(validate_file_name("test.yaml").is_ok());
        for bad in ["", "  ", "../escape.yaml", "dir/test.yaml", "/abs.yaml", "."] {
            let err = validate_file_name(bad).unwrap_err();
            assert!(err.is_configuration_error(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn assembly_truncates_previous_content() {
        let fixtures = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(fixtures.path().join("frag.yaml"), "metadata:\n  name: x\n").unwrap();
        fs::write(out.path().join("doc.yaml"), "stale content that is much longer\n".repeat(10))
            .unwrap();

        let assembler = FixtureAssembler::new(fixtures.path(), out.path(), HEADER);
        let descriptor = SubTestDescriptor {
            file_name: "doc.yaml".into(),
            files: vec!["frag.yaml".into()],
            ..Default::default()
        };
        let doc = assembler.assemble(&descriptor).unwrap();
        let content = fs::read_to_string(&doc.path).unwrap();
        assert_eq!(content, format!("{HEADER}metadata:\n  name: x\n"));
        assert_eq!(doc.bytes_written, content.len());
    }

    #[test]
    fn unreadable_fragments_are_all_reported_and_nothing_is_written() {
        let fixtures = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(fixtures.path().join("ok.yaml"), "a: 1").unwrap();

        let assembler = FixtureAssembler::new(fixtures.path(), out.path(), HEADER);
        let descriptor = SubTestDescriptor {
            file_name: "doc.yaml".into(),
            files: vec!["missing-1.yaml".into(), "ok.yaml".into(), "missing-2.yaml".into()],
            ..Default::default()
        };
        let failure = assembler.assemble(&descriptor).unwrap_err();
        assert_eq!(failure.errors.len(), 2);
        assert!(!failure.is_configuration_error());
        assert!(failure.message().contains("missing-1.yaml"));
        assert!(failure.message().contains("missing-2.yaml"));
        assert!(!out.path().join("doc.yaml").exists());
    }

    #[test]
    fn prepare_wipes_previous_run() {
        let scratch = tempfile::tempdir().unwrap();
        let config = RunnerConfig {
            work_root: scratch.path().join("tmp"),
            manifest_dir: scratch.path().join("json"),
            fixture_root: scratch.path().join("fixtures"),
            ..Default::default()
        };
        let output_dir = prepare_work_dir(&config).unwrap();
        fs::write(output_dir.join("old.yaml"), "x").unwrap();

        let output_dir = prepare_work_dir(&config).unwrap();
        assert!(output_dir.is_dir());
        assert!(!output_dir.join("old.yaml").exists());

        remove_work_dir(&config).unwrap();
        assert!(!config.work_root.exists());
    }

    #[test]
    fn refuses_to_wipe_inputs() {
        let scratch = tempfile::tempdir().unwrap();
        let config = RunnerConfig {
            work_root: scratch.path().to_path_buf(),
            manifest_dir: scratch.path().join("json"),
            fixture_root: PathBuf::from("/nonexistent-fixtures"),
            ..Default::default()
        };
        let err = prepare_work_dir(&config).unwrap_err();
        assert!(matches!(err, ConformanceError::UnsafeWorkDir { .. }));

        let config = RunnerConfig {
            work_root: PathBuf::from("."),
            ..Default::default()
        };
        assert!(prepare_work_dir(&config).is_err());
    }
}
