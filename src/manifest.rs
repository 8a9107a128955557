//! Test manifest discovery and loading.
//!
//! A manifest is a JSON file declaring the sub-tests to run:
//!
//! ```json
//! { "Tests": [
//!     { "FileName": "test-basic.yaml", "Disabled": false,
//!       "ExpectOutcome": "PASS", "Files": ["snippets/components.yaml"] }
//! ]}
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::errors::ConformanceError;

/// One decoded manifest file. Sub-test order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestManifest {
    #[serde(rename = "Tests", default)]
    pub tests: Vec<SubTestDescriptor>,
}

/// A single sub-test: which fragments to concatenate and what to expect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTestDescriptor {
    /// Name of the generated document inside the output directory.
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "Disabled", default)]
    pub disabled: bool,
    /// `PASS`, or a substring expected in the validation error.
    #[serde(rename = "ExpectOutcome", default)]
    pub expect_outcome: String,
    /// Fragment paths, relative to the fixture root.
    #[serde(rename = "Files", default)]
    pub files: Vec<String>,
}

impl TestManifest {
    /// Number of sub-tests that are not disabled.
    pub fn enabled_count(&self) -> usize {
        self.tests.iter().filter(|t| !t.disabled).count()
    }
}

/// Returns true if the file name marks a test manifest.
fn is_manifest_file(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(suffix))
}

/// Lists manifest files directly inside `dir`.
///
/// Symlinks are kept unless they resolve to a directory, so a dangling link
/// surfaces later as an open failure. The returned list is sorted to keep
/// reporting order deterministic.
pub fn discover_manifest_files<P: AsRef<Path>>(
    dir: P,
    suffix: &str,
) -> Result<Vec<PathBuf>, ConformanceError> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ConformanceError::Discovery {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let candidate = if entry.path_is_symlink() {
            !entry.path().is_dir()
        } else {
            entry.file_type().is_file()
        };
        if !candidate {
            continue;
        }
        if !is_manifest_file(entry.path(), suffix) {
            continue;
        }
        files.push(entry.path().to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// Reads and decodes one manifest file.
pub fn load_manifest(path: &Path) -> Result<TestManifest, ConformanceError> {
    let content = fs::read(path).map_err(|e| ConformanceError::ManifestOpen {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_manifest(path, &content)
}

/// Decodes manifest JSON; `path` is only used for error reporting.
pub fn parse_manifest(
    path: &Path,
    content: impl AsRef<[u8]>,
) -> Result<TestManifest, ConformanceError> {
    serde_json::from_slice(content.as_ref()).map_err(|e| ConformanceError::ManifestDecode {
        path: path.to_path_buf(),
        source: e,
    })
}
