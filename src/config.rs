//! Runner configuration.
//!
//! Defaults mirror the reference layout of a devfile API checkout:
//! manifests under `json/v200`, fragments resolved against the checkout root,
//! generated documents under `tmp/v200`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::ConformanceError;

pub const DEFAULT_MANIFEST_SUFFIX: &str = "-tests.json";
pub const DEFAULT_SCHEMA_VERSION: &str = "2.0.0";

/// Configuration for discovery, assembly and reporting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Directory scanned (non-recursively) for manifest files.
    pub manifest_dir: PathBuf,
    /// Root that manifest fragment paths are resolved against.
    pub fixture_root: PathBuf,
    /// Scratch root, wiped and recreated at the start of every run.
    pub work_root: PathBuf,
    /// Sub-directory of `work_root` receiving generated documents.
    pub output_subdir: String,
    /// Version written into the header line of every generated document.
    pub schema_version: String,
    pub manifest_suffix: String,
    /// Only report failures.
    pub errors_only: bool,
    /// Remove `work_root` once the run completes.
    pub clean_after: bool,
    /// Case-insensitive substring; sub-tests whose FileName does not contain it are skipped.
    pub filter: Option<String>,
    #[serde(skip)]
    pub use_colors: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            manifest_dir: PathBuf::from("json/v200"),
            fixture_root: PathBuf::from("."),
            work_root: PathBuf::from("tmp"),
            output_subdir: "v200".to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            manifest_suffix: DEFAULT_MANIFEST_SUFFIX.to_string(),
            errors_only: false,
            clean_after: false,
            filter: None,
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl RunnerConfig {
    /// Loads a YAML config file. Keys that are absent keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConformanceError> {
        let content = fs::read_to_string(path).map_err(|e| ConformanceError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config: RunnerConfig =
            serde_yaml::from_str(&content).map_err(|e| ConformanceError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.use_colors = atty::is(atty::Stream::Stdout);
        Ok(config)
    }

    /// Directory generated documents are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.work_root.join(&self.output_subdir)
    }

    /// Header line opening every generated document.
    pub fn header_line(&self) -> String {
        format!("schemaVersion: \"{}\"\n", self.schema_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_reference_layout() {
        let config = RunnerConfig::default();
        assert_eq!(config.output_dir(), PathBuf::from("tmp").join("v200"));
        assert_eq!(config.header_line(), "schemaVersion: \"2.0.0\"\n");
        assert_eq!(config.manifest_suffix, "-tests.json");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conformance.yaml");
        fs::write(&path, "manifest_dir: suites\nerrors_only: true\n").unwrap();

        let config = RunnerConfig::load(&path).unwrap();
        assert_eq!(config.manifest_dir, PathBuf::from("suites"));
        assert!(config.errors_only);
        assert_eq!(config.schema_version, "2.0.0");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conformance.yaml");
        fs::write(&path, "manifests: suites\n").unwrap();

        let err = RunnerConfig::load(&path).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
