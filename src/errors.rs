//! Runner error handling.
//!
//! Every failure the runner can hit outside the validator lives here. Most of
//! them are recovered at the sub-test or manifest level and turned into a
//! recorded failure; only work-dir preparation and manifest discovery abort a
//! run.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while discovering, loading and assembling conformance tests.
#[derive(Debug, Error, Diagnostic)]
pub enum ConformanceError {
    #[error("failed to prepare work directory {path}: {source}")]
    #[diagnostic(code(conformance::work_dir))]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to wipe work directory {path}: {reason}")]
    #[diagnostic(
        code(conformance::unsafe_work_dir),
        help("point --work-dir at a dedicated scratch directory")
    )]
    UnsafeWorkDir { path: PathBuf, reason: String },

    #[error("failed to scan manifest directory {path}: {source}")]
    #[diagnostic(code(conformance::discovery))]
    Discovery {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to open manifest {path}: {source}")]
    #[diagnostic(code(conformance::manifest::open))]
    ManifestOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode manifest {path}: {source}")]
    #[diagnostic(code(conformance::manifest::decode))]
    ManifestDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed reading fragment {path}: {source}")]
    #[diagnostic(code(conformance::fragment))]
    FragmentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write generated document {path}: {source}")]
    #[diagnostic(code(conformance::document_write))]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid output file name {name:?}: {reason}")]
    #[diagnostic(code(conformance::file_name))]
    InvalidFileName { name: String, reason: String },

    #[error("output file name {name:?} is already used by {claimed_by}")]
    #[diagnostic(
        code(conformance::duplicate_file_name),
        help("every FileName must be unique across all manifests of a run")
    )]
    DuplicateFileName { name: String, claimed_by: String },

    #[error("failed to load config {path}: {message}")]
    #[diagnostic(code(conformance::config))]
    Config { path: PathBuf, message: String },
}

impl ConformanceError {
    /// True for errors caused by how the tests were authored rather than by I/O.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFileName { .. }
                | Self::DuplicateFileName { .. }
                | Self::UnsafeWorkDir { .. }
                | Self::Config { .. }
        )
    }
}

/// Prints an error with full miette diagnostics to stderr.
pub fn print_error<E>(error: E)
where
    E: Diagnostic + Send + Sync + 'static,
{
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
