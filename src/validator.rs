//! The parse-and-validate seam.
//!
//! The runner only knows [`DocumentValidator`]; which parser sits behind it is
//! a configuration choice. Two implementations ship with the crate: the
//! built-in [`crate::devfile::BuiltinValidator`] and [`CommandValidator`],
//! which shells out to an external tool.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::debug;

/// A successfully parsed and validated document.
pub trait ParsedDocument: fmt::Debug {
    /// The schema version the document declares, if the parser exposes it.
    fn declared_version(&self) -> Option<&str>;
}

/// Parses a document at `path` and validates it.
pub trait DocumentValidator {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn parse_and_validate(&self, path: &Path) -> Result<Box<dyn ParsedDocument>, ValidationError>;
}

/// Why a document was rejected. The `Display` output is what manifests match
/// their expected-outcome substrings against.
#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("failed to read devfile {path}: {source}")]
    #[diagnostic(code(devfile::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml syntax error: {message}")]
    #[diagnostic(code(devfile::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("schema error: {detail} at {location}")]
    #[diagnostic(code(devfile::schema))]
    Schema { location: String, detail: String },

    #[error("validation error: {0}")]
    #[diagnostic(code(devfile::validation))]
    Semantic(String),

    #[error("unsupported schemaVersion {0:?}")]
    #[diagnostic(
        code(devfile::unsupported_version),
        help("only 2.0.x documents are understood by the built-in validator")
    )]
    UnsupportedVersion(String),

    #[error("failed to run validator command {program}: {source}")]
    #[diagnostic(code(devfile::external::spawn))]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    #[diagnostic(code(devfile::external::rejected))]
    External { program: String, message: String },
}

impl ValidationError {
    pub fn schema(location: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Schema {
            location: location.into(),
            detail: detail.into(),
        }
    }

    pub fn semantic(detail: impl Into<String>) -> Self {
        Self::Semantic(detail.into())
    }
}

/// Document accepted by an external command. The tool's output is opaque, so no
/// version is reported.
#[derive(Debug)]
pub struct ExternalDocument {
    pub path: PathBuf,
}

impl ParsedDocument for ExternalDocument {
    fn declared_version(&self) -> Option<&str> {
        None
    }
}

/// Validates by running `program args... <path>`; a non-zero exit is a rejection.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    program: String,
    args: Vec<String>,
}

impl CommandValidator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl DocumentValidator for CommandValidator {
    fn name(&self) -> &str {
        &self.program
    }

    fn parse_and_validate(&self, path: &Path) -> Result<Box<dyn ParsedDocument>, ValidationError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| ValidationError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;
        debug!(program = %self.program, status = %output.status, "validator command finished");

        if output.status.success() {
            return Ok(Box::new(ExternalDocument {
                path: path.to_path_buf(),
            }));
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        let message = if message.is_empty() {
            format!("{} exited with {}", self.program, output.status)
        } else {
            message
        };
        Err(ValidationError::External {
            program: self.program.clone(),
            message,
        })
    }
}
