//! Built-in devfile parser and validator.
//!
//! Parsing runs in three passes:
//! 1. **Syntax**: the document is read as a YAML tree.
//! 2. **Schema**: `schemaVersion` picks the structural rules, which are checked
//!    on the untyped tree so errors can name the offending location.
//! 3. **Semantics**: the tree is deserialized into the version's typed model
//!    and cross references are resolved.
//!
//! Only the 2.0.x line is understood. Parent flattening, plugin resolution and
//! registry lookups are not performed.

use std::fs;
use std::path::{Path, PathBuf};

use miette::{NamedSource, SourceSpan};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use tracing::debug;

use crate::validator::{DocumentValidator, ParsedDocument, ValidationError};

pub mod model;
mod schema;
mod semantic;

pub use model::DevfileV200;

static SEMVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(-[0-9A-Za-z.-]+)?$")
        .expect("valid semver pattern")
});

/// Version-specific representation of a parsed devfile.
#[derive(Debug, Clone, PartialEq)]
pub enum DevfileData {
    V200(DevfileV200),
}

impl DevfileData {
    pub fn schema_version(&self) -> &str {
        match self {
            DevfileData::V200(d) => &d.schema_version,
        }
    }
}

/// A parsed, validated devfile together with where it came from.
#[derive(Debug, Clone)]
pub struct DevfileObj {
    pub path: PathBuf,
    pub data: DevfileData,
}

impl ParsedDocument for DevfileObj {
    fn declared_version(&self) -> Option<&str> {
        Some(self.data.schema_version())
    }
}

/// Reads the file at `path` and runs every validation pass.
pub fn parse_and_validate(path: &Path) -> Result<DevfileObj, ValidationError> {
    let content = fs::read_to_string(path).map_err(|e| ValidationError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let data = parse_str(&path.display().to_string(), &content)?;
    Ok(DevfileObj {
        path: path.to_path_buf(),
        data,
    })
}

/// Parses and validates devfile text. `name` labels syntax diagnostics.
pub fn parse_str(name: &str, content: &str) -> Result<DevfileData, ValidationError> {
    let tree: Value = serde_yaml::from_str(content).map_err(|e| syntax_error(name, content, &e))?;
    let Some(root) = tree.as_mapping() else {
        return Err(ValidationError::schema(
            "devfile",
            "document must be a mapping",
        ));
    };

    let version = match root.get("schemaVersion") {
        Some(Value::String(v)) => v.as_str(),
        Some(Value::Null) | None => {
            return Err(ValidationError::schema(
                "devfile",
                "missing required field: schemaVersion",
            ))
        }
        Some(_) => {
            return Err(ValidationError::schema(
                "schemaVersion",
                "invalid type: expected string",
            ))
        }
    };
    let Some(captures) = SEMVER.captures(version) else {
        return Err(ValidationError::schema(
            "schemaVersion",
            format!("{:?} is not a semantic version", version),
        ));
    };
    debug!(version, "dispatching on schemaVersion");

    match (&captures[1], &captures[2]) {
        ("2", "0") => {
            schema::check_v200(root)?;
            let devfile: DevfileV200 = serde_yaml::from_value(tree.clone())
                .map_err(|e| ValidationError::schema("devfile", e.to_string()))?;
            semantic::check(&devfile)?;
            Ok(DevfileData::V200(devfile))
        }
        _ => Err(ValidationError::UnsupportedVersion(version.to_string())),
    }
}

fn syntax_error(name: &str, content: &str, error: &serde_yaml::Error) -> ValidationError {
    let span = error
        .location()
        .map(|loc| SourceSpan::from((loc.index().min(content.len()), 0)));
    ValidationError::Syntax {
        message: error.to_string(),
        src: NamedSource::new(name, content.to_string()),
        span,
    }
}

/// [`DocumentValidator`] backed by the built-in parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinValidator;

impl DocumentValidator for BuiltinValidator {
    fn name(&self) -> &str {
        "builtin"
    }

    fn parse_and_validate(&self, path: &Path) -> Result<Box<dyn ParsedDocument>, ValidationError> {
        parse_and_validate(path).map(|obj| Box::new(obj) as Box<dyn ParsedDocument>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_2_0_x_to_v200() {
        let data = parse_str("d.yaml", "schemaVersion: \"2.0.0\"\nmetadata:\n  name: x\n").unwrap();
        assert_eq!(data.schema_version(), "2.0.0");
        let DevfileData::V200(devfile) = data;
        assert_eq!(devfile.metadata.unwrap().name.as_deref(), Some("x"));
    }

    #[test]
    fn other_versions_are_unsupported() {
        let err = parse_str("d.yaml", "schemaVersion: \"2.1.0\"\n").unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedVersion(ref v) if v == "2.1.0"));
    }

    #[test]
    fn version_must_be_semver() {
        let err = parse_str("d.yaml", "schemaVersion: \"two\"\n").unwrap_err();
        assert!(err.to_string().contains("is not a semantic version"));
    }

    #[test]
    fn missing_version() {
        let err = parse_str("d.yaml", "metadata:\n  name: x\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "schema error: missing required field: schemaVersion at devfile"
        );
    }

    #[test]
    fn syntax_errors_carry_a_location() {
        let err = parse_str("d.yaml", "schemaVersion: \"2.0.0\"\ncomponents: [\n").unwrap_err();
        match err {
            ValidationError::Syntax { span, message, .. } => {
                assert!(span.is_some());
                assert!(!message.is_empty());
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn explicit_nulls_read_as_empty() {
        let yaml = "schemaVersion: \"2.0.0\"
components:
  - name: tools
    container:
      image: quay.io/devfile/tools
      env: ~
      endpoints: ~
commands:
  - id: build
    exec:
      component: tools
      commandLine: make
      group:
        kind: build
        isDefault: ~
projects: ~
events:
  preStart: ~
";
        let DevfileData::V200(devfile) = parse_str("d.yaml", yaml).unwrap();
        assert!(devfile.projects.is_empty());
        assert!(devfile.components[0].endpoints().is_empty());
        assert!(devfile.events.unwrap().pre_start.is_empty());

        let data = parse_str("d.yaml", "schemaVersion: \"2.0.0\"\ncomponents: ~\n").unwrap();
        let DevfileData::V200(devfile) = data;
        assert!(devfile.components.is_empty());
    }

    #[test]
    fn non_mapping_documents_are_rejected() {
        let err = parse_str("d.yaml", "- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("document must be a mapping"));
    }

    #[test]
    fn builtin_validator_reports_declared_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devfile.yaml");
        fs::write(&path, "schemaVersion: \"2.0.0\"\n").unwrap();
        let doc = BuiltinValidator.parse_and_validate(&path).unwrap();
        assert_eq!(doc.declared_version(), Some("2.0.0"));

        let err = BuiltinValidator
            .parse_and_validate(&dir.path().join("absent.yaml"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::Read { .. }));
    }
}
