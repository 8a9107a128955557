//! # Conformance Test Helpers
//!
//! Scratch workspaces with manifests and fragments on disk, and a validator
//! stub whose verdict is driven by the document text.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use devfile_conformance::runner::{RunReport, SubTestResult, SubTestStatus};
use devfile_conformance::outcome::Verdict;
use devfile_conformance::{DocumentValidator, ParsedDocument, RunnerConfig, ValidationError};
use tempfile::TempDir;

/// Line prefix that makes [`StubValidator`] reject a document.
pub const REJECT: &str = "reject: ";

#[derive(Debug)]
struct StubDocument;

impl ParsedDocument for StubDocument {
    fn declared_version(&self) -> Option<&str> {
        Some("2.0.0")
    }
}

/// Accepts every document unless a line starts with [`REJECT`]; the rest of
/// that line becomes the validation error. Records what it was handed.
#[derive(Debug, Default)]
pub struct StubValidator {
    seen: RefCell<Vec<(PathBuf, String)>>,
}

impl StubValidator {
    pub fn seen(&self) -> Vec<(PathBuf, String)> {
        self.seen.borrow().clone()
    }
}

impl DocumentValidator for StubValidator {
    fn name(&self) -> &str {
        "stub"
    }

    fn parse_and_validate(&self, path: &Path) -> Result<Box<dyn ParsedDocument>, ValidationError> {
        let content = fs::read_to_string(path).map_err(|e| ValidationError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.seen
            .borrow_mut()
            .push((path.to_path_buf(), content.clone()));
        match content.lines().find_map(|line| line.strip_prefix(REJECT)) {
            Some(reason) => Err(ValidationError::Semantic(reason.to_string())),
            None => Ok(Box::new(StubDocument)),
        }
    }
}

/// A temporary directory laid out as `manifests/`, `fixtures/` and `tmp/`.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join("manifests")).expect("create manifest dir");
        fs::create_dir_all(dir.path().join("fixtures")).expect("create fixture dir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn fragment(&self, relative: &str, content: &str) -> &Self {
        let path = self.path().join("fixtures").join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fragment dir");
        }
        fs::write(path, content).expect("write fragment");
        self
    }

    pub fn manifest(&self, name: &str, json: &str) -> &Self {
        fs::write(self.path().join("manifests").join(name), json).expect("write manifest");
        self
    }

    pub fn config(&self) -> RunnerConfig {
        RunnerConfig {
            manifest_dir: self.path().join("manifests"),
            fixture_root: self.path().join("fixtures"),
            work_root: self.path().join("tmp"),
            use_colors: false,
            ..RunnerConfig::default()
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config().output_dir()
    }
}

/// Builds a one-entry manifest body.
pub fn single_test(file_name: &str, expect: &str, files: &[&str]) -> String {
    serde_json::json!({
        "Tests": [{
            "FileName": file_name,
            "Disabled": false,
            "ExpectOutcome": expect,
            "Files": files,
        }]
    })
    .to_string()
}

/// Every result of a run, flattened across manifests.
pub fn results(report: &RunReport) -> Vec<&SubTestResult> {
    report.manifests.iter().flat_map(|m| m.results.iter()).collect()
}

pub fn verdict(result: &SubTestResult) -> &Verdict {
    match &result.status {
        SubTestStatus::Ran { verdict, .. } => verdict,
        SubTestStatus::Skipped { reason } => panic!("{} was skipped: {}", result.file_name, reason),
    }
}
