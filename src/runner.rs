//! Conformance run orchestration.
//!
//! Execution is phase based:
//! 1. **Prepare**: wipe and recreate the work directory
//! 2. **Discover**: list manifest files
//! 3. **Per manifest**: load, then for every enabled sub-test assemble,
//!    validate and check the outcome
//! 4. **Aggregate**: every manifest returns its own tally; the run sums them
//!
//! Failures are recorded and iteration continues. Only preparation and
//! discovery errors end a run early.

use std::collections::HashMap;
use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::config::RunnerConfig;
use crate::errors::ConformanceError;
use crate::fixture::{self, FixtureAssembler};
use crate::manifest::{self, SubTestDescriptor};
use crate::outcome::{self, Expectation, Failure, Phase, PhaseTracker, ValidationOutcome, Verdict};
use crate::validator::DocumentValidator;

// =============================================================================
// RESULTS
// =============================================================================

/// Attempted/passed/skipped counters for one unit of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub attempted: usize,
    pub passed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn failed(&self) -> usize {
        self.attempted - self.passed
    }
}

impl Add for Tally {
    type Output = Tally;

    fn add(self, other: Tally) -> Tally {
        Tally {
            attempted: self.attempted + other.attempted,
            passed: self.passed + other.passed,
            skipped: self.skipped + other.skipped,
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, other: Tally) {
        *self = *self + other;
    }
}

/// How a single sub-test ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubTestStatus {
    Ran { verdict: Verdict, phase: Phase },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubTestResult {
    pub file_name: String,
    pub expect_outcome: String,
    pub document: Option<PathBuf>,
    #[serde(flatten)]
    pub status: SubTestStatus,
}

impl SubTestResult {
    pub fn is_pass(&self) -> bool {
        matches!(&self.status, SubTestStatus::Ran { verdict, .. } if verdict.is_pass())
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, SubTestStatus::Skipped { .. })
    }
}

/// Outcome of one manifest file.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestReport {
    pub path: PathBuf,
    /// Set when the manifest could not be opened or decoded.
    pub load_error: Option<String>,
    pub results: Vec<SubTestResult>,
}

impl ManifestReport {
    pub fn tally(&self) -> Tally {
        self.results.iter().fold(Tally::default(), |mut t, r| {
            if r.is_skipped() {
                t.skipped += 1;
            } else {
                t.attempted += 1;
                if r.is_pass() {
                    t.passed += 1;
                }
            }
            t
        })
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub validator: String,
    pub manifests: Vec<ManifestReport>,
    pub totals: Tally,
    /// Set when `clean_after` could not remove the work directory.
    pub cleanup_error: Option<String>,
}

impl RunReport {
    fn new(validator: String, manifests: Vec<ManifestReport>) -> Self {
        let totals = manifests
            .iter()
            .map(ManifestReport::tally)
            .fold(Tally::default(), |acc, t| acc + t);
        Self {
            validator,
            manifests,
            totals,
            cleanup_error: None,
        }
    }

    pub fn load_errors(&self) -> usize {
        self.manifests.iter().filter(|m| m.load_error.is_some()).count()
    }

    /// A run passes when every attempted sub-test passed, every manifest
    /// loaded and the requested cleanup succeeded.
    pub fn is_success(&self) -> bool {
        self.totals.failed() == 0 && self.load_errors() == 0 && self.cleanup_error.is_none()
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Drives manifests through assembly, validation and outcome checking.
pub struct ConformanceRunner<'a> {
    config: &'a RunnerConfig,
    validator: &'a dyn DocumentValidator,
    assembler: FixtureAssembler,
}

impl<'a> ConformanceRunner<'a> {
    pub fn new(config: &'a RunnerConfig, validator: &'a dyn DocumentValidator) -> Self {
        Self {
            config,
            validator,
            assembler: FixtureAssembler::from_config(config),
        }
    }

    /// Runs every manifest found in the configured directory.
    pub fn run(&self) -> Result<RunReport, ConformanceError> {
        let output_dir = fixture::prepare_work_dir(self.config)?;
        debug!(output_dir = %output_dir.display(), "work directory ready");

        let files =
            manifest::discover_manifest_files(&self.config.manifest_dir, &self.config.manifest_suffix)?;
        info!(
            count = files.len(),
            dir = %self.config.manifest_dir.display(),
            validator = self.validator.name(),
            "discovered manifests"
        );

        let mut claimed = HashMap::new();
        let manifests: Vec<ManifestReport> = files
            .iter()
            .map(|path| self.run_manifest(path, &mut claimed))
            .collect();

        let mut report = RunReport::new(self.validator.name().to_string(), manifests);
        if self.config.clean_after {
            if let Err(e) = fixture::remove_work_dir(self.config) {
                warn!(error = %e, "failed to clean work directory");
                report.cleanup_error = Some(e.to_string());
            }
        }
        Ok(report)
    }

    /// Runs one manifest. `claimed` maps output names already used in this run
    /// to the manifest that used them.
    pub fn run_manifest(
        &self,
        path: &Path,
        claimed: &mut HashMap<String, String>,
    ) -> ManifestReport {
        let _span = info_span!("manifest", path = %path.display()).entered();
        let manifest = match manifest::load_manifest(path) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(error = %e, "skipping manifest");
                return ManifestReport {
                    path: path.to_path_buf(),
                    load_error: Some(e.to_string()),
                    results: Vec::new(),
                };
            }
        };

        let owner = path.display().to_string();
        let results = manifest
            .tests
            .iter()
            .filter(|descriptor| !descriptor.disabled)
            .map(|descriptor| match self.skip_reason(descriptor) {
                Some(reason) => SubTestResult {
                    file_name: descriptor.file_name.clone(),
                    expect_outcome: descriptor.expect_outcome.clone(),
                    document: None,
                    status: SubTestStatus::Skipped { reason },
                },
                None => self.run_sub_test(descriptor, &owner, claimed),
            })
            .collect();

        ManifestReport {
            path: path.to_path_buf(),
            load_error: None,
            results,
        }
    }

    fn skip_reason(&self, descriptor: &SubTestDescriptor) -> Option<String> {
        let filter = self.config.filter.as_deref()?.to_lowercase();
        if descriptor.file_name.to_lowercase().contains(&filter) {
            None
        } else {
            Some(format!("Filtered out by substring: {}", filter))
        }
    }

    /// Assembles, validates and checks one enabled sub-test.
    pub fn run_sub_test(
        &self,
        descriptor: &SubTestDescriptor,
        owner: &str,
        claimed: &mut HashMap<String, String>,
    ) -> SubTestResult {
        let mut phases = PhaseTracker::default();
        let finish = |phases: &mut PhaseTracker, document: Option<PathBuf>, verdict: Verdict| {
            let phase = phases.furthest();
            phases.advance(Phase::Checked);
            debug!(
                file = %descriptor.file_name,
                ?phase,
                pass = verdict.is_pass(),
                "sub-test checked"
            );
            SubTestResult {
                file_name: descriptor.file_name.clone(),
                expect_outcome: descriptor.expect_outcome.clone(),
                document,
                status: SubTestStatus::Ran { verdict, phase },
            }
        };

        phases.advance(Phase::Assembling);
        if let Some(first) = claimed.get(&descriptor.file_name) {
            let error = ConformanceError::DuplicateFileName {
                name: descriptor.file_name.clone(),
                claimed_by: first.clone(),
            };
            phases.advance(Phase::AssemblyFailed);
            let verdict = Verdict::Fail(Failure::Configuration {
                message: error.to_string(),
            });
            return finish(&mut phases, None, verdict);
        }

        let document = match self.assembler.assemble(descriptor) {
            Ok(document) => {
                claimed.insert(descriptor.file_name.clone(), owner.to_string());
                phases.advance(Phase::Assembled);
                document
            }
            Err(failure) => {
                phases.advance(Phase::AssemblyFailed);
                let message = failure.message();
                let verdict = if failure.is_configuration_error() {
                    Verdict::Fail(Failure::Configuration { message })
                } else {
                    Verdict::Fail(Failure::Incomplete { message })
                };
                return finish(&mut phases, None, verdict);
            }
        };

        let outcome = match self.validator.parse_and_validate(&document.path) {
            Ok(parsed) => {
                phases.advance(Phase::Validated);
                ValidationOutcome::Valid {
                    declared_version: parsed.declared_version().map(str::to_string),
                }
            }
            Err(error) => {
                phases.advance(Phase::ValidationFailed);
                ValidationOutcome::Invalid {
                    message: error.to_string(),
                }
            }
        };

        let expectation = Expectation::parse(&descriptor.expect_outcome);
        let verdict = outcome::check(&outcome, &expectation);
        finish(&mut phases, Some(document.path), verdict)
    }
}
