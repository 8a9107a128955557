//! Expected-outcome matching.
//!
//! A manifest's `ExpectOutcome` is either the literal `PASS`, a substring that
//! must appear in the validation error, or empty. An empty expectation is a
//! test-authoring error and always fails, whatever the validator decides.

use std::fmt;

use serde::Serialize;

/// Marker a manifest uses to declare that the document must validate.
pub const PASS_MARKER: &str = "PASS";

/// Parsed form of a manifest's `ExpectOutcome`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    Pass,
    ErrorContaining(String),
    Undeclared,
}

impl Expectation {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" => Expectation::Undeclared,
            PASS_MARKER => Expectation::Pass,
            other => Expectation::ErrorContaining(other.to_string()),
        }
    }
}

/// What the validator said about a generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid { declared_version: Option<String> },
    Invalid { message: String },
}

/// Why a sub-test failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Failure {
    /// The document could not be assembled; validation never ran.
    Incomplete { message: String },
    /// Test authoring problem such as a duplicate or malformed FileName.
    Configuration { message: String },
    /// Expected `PASS`, validation failed.
    ValidateFailure { error: String },
    /// Validation failed and no expectation was declared.
    NoExpectation { error: String },
    /// Validation failed, but not with the expected message.
    WrongError { expected: String, error: String },
    /// Validation succeeded and no expectation was declared.
    ValidNoExpectation,
    /// Expected an error, validation succeeded.
    ExpectedErrorNotFound { expected: String },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Incomplete { message } => write!(f, "Devfile incomplete : {}", message),
            Failure::Configuration { message } => write!(f, "Test configuration error : {}", message),
            Failure::ValidateFailure { error } => write!(f, "Validate failure : {}", error),
            Failure::NoExpectation { error } => {
                write!(f, "No expected outcome was set : got : {}", error)
            }
            Failure::WrongError { expected, error } => {
                write!(f, "Did not fail as expected : {}  got : {}", expected, error)
            }
            Failure::ValidNoExpectation => {
                write!(f, "devfile was valid - No expected outcome was set.")
            }
            Failure::ExpectedErrorNotFound { expected } => {
                write!(f, "devfile was valid - Expected Error not found : {}", expected)
            }
        }
    }
}

/// Result of comparing a validation outcome with an expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Pass {
        /// The matched expectation, or the declared schema version for a valid document.
        detail: String,
    },
    Fail(Failure),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }
}

/// Applies the outcome matrix.
pub fn check(outcome: &ValidationOutcome, expectation: &Expectation) -> Verdict {
    match (outcome, expectation) {
        (ValidationOutcome::Invalid { message }, Expectation::Pass) => {
            Verdict::Fail(Failure::ValidateFailure {
                error: message.clone(),
            })
        }
        (ValidationOutcome::Invalid { message }, Expectation::Undeclared) => {
            Verdict::Fail(Failure::NoExpectation {
                error: message.clone(),
            })
        }
        (ValidationOutcome::Invalid { message }, Expectation::ErrorContaining(expected)) => {
            if message.contains(expected.as_str()) {
                Verdict::Pass {
                    detail: expected.clone(),
                }
            } else {
                Verdict::Fail(Failure::WrongError {
                    expected: expected.clone(),
                    error: message.clone(),
                })
            }
        }
        (ValidationOutcome::Valid { .. }, Expectation::Undeclared) => {
            Verdict::Fail(Failure::ValidNoExpectation)
        }
        (ValidationOutcome::Valid { declared_version }, Expectation::Pass) => Verdict::Pass {
            detail: match declared_version {
                Some(version) => format!("Schema Version found {}", version),
                None => PASS_MARKER.to_string(),
            },
        },
        (ValidationOutcome::Valid { .. }, Expectation::ErrorContaining(expected)) => {
            Verdict::Fail(Failure::ExpectedErrorNotFound {
                expected: expected.clone(),
            })
        }
    }
}

// =============================================================================
// SUB-TEST LIFECYCLE
// =============================================================================

/// Lifecycle of one sub-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotRun,
    Assembling,
    Assembled,
    AssemblyFailed,
    Validated,
    ValidationFailed,
    Checked,
}

impl Phase {
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (NotRun, Assembling)
                | (Assembling, Assembled)
                | (Assembling, AssemblyFailed)
                | (Assembled, Validated)
                | (Assembled, ValidationFailed)
                | (AssemblyFailed, Checked)
                | (Validated, Checked)
                | (ValidationFailed, Checked)
        )
    }
}

/// Records the phases a sub-test passes through.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: Phase,
    history: Vec<Phase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: Phase::NotRun,
            history: vec![Phase::NotRun],
        }
    }
}

impl PhaseTracker {
    pub fn current(&self) -> Phase {
        self.current
    }

    /// Last phase before `Checked`, i.e. how far the sub-test got.
    pub fn furthest(&self) -> Phase {
        self.history
            .iter()
            .rev()
            .copied()
            .find(|p| *p != Phase::Checked)
            .unwrap_or(Phase::NotRun)
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Moves to `next`. Illegal transitions are a programming error.
    pub fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal sub-test transition {:?} -> {:?}",
            self.current,
            next
        );
        self.current = next;
        self.history.push(next);
    }
}
