//! Conformance test runner for devfile documents.
//!
//! JSON manifests describe sub-tests as lists of YAML fragments. Each sub-test
//! is assembled into a devfile, handed to a [`validator::DocumentValidator`]
//! and its outcome compared with what the manifest expects.

pub use crate::config::RunnerConfig;
pub use crate::errors::ConformanceError;
pub use crate::runner::{ConformanceRunner, RunReport, Tally};
pub use crate::validator::{DocumentValidator, ParsedDocument, ValidationError};

pub mod cli;
pub mod config;
pub mod devfile;
pub mod errors;
pub mod fixture;
pub mod manifest;
pub mod outcome;
pub mod runner;
pub mod validator;
