//! The conformance runner command-line interface.
//!
//! Handlers return whether the command succeeded; errors that stop a command
//! outright are rendered as miette reports.

use std::path::Path;
use std::process;

use clap::Parser;
use miette::IntoDiagnostic;

use crate::cli::args::{Command, ConformanceArgs, LocationArgs, RunArgs};
use crate::cli::output::Reporter;
use crate::config::RunnerConfig;
use crate::devfile::{self, BuiltinValidator};
use crate::errors::{print_error, ConformanceError};
use crate::manifest;
use crate::runner::ConformanceRunner;
use crate::validator::{CommandValidator, DocumentValidator};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = ConformanceArgs::parse();

    let result = match args.command {
        Command::Run(run) => handle_run(run),
        Command::Validate { file } => Ok(handle_validate(&file)),
        Command::List(location) => handle_list(&location),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(report) => {
            eprintln!("{report:?}");
            process::exit(1);
        }
    }
}

/// Config file first, then flags.
fn load_config(location: &LocationArgs) -> Result<RunnerConfig, ConformanceError> {
    let mut config = match &location.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(dir) = &location.manifests {
        config.manifest_dir = dir.clone();
    }
    if let Some(dir) = &location.fixtures {
        config.fixture_root = dir.clone();
    }
    Ok(config)
}

fn handle_run(args: RunArgs) -> miette::Result<bool> {
    let mut config = load_config(&args.location)?;
    if let Some(dir) = args.work_dir {
        config.work_root = dir;
    }
    if args.filter.is_some() {
        config.filter = args.filter;
    }
    config.errors_only |= args.errors_only;
    config.clean_after |= args.clean;

    let external;
    let validator: &dyn DocumentValidator = match args.validator_cmd {
        Some(program) => {
            external = CommandValidator::new(program, args.validator_args);
            &external
        }
        None => &BuiltinValidator,
    };

    let report = ConformanceRunner::new(&config, validator).run()?;
    if args.json {
        let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{}", json);
    } else {
        Reporter::stdout(config.use_colors, config.errors_only)
            .print_run(&report)
            .into_diagnostic()?;
    }
    Ok(report.is_success())
}

fn handle_validate(file: &Path) -> bool {
    match devfile::parse_and_validate(file) {
        Ok(obj) => {
            println!(
                "{} : Schema Version found {}",
                file.display(),
                obj.data.schema_version()
            );
            true
        }
        Err(e) => {
            print_error(e);
            false
        }
    }
}

fn handle_list(location: &LocationArgs) -> miette::Result<bool> {
    let config = load_config(location)?;
    let files = manifest::discover_manifest_files(&config.manifest_dir, &config.manifest_suffix)?;
    let mut ok = true;
    for path in files {
        let manifest = match manifest::load_manifest(&path) {
            Ok(manifest) => manifest,
            Err(e) => {
                print_error(e);
                ok = false;
                continue;
            }
        };
        println!(
            "{} ({} of {} enabled)",
            path.display(),
            manifest.enabled_count(),
            manifest.tests.len()
        );
        for test in &manifest.tests {
            let marker = if test.disabled { "-" } else { "+" };
            println!(
                "  {} {} [{}] expect: {:?}",
                marker,
                test.file_name,
                test.files.join(", "),
                test.expect_outcome
            );
        }
    }
    Ok(ok)
}
