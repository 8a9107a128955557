//! Command-line arguments and subcommands.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "devfile-conformance",
    version,
    about = "Assembles devfiles from JSON test manifests and checks how a validator judges them."
)]
pub struct ConformanceArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every manifest and report the outcome of each sub-test.
    Run(RunArgs),
    /// Parse and validate a single devfile with the built-in validator.
    Validate {
        /// The devfile to validate.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// List discovered manifests and their sub-tests without running them.
    List(LocationArgs),
}

/// Where manifests and fixtures live. Flags override the config file.
#[derive(Debug, Args, Default)]
pub struct LocationArgs {
    /// YAML file with runner settings.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Directory scanned for `*-tests.json` manifests.
    #[arg(long, value_name = "DIR")]
    pub manifests: Option<PathBuf>,
    /// Root that fragment paths are resolved against.
    #[arg(long, value_name = "DIR")]
    pub fixtures: Option<PathBuf>,
}

#[derive(Debug, Args, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub location: LocationArgs,
    /// Scratch root; wiped at the start of every run.
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,
    /// Only run sub-tests whose FileName contains this text (case-insensitive).
    #[arg(long)]
    pub filter: Option<String>,
    /// Only print failures.
    #[arg(long)]
    pub errors_only: bool,
    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
    /// Remove the work directory once the run completes.
    #[arg(long)]
    pub clean: bool,
    /// Validate with an external program instead of the built-in validator.
    #[arg(long, value_name = "PROGRAM")]
    pub validator_cmd: Option<String>,
    /// Argument passed to the external validator before the devfile path.
    #[arg(long = "validator-arg", value_name = "ARG", requires = "validator_cmd")]
    pub validator_args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        ConformanceArgs::command().debug_assert();
    }

    #[test]
    fn run_flags() {
        let args = ConformanceArgs::parse_from([
            "devfile-conformance",
            "run",
            "--manifests",
            "suites",
            "--filter",
            "Events",
            "--errors-only",
            "--validator-cmd",
            "odo",
            "--validator-arg",
            "validate",
        ]);
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.location.manifests, Some(PathBuf::from("suites")));
        assert_eq!(run.filter.as_deref(), Some("Events"));
        assert!(run.errors_only);
        assert!(!run.json);
        assert_eq!(run.validator_args, vec!["validate".to_string()]);
    }

    #[test]
    fn validator_args_need_a_program() {
        let result = ConformanceArgs::try_parse_from([
            "devfile-conformance",
            "run",
            "--validator-arg",
            "x",
        ]);
        assert!(result.is_err());
    }
}
