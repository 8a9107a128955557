// Conformance runner binary: `devfile-conformance run|validate|list`
// Log verbosity follows RUST_LOG and defaults to warnings.

use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    devfile_conformance::cli::run();
}
