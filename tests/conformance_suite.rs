// Runs the shipped devfile conformance suite with the built-in validator.
// A failing sub-test fails this test, so `cargo test` carries the verdict.

mod common;

use std::path::PathBuf;

use common::{results, verdict};
use devfile_conformance::devfile::BuiltinValidator;
use devfile_conformance::runner::ConformanceRunner;
use devfile_conformance::RunnerConfig;

fn suite_config(work_root: PathBuf) -> RunnerConfig {
    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    RunnerConfig {
        manifest_dir: fixtures.join("json/v200"),
        fixture_root: fixtures,
        work_root,
        use_colors: false,
        ..RunnerConfig::default()
    }
}

#[test]
fn shipped_suite_passes() {
    let scratch = tempfile::tempdir().unwrap();
    let config = suite_config(scratch.path().join("tmp"));

    let report = ConformanceRunner::new(&config, &BuiltinValidator)
        .run()
        .unwrap();

    let failures: Vec<String> = results(&report)
        .into_iter()
        .filter(|r| !r.is_pass())
        .map(|r| format!("{}: {:?}", r.file_name, verdict(r)))
        .collect();
    assert!(failures.is_empty(), "failing sub-tests:\n{}", failures.join("\n"));
    assert_eq!(report.load_errors(), 0);
    assert_eq!(report.manifests.len(), 4);
    assert_eq!(report.totals.attempted, 18);
    assert!(report.is_success());
}

#[test]
fn valid_documents_report_their_schema_version() {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = suite_config(scratch.path().join("tmp"));
    config.filter = Some("test-post-start-event".into());

    let report = ConformanceRunner::new(&config, &BuiltinValidator)
        .run()
        .unwrap();

    assert_eq!(report.totals.attempted, 1);
    let all = results(&report);
    let ran = all.iter().find(|r| !r.is_skipped()).unwrap();
    assert_eq!(
        format!("{:?}", verdict(ran)),
        "Pass { detail: \"Schema Version found 2.0.0\" }"
    );
}
