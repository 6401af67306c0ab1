//! Request and system specs run against an in-process application

use std::path::PathBuf;
use std::time::Duration;

use viewkit_common::OptionSet;
use viewkit_e2e::{DriverConfig, Outcome, RunnerConfig, Target, TestRunner, TestSpec};
use viewkit_web::WebConfig;

fn specs_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/specs")
}

fn runner(driver: Option<DriverConfig>, output_dir: PathBuf) -> TestRunner {
    TestRunner::with_config(RunnerConfig {
        driver,
        startup_timeout: Duration::from_secs(10),
        specs_dir: specs_dir(),
        output_dir,
        ..Default::default()
    })
}

#[tokio::test]
async fn test_bundled_request_specs_pass() {
    let out = tempfile::tempdir().unwrap();
    let mut runner = runner(None, out.path().to_path_buf());

    let suite = runner.run_tagged("request").await.unwrap();
    assert_eq!(suite.total, 2);
    assert_eq!(suite.passed, 2, "{:#?}", suite.results);
    assert!(suite.success());
}

#[tokio::test]
async fn test_system_spec_skipped_without_driver() {
    let out = tempfile::tempdir().unwrap();
    let mut runner = runner(None, out.path().to_path_buf());

    let suite = runner.run_all().await.unwrap();
    assert_eq!(suite.total, 3);
    assert_eq!(suite.skipped, 1);
    assert!(suite.success());

    let system = suite
        .results
        .iter()
        .find(|r| r.name == "samples-system")
        .unwrap();
    assert!(matches!(system.outcome, Outcome::Skipped { .. }));

    let path = runner.write_results(&suite).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written["total"], 3);
    assert_eq!(written["results"][0]["outcome"]["status"], "passed");
}

#[tokio::test]
async fn test_unmet_expectation_fails_only_that_spec() {
    let out = tempfile::tempdir().unwrap();
    let mut runner = runner(None, out.path().to_path_buf());

    let failing = TestSpec::from_yaml(
        r#"
name: wrong-count
steps:
  - action: request
    path: /sample
  - action: assert_css
    selector: div.sample-button
    count: 5
  - action: log
    message: never reached
"#,
    )
    .unwrap();
    let passing = TestSpec::from_yaml(
        "name: health\nsteps:\n  - action: request\n    path: /health\n",
    )
    .unwrap();

    let suite = runner.run_specs(&[failing, passing]).await.unwrap();
    assert_eq!(suite.failed, 1);
    assert_eq!(suite.passed, 1);
    assert!(!suite.success());

    let failed = &suite.results[0];
    match &failed.outcome {
        Outcome::Failed { reason } => assert!(reason.contains("found 2"), "{}", reason),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(failed.steps.len(), 2);
}

#[tokio::test]
async fn test_sample_page_reflects_config() {
    let out = tempfile::tempdir().unwrap();
    let mut cfg = WebConfig::default();
    cfg.sample.buttons = vec![OptionSet::new().with("url", "/a").with("text", "A")];

    let mut runner = TestRunner::with_config(RunnerConfig {
        target: Target::InProcess(cfg),
        output_dir: out.path().to_path_buf(),
        ..Default::default()
    });

    let spec = TestSpec::from_yaml(
        r#"
name: one-button
steps:
  - action: request
    path: /sample
  - action: assert_css
    selector: "div.sample-button[data-counter=1] a"
    text: A
  - action: assert_css
    selector: div.sample-button
    count: 1
"#,
    )
    .unwrap();

    let suite = runner.run_specs(&[spec]).await.unwrap();
    assert_eq!(suite.passed, 1, "{:#?}", suite.results);
}

#[tokio::test]
async fn test_unavailable_driver_is_an_error_not_a_failure() {
    let out = tempfile::tempdir().unwrap();
    let driver = DriverConfig {
        driver_binary: PathBuf::from("/nonexistent/chromedriver"),
        startup_timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let mut runner = runner(Some(driver), out.path().to_path_buf());

    let suite = runner.run_tagged("system").await.unwrap();
    assert_eq!(suite.total, 1);
    assert_eq!(suite.errored, 1);
    assert_eq!(suite.failed, 0);
}
