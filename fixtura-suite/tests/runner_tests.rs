//! Suite runner tests
//!
//! The runner must dispose exactly once on every exit path and keep teardown
//! failures apart from test results.

mod helpers;

use anyhow::bail;
use fixtura_common::{ExecutionMode, HarnessConfig, ResetPolicy};
use fixtura_suite::logging::init_tracing;
use fixtura_suite::{
    run_suite, Suite, SuiteLifecycle, SuiteOutcome, SuiteState, TeardownStatus, TestStatus,
};
use helpers::{Behavior, MockHandle, Probe};
use std::time::Duration;

fn lifecycle(handle: MockHandle) -> SuiteLifecycle<MockHandle> {
    SuiteLifecycle::new(handle, ResetPolicy::FORCE)
        .with_timeouts(Duration::from_millis(100), Duration::from_millis(100))
}

fn recording_suite(mode: ExecutionMode) -> Suite<Probe> {
    Suite::new("recording")
        .execution(mode)
        .test("first", |probe: Probe| async move {
            probe.record("test:first");
            Ok(())
        })
        .test("second", |probe: Probe| async move {
            probe.record("test:second");
            Ok(())
        })
}

async fn explodes(_probe: Probe) -> anyhow::Result<()> {
    panic!("uncaught in test body");
}

async fn balance_mismatch(_probe: Probe) -> anyhow::Result<()> {
    bail!("balance mismatch");
}

#[tokio::test]
async fn test_all_pass_then_release() {
    init_tracing();
    let probe = Probe::new();
    let mut suite = lifecycle(MockHandle::new(&probe));

    let report = run_suite(&mut suite, probe.clone(), &recording_suite(ExecutionMode::Sequential)).await;

    assert_eq!(report.outcome, SuiteOutcome::Passed);
    assert_eq!(report.teardown, TeardownStatus::Released);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.resource, "mock://store");
    assert_eq!(suite.state(), SuiteState::Disposed);
    assert_eq!(
        probe.events(),
        vec!["reset", "test:first", "test:second", "close"]
    );
}

#[tokio::test]
async fn test_failed_prepare_runs_no_tests() {
    init_tracing();
    let probe = Probe::new();
    let mut suite = lifecycle(MockHandle::new(&probe).reset_behavior(Behavior::Fail));

    let report = run_suite(&mut suite, probe.clone(), &recording_suite(ExecutionMode::Sequential)).await;

    assert!(report.is_aborted());
    assert!(report.results.is_empty());
    assert_eq!(probe.events(), vec!["close"]);
    assert_eq!(probe.close_calls(), 1);
    match &report.outcome {
        SuiteOutcome::Aborted(reason) => assert!(reason.contains("connection refused")),
        other => panic!("expected Aborted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_prepare_timeout_aborts_and_still_disposes() {
    let probe = Probe::new();
    let mut suite = lifecycle(MockHandle::new(&probe).reset_behavior(Behavior::Hang));

    let report = run_suite(&mut suite, probe.clone(), &recording_suite(ExecutionMode::Concurrent)).await;

    assert!(report.is_aborted());
    assert_eq!(report.teardown, TeardownStatus::Released);
    assert_eq!(probe.close_calls(), 1);
}

#[tokio::test]
async fn test_panicking_test_still_disposes() {
    init_tracing();
    let probe = Probe::new();
    let mut suite = lifecycle(MockHandle::new(&probe));

    let tests = Suite::new("panics")
        .test("explodes", explodes)
        .test("after", |probe: Probe| async move {
            probe.record("test:after");
            Ok(())
        });

    let report = run_suite(&mut suite, probe.clone(), &tests).await;

    assert_eq!(report.outcome, SuiteOutcome::Failed);
    assert_eq!(
        report.results[0].status,
        TestStatus::Panicked("uncaught in test body".to_string())
    );
    assert_eq!(report.results[1].status, TestStatus::Passed);
    assert_eq!(report.teardown, TeardownStatus::Released);
    assert_eq!(probe.close_calls(), 1);
    assert_eq!(probe.events().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_teardown_failure_reported_separately_from_test_failure() {
    let probe = Probe::new();
    let mut suite = lifecycle(MockHandle::new(&probe).close_behavior(Behavior::Fail));

    let tests = Suite::new("mixed")
        .test("ok", |_probe: Probe| async move { Ok(()) })
        .test("bad", balance_mismatch);

    let report = run_suite(&mut suite, probe.clone(), &tests).await;

    assert_eq!(report.outcome, SuiteOutcome::Failed);
    assert_eq!(report.results[0].status, TestStatus::Passed);
    assert_eq!(
        report.results[1].status,
        TestStatus::Failed("balance mismatch".to_string())
    );
    assert!(report.has_teardown_warning());
    match &report.teardown {
        TeardownStatus::Failed(message) => assert!(message.contains("store vanished")),
        other => panic!("expected teardown failure, got {:?}", other),
    }
    assert_eq!(probe.close_calls(), 1);
}

#[tokio::test]
async fn test_teardown_failure_keeps_passing_suite_green() {
    let probe = Probe::new();
    let mut suite = lifecycle(MockHandle::new(&probe).close_behavior(Behavior::Fail));

    let report = run_suite(&mut suite, probe.clone(), &recording_suite(ExecutionMode::Sequential)).await;

    assert!(report.is_success());
    assert!(report.has_teardown_warning());
    assert!(report.summary_line().contains("PASSED"));
    assert!(report.summary_line().contains("teardown warning"));
}

#[tokio::test]
async fn test_concurrent_tests_run_between_prepare_and_dispose() {
    let probe = Probe::new();
    let mut suite = lifecycle(MockHandle::new(&probe));

    let mut tests = Suite::new("concurrent").execution(ExecutionMode::Concurrent);
    for i in 0..8 {
        tests = tests.test(format!("t{}", i), move |probe: Probe| async move {
            tokio::time::sleep(Duration::from_millis(5 * (8 - i))).await;
            probe.record(format!("test:t{}", i));
            Ok(())
        });
    }

    let report = run_suite(&mut suite, probe.clone(), &tests).await;
    let events = probe.events();

    assert!(report.is_success());
    assert_eq!(events.len(), 10);
    assert_eq!(events.first().map(String::as_str), Some("reset"));
    assert_eq!(events.last().map(String::as_str), Some("close"));
    // Reported in declaration order regardless of completion order
    let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"]);
}

#[tokio::test]
async fn test_empty_suite_passes() {
    let probe = Probe::new();
    let mut suite = lifecycle(MockHandle::new(&probe));

    let report = run_suite(&mut suite, probe.clone(), &Suite::new("empty")).await;

    assert!(report.is_success());
    assert_eq!(probe.events(), vec!["reset", "close"]);
}

#[tokio::test]
async fn test_execution_mode_taken_from_config() {
    let config = HarnessConfig::from_toml_str(
        r#"
        [lifecycle]
        execution = "concurrent"
        "#,
    )
    .unwrap();
    let probe = Probe::new();
    let mut suite = SuiteLifecycle::from_config(MockHandle::new(&probe), &config);

    let tests = Suite::from_config("configured", &config)
        .test("slow", |probe: Probe| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            probe.record("test:slow");
            Ok(())
        })
        .test("fast", |probe: Probe| async move {
            probe.record("test:fast");
            Ok(())
        });
    assert_eq!(tests.execution_mode(), ExecutionMode::Concurrent);

    let report = run_suite(&mut suite, probe.clone(), &tests).await;

    assert!(report.is_success());
    // Sequential scheduling would finish "slow" before starting "fast"
    assert_eq!(
        probe.events(),
        vec!["reset", "test:fast", "test:slow", "close"]
    );
}

#[test]
fn test_default_config_runs_sequentially() {
    let suite: Suite<Probe> = Suite::from_config("defaults", &HarnessConfig::default());
    assert_eq!(suite.execution_mode(), ExecutionMode::Sequential);
}
