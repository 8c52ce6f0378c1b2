//! Execution monitor tests

mod common;

use std::time::Duration;

use chrono::Utc;
use common::*;
use deploy_api::{ExecutionStatus, Strategy};
use fwdeploy::deploy::orchestrator::TIMED_OUT;
use fwdeploy::notify::NotificationLevel;
use fwdeploy::workers::monitor::{self, Options};

#[tokio::test]
async fn test_check_timeouts() {
    let harness = Harness::new(50, vec![development()]);
    harness.sender.set_delay(Duration::from_millis(20));
    let exec = harness.start(spec("Stuck", "development", Strategy::Immediate));
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(harness.orchestrator.check_timeouts(Utc::now()).await.is_empty());

    let later = Utc::now() + chrono::Duration::hours(2);
    let timed_out = harness.orchestrator.check_timeouts(later).await;
    assert_eq!(timed_out, vec![exec.execution_id.clone()]);

    let exec = harness.orchestrator.get_execution(&exec.execution_id).unwrap();
    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(exec.error_message.as_deref(), Some(TIMED_OUT));
    assert!(harness
        .notifier
        .contains(NotificationLevel::Error, TIMED_OUT));

    // Already terminal
    assert!(harness.orchestrator.check_timeouts(later).await.is_empty());
}

#[tokio::test]
async fn test_timeout_rolls_back_device_with_send_in_progress() {
    let mut env = development();
    env.auto_rollback = true;
    let harness = Harness::new(1, vec![env]);

    let mut baseline = spec("Baseline", "development", Strategy::Immediate);
    baseline.firmware_version = "1.1.0".to_string();
    let first = harness.start(baseline);
    harness.wait_terminal(&first.execution_id).await;

    harness.sender.set_delay(Duration::from_millis(200));
    let exec = harness.start(spec("Stuck", "development", Strategy::Immediate));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let later = Utc::now() + chrono::Duration::hours(2);
    let timed_out = harness.orchestrator.check_timeouts(later).await;
    assert_eq!(timed_out, vec![exec.execution_id.clone()]);

    let failed = harness.orchestrator.get_execution(&exec.execution_id).unwrap();
    assert_eq!(failed.status, ExecutionStatus::Failed);
    assert!(failed.device_results.is_empty());
    let rollback_id = failed
        .rollback_execution_id
        .clone()
        .expect("rollback should be linked");

    let rollback = harness.wait_terminal(&rollback_id).await;
    assert_eq!(rollback.status, ExecutionStatus::Completed);
    assert_eq!(rollback.device_results.len(), 1);
    let restored = &rollback.device_results[0];
    assert!(restored.success);
    assert!(!restored.skipped);
    assert_eq!(restored.firmware_version, "1.1.0");

    // The interrupted send never completed and nothing else was sent after it
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        harness.sender.sent(),
        vec![
            ("ESP32_001".to_string(), "1.1.0".to_string()),
            ("ESP32_001".to_string(), "1.1.0".to_string()),
        ]
    );
    assert_eq!(
        harness.orchestrator.installed_version("development", "ESP32_001"),
        Some("1.1.0".to_string())
    );
}

#[tokio::test]
async fn test_timeout_rollback_fails_without_known_version() {
    let mut env = development();
    env.auto_rollback = true;
    let harness = Harness::new(1, vec![env]);
    harness.sender.set_delay(Duration::from_millis(200));
    harness.sender.replacing(&device_ids(1), "1.1.0");

    let exec = harness.start(spec("Stuck", "development", Strategy::Immediate));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let later = Utc::now() + chrono::Duration::hours(2);
    harness.orchestrator.check_timeouts(later).await;

    let failed = harness.orchestrator.get_execution(&exec.execution_id).unwrap();
    let rollback_id = failed
        .rollback_execution_id
        .clone()
        .expect("rollback should be linked");
    let rollback = harness.wait_terminal(&rollback_id).await;

    // The device may hold either version, so the rollback cannot claim success
    assert_eq!(rollback.status, ExecutionStatus::Failed);
    assert_eq!(rollback.device_results.len(), 1);
    assert!(!rollback.device_results[0].skipped);
    assert_eq!(
        rollback.device_results[0].error.as_deref(),
        Some("no recorded previous version")
    );
    assert!(harness.sender.sent().is_empty());
}

#[tokio::test]
async fn test_prune_history() {
    let harness = Harness::new(2, vec![development()]);
    let exec = harness.start(spec("Old", "development", Strategy::Immediate));
    harness.wait_terminal(&exec.execution_id).await;

    assert_eq!(harness.orchestrator.prune_history(Utc::now()), 0);
    assert_eq!(harness.orchestrator.list_executions().len(), 1);

    let later = Utc::now() + chrono::Duration::days(40);
    assert_eq!(harness.orchestrator.prune_history(later), 1);
    assert!(harness.orchestrator.list_executions().is_empty());
    assert!(harness.orchestrator.get_execution(&exec.execution_id).is_none());
}

#[tokio::test]
async fn test_tick_probes_environments_with_health_url() {
    let mut env = development();
    env.health_check_url = Some("http://127.0.0.1:9".to_string());
    let harness = Harness::new(1, vec![env]);
    harness.health.script(&[false]);

    monitor::tick(
        &Options {
            probe_environments: false,
            ..Default::default()
        },
        &harness.orchestrator,
    )
    .await;

    // The scripted verdict is still queued, so the next deployment fails its gate
    let exec = harness.start(spec("Gate", "development", Strategy::Immediate));
    let exec = harness.wait_terminal(&exec.execution_id).await;
    assert_eq!(exec.status, ExecutionStatus::Failed);

    harness.health.script(&[false]);
    monitor::tick(&Options::default(), &harness.orchestrator).await;
    let exec = harness.start(spec("Gate", "development", Strategy::Immediate));
    let exec = harness.wait_terminal(&exec.execution_id).await;
    assert_eq!(exec.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let harness = Harness::new(1, vec![development()]);
    let options = Options {
        interval: Duration::from_millis(1),
        ..Default::default()
    };

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        monitor::run(
            &options,
            &harness.orchestrator,
            tokio::time::sleep,
            Box::pin(async {}),
        ),
    )
    .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_run_ticks_until_shutdown() {
    // A zero timeout makes every running execution overdue
    let mut options = test_options();
    options.execution_timeout = Duration::ZERO;
    let harness = Harness::with_options(1, vec![development()], options);
    harness.sender.set_delay(Duration::from_millis(200));
    let exec = harness.start(spec("Stuck", "development", Strategy::Immediate));

    let worker = Options {
        interval: Duration::from_millis(2),
        probe_environments: false,
    };
    let shutdown = Box::pin(tokio::time::sleep(Duration::from_millis(50)));
    monitor::run(&worker, &harness.orchestrator, tokio::time::sleep, shutdown).await;

    let exec = harness.orchestrator.get_execution(&exec.execution_id).unwrap();
    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(exec.error_message.as_deref(), Some(TIMED_OUT));
}
