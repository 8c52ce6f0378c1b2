//! Rollout strategy tests

mod common;

use std::collections::BTreeMap;

use common::*;
use deploy_api::{ExecutionStatus, Strategy};
use fwdeploy::deploy::strategies::{canary_count, rolling_batch_size, rollout_limit};

fn batches(harness: &Harness, execution_id: &str) -> BTreeMap<usize, usize> {
    let report = harness.orchestrator.execution_report(execution_id).unwrap();
    let mut sizes = BTreeMap::new();
    for outcome in &report.device_results {
        *sizes.entry(outcome.batch).or_insert(0) += 1;
    }
    sizes
}

#[test]
fn test_population_helpers() {
    assert_eq!(rollout_limit(100, 25), 25);
    assert_eq!(rollout_limit(4, 10), 1);
    assert_eq!(canary_count(100, 10), 10);
    assert_eq!(canary_count(8, 10), 1);
    assert_eq!(rolling_batch_size(97), 9);
    assert_eq!(rolling_batch_size(100), 10);
    assert_eq!(rolling_batch_size(5), 1);
}

#[tokio::test]
async fn test_canary_validation_failure_stops_rollout() {
    let harness = Harness::new(100, vec![development()]);
    harness.checks.fail("fail_test");

    let mut canary = spec("Canary", "development", Strategy::Canary);
    canary.canary_percentage = 10;
    canary.validation_tests = vec!["smoke_test".to_string(), "fail_test".to_string()];

    let exec = harness.start(canary);
    let exec = harness.wait_terminal(&exec.execution_id).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(
        exec.error_message.as_deref(),
        Some("Canary validation test failed: fail_test")
    );
    assert_eq!(harness.sender.sent_count(), 10);
    assert_eq!(exec.devices_targeted, 100);
    assert_eq!(exec.devices_successful, 10);
    assert!(exec.rollback_execution_id.is_none());
    assert_eq!(
        harness.checks.ran(),
        vec!["smoke_test".to_string(), "fail_test".to_string()]
    );
}

#[tokio::test]
async fn test_canary_success_deploys_everything() {
    let harness = Harness::new(20, vec![development()]);
    let mut canary = spec("Canary", "development", Strategy::Canary);
    canary.canary_percentage = 25;
    canary.validation_tests = vec!["smoke_test".to_string()];

    let exec = harness.start(canary);
    let exec = harness.wait_terminal(&exec.execution_id).await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(harness.sender.sent_count(), 20);
    let sizes = batches(&harness, &exec.execution_id);
    assert_eq!(sizes.get(&1), Some(&5));
    assert_eq!(sizes.get(&2), Some(&15));
}

#[tokio::test]
async fn test_canary_failure_in_canary_group() {
    let harness = Harness::new(10, vec![development()]);
    harness.sender.fail(&["ESP32_001"]);

    let exec = harness.start(spec("Canary", "development", Strategy::Canary));
    let exec = harness.wait_terminal(&exec.execution_id).await;

    // One canary out of 10 percent of ten devices, and it failed
    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(harness.sender.sent_count(), 1);
    assert_eq!(
        exec.error_message.as_deref(),
        Some("Success rate (0.0%) below threshold (80.0%)")
    );
}

#[tokio::test]
async fn test_rolling_batches() {
    let harness = Harness::new(97, vec![development()]);
    let exec = harness.start(spec("Rolling", "development", Strategy::Rolling));
    let exec = harness.wait_terminal(&exec.execution_id).await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.devices_successful, 97);

    let sizes = batches(&harness, &exec.execution_id);
    assert_eq!(sizes.len(), 11);
    assert!((1..=10).all(|batch| sizes[&batch] == 9));
    assert_eq!(sizes[&11], 7);
}

#[tokio::test]
async fn test_rolling_stops_at_failing_batch() {
    let harness = Harness::new(20, vec![development()]);
    harness.sender.fail(&["ESP32_005", "ESP32_006"]);

    let exec = harness.start(spec("Rolling", "development", Strategy::Rolling));
    let exec = harness.wait_terminal(&exec.execution_id).await;

    // Batch size 2: batches one and two pass, batch three drops to 66.7%
    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(harness.sender.sent_count(), 6);
    assert_eq!(
        exec.error_message.as_deref(),
        Some("Success rate (66.7%) below threshold (80.0%)")
    );
}

#[tokio::test]
async fn test_blue_green() {
    let harness = Harness::new(8, vec![development()]);
    let exec = harness.start(spec("BlueGreen", "development", Strategy::BlueGreen));
    let exec = harness.wait_terminal(&exec.execution_id).await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.progress, 100.0);
    assert_eq!(harness.sender.sent_count(), 8);
    let report = harness.orchestrator.execution_report(&exec.execution_id).unwrap();
    assert!(report
        .phases
        .iter()
        .any(|phase| phase.name == "blue_green_deployment"));
    assert!(exec.logs.iter().any(|line| line.ends_with("Switching traffic to green")));
}

#[tokio::test]
async fn test_rollout_percentage() {
    let harness = Harness::new(100, vec![development()]);
    let mut partial = spec("Partial", "development", Strategy::Immediate);
    partial.rollout_percentage = 25;

    let exec = harness.start(partial);
    let exec = harness.wait_terminal(&exec.execution_id).await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.devices_targeted, 25);
    assert_eq!(harness.sender.sent_count(), 25);
}

#[tokio::test]
async fn test_no_matching_devices() {
    let harness = Harness::new(5, vec![development()]);
    let mut none = spec("Nobody", "development", Strategy::Rolling);
    none.device_filters.device_type = Some("ESP8266".to_string());

    let exec = harness.start(none);
    let exec = harness.wait_terminal(&exec.execution_id).await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.devices_targeted, 0);
    assert_eq!(harness.sender.sent_count(), 0);
}
