//! Plan validation tests

use chrono::{Duration, Utc};
use deploy_api::{
    DeploymentPlan, DeploymentStage, Environment, PlanSpec, Strategy, PREVIOUS_VERSION,
};
use fwdeploy::deploy::validator::PlanValidator;
use fwdeploy::environments::EnvironmentRegistry;

fn registry() -> EnvironmentRegistry {
    EnvironmentRegistry::new(vec![
        Environment::new("development", DeploymentStage::Development),
        Environment::new("production", DeploymentStage::Production),
    ])
}

fn plan(spec: PlanSpec) -> DeploymentPlan {
    DeploymentPlan::new("plan_test", spec, Utc::now())
}

fn base_spec() -> PlanSpec {
    let mut spec = PlanSpec::new(
        "Rollout",
        "1.2.0",
        "development",
        "production",
        Strategy::Rolling,
    );
    spec.device_filters.device_type = Some("ESP32".to_string());
    spec
}

#[test]
fn test_valid_plan() {
    let registry = registry();
    let result = PlanValidator::new(&registry).validate(&plan(base_spec()), Utc::now());
    assert!(result.valid, "unexpected errors: {:?}", result.errors);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
    assert!(result.checks.values().all(|passed| *passed));
}

#[test]
fn test_invalid_version() {
    let registry = registry();
    for version in ["1.2", "1.2.3.4", "v1.2.3", "1.2.x", ""] {
        let mut spec = base_spec();
        spec.firmware_version = version.to_string();
        let result = PlanValidator::new(&registry).validate(&plan(spec), Utc::now());
        assert!(!result.valid, "{} should be rejected", version);
        assert_eq!(result.checks.get("firmware_version"), Some(&false));
        assert!(result.errors[0].contains("MAJOR.MINOR.PATCH"));
    }
}

#[test]
fn test_previous_version_only_for_rollback_plans() {
    let registry = registry();
    let mut spec = base_spec();
    spec.firmware_version = PREVIOUS_VERSION.to_string();

    let mut regular = plan(spec);
    let result = PlanValidator::new(&registry).validate(&regular, Utc::now());
    assert!(!result.valid);

    regular.rollback_of = Some("exec_1".to_string());
    let result = PlanValidator::new(&registry).validate(&regular, Utc::now());
    assert!(result.valid);
}

#[test]
fn test_unknown_environment() {
    let registry = registry();
    let mut spec = base_spec();
    spec.target_environment = "staging".to_string();
    let result = PlanValidator::new(&registry).validate(&plan(spec), Utc::now());
    assert!(!result.valid);
    assert!(result.errors[0].contains("Unknown environment 'staging'"));
}

#[test]
fn test_schedule_must_be_in_future() {
    let registry = registry();
    let now = Utc::now();

    let mut past = base_spec();
    past.scheduled_at = Some(now - Duration::minutes(5));
    let result = PlanValidator::new(&registry).validate(&plan(past), now);
    assert!(!result.valid);
    assert_eq!(result.checks.get("deployment_window"), Some(&false));

    let mut future = base_spec();
    future.scheduled_at = Some(now + Duration::hours(1));
    assert!(PlanValidator::new(&registry).validate(&plan(future), now).valid);
}

#[test]
fn test_device_filters() {
    let registry = registry();

    let mut unknown = base_spec();
    unknown
        .device_filters
        .extra
        .insert("limit".to_string(), serde_json::json!(5));
    let result = PlanValidator::new(&registry).validate(&plan(unknown), Utc::now());
    assert!(!result.valid);
    assert!(result.errors[0].contains("limit"));

    let mut empty = base_spec();
    empty.device_filters = Default::default();
    let result = PlanValidator::new(&registry).validate(&plan(empty), Utc::now());
    assert!(result.valid);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("all devices will be targeted"));
}

#[test]
fn test_rollout_percentage() {
    let registry = registry();

    let mut zero = base_spec();
    zero.rollout_percentage = 0;
    assert!(!PlanValidator::new(&registry).validate(&plan(zero), Utc::now()).valid);

    let mut low = base_spec();
    low.rollout_percentage = 5;
    let result = PlanValidator::new(&registry).validate(&plan(low), Utc::now());
    assert!(result.valid);
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_canary_settings() {
    let registry = registry();

    let mut wide = base_spec();
    wide.strategy = Strategy::Canary;
    wide.canary_percentage = 60;
    wide.validation_tests = vec!["connectivity_test".to_string()];
    let result = PlanValidator::new(&registry).validate(&plan(wide), Utc::now());
    assert!(!result.valid);
    assert_eq!(result.checks.get("canary_settings"), Some(&false));

    let mut untested = base_spec();
    untested.strategy = Strategy::Canary;
    let result = PlanValidator::new(&registry).validate(&plan(untested), Utc::now());
    assert!(result.valid);
    assert!(result.warnings[0].contains("No validation tests"));

    // Canary settings are ignored for other strategies
    let mut rolling = base_spec();
    rolling.canary_percentage = 90;
    let result = PlanValidator::new(&registry).validate(&plan(rolling), Utc::now());
    assert!(result.valid);
    assert!(!result.checks.contains_key("canary_settings"));
}

#[test]
fn test_errors_are_collected_independently() {
    let registry = registry();
    let mut spec = base_spec();
    spec.firmware_version = "bad".to_string();
    spec.target_environment = "nowhere".to_string();
    spec.rollout_percentage = 200;
    let result = PlanValidator::new(&registry).validate(&plan(spec), Utc::now());
    assert_eq!(result.errors.len(), 3);
}

#[test]
fn test_validation_is_repeatable() {
    let registry = registry();
    let plan = plan(base_spec());
    let now = Utc::now();
    let first = PlanValidator::new(&registry).validate(&plan, now);
    let second = PlanValidator::new(&registry).validate(&plan, now);
    assert_eq!(first, second);
}
