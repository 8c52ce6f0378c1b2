//! Plan validation
//!
//! Every check runs independently; only errors make a plan invalid.

use chrono::{DateTime, Utc};
use deploy_api::{DeploymentPlan, Strategy, ValidationResult, PREVIOUS_VERSION};

use crate::environments::EnvironmentRegistry;

enum Verdict {
    Pass,
    Warning(String),
    Error(String),
}

pub struct PlanValidator<'a> {
    environments: &'a EnvironmentRegistry,
}

impl<'a> PlanValidator<'a> {
    pub fn new(environments: &'a EnvironmentRegistry) -> Self {
        Self { environments }
    }

    /// Validate `plan` as of `now`
    pub fn validate(&self, plan: &DeploymentPlan, now: DateTime<Utc>) -> ValidationResult {
        let mut checks = vec![
            ("firmware_version", check_firmware_version(plan)),
            ("target_environment", self.check_target_environment(plan)),
            ("deployment_window", self.check_deployment_window(plan, now)),
            ("device_filters", check_device_filters(plan)),
            ("rollout_percentage", check_rollout_percentage(plan.rollout_percentage)),
        ];
        if plan.strategy == Strategy::Canary {
            checks.push(("canary_settings", check_canary_settings(plan)));
        }

        let mut result = ValidationResult::default();
        for (name, verdict) in checks {
            let passed = match verdict {
                Verdict::Pass => true,
                Verdict::Warning(msg) => {
                    result.warnings.push(format!("{}: {}", name, msg));
                    true
                }
                Verdict::Error(msg) => {
                    result.errors.push(format!("{}: {}", name, msg));
                    false
                }
            };
            result.checks.insert(name.to_string(), passed);
        }
        result.valid = result.errors.is_empty();
        result
    }

    fn check_target_environment(&self, plan: &DeploymentPlan) -> Verdict {
        if self.environments.contains(&plan.target_environment) {
            Verdict::Pass
        } else {
            Verdict::Error(format!(
                "Unknown environment '{}'. Valid options: {}",
                plan.target_environment,
                self.environments.names().join(", ")
            ))
        }
    }

    fn check_deployment_window(&self, plan: &DeploymentPlan, now: DateTime<Utc>) -> Verdict {
        let Some(scheduled_at) = plan.scheduled_at else {
            return Verdict::Pass;
        };
        if scheduled_at <= now {
            return Verdict::Error("Scheduled deployment time must be in the future".to_string());
        }
        let window = self
            .environments
            .get(&plan.target_environment)
            .and_then(|env| env.deployment_window.as_ref());
        match window {
            Some(window) if !window.contains(scheduled_at) => Verdict::Warning(format!(
                "Scheduled time {} is outside the environment deployment window",
                scheduled_at.to_rfc3339()
            )),
            _ => Verdict::Pass,
        }
    }
}

fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

fn check_firmware_version(plan: &DeploymentPlan) -> Verdict {
    if plan.is_rollback() && plan.firmware_version == PREVIOUS_VERSION {
        return Verdict::Pass;
    }
    if is_semver(&plan.firmware_version) {
        Verdict::Pass
    } else {
        Verdict::Error("Invalid version format. Expected: MAJOR.MINOR.PATCH".to_string())
    }
}

fn check_device_filters(plan: &DeploymentPlan) -> Verdict {
    let filters = &plan.device_filters;
    let unknown = filters.unknown_keys();
    if !unknown.is_empty() {
        return Verdict::Error(format!("Invalid filter criteria: {}", unknown.join(", ")));
    }
    if filters.is_empty() {
        return Verdict::Warning(
            "No device filters specified - all devices will be targeted".to_string(),
        );
    }
    Verdict::Pass
}

fn check_rollout_percentage(percentage: u32) -> Verdict {
    if !(1..=100).contains(&percentage) {
        Verdict::Error("Rollout percentage must be between 1 and 100".to_string())
    } else if percentage < 10 {
        Verdict::Warning("Low rollout percentage may result in limited validation".to_string())
    } else {
        Verdict::Pass
    }
}

fn check_canary_settings(plan: &DeploymentPlan) -> Verdict {
    if !(1..=50).contains(&plan.canary_percentage) {
        Verdict::Error("Canary percentage must be between 1 and 50".to_string())
    } else if plan.validation_tests.is_empty() {
        Verdict::Warning("No validation tests specified for canary deployment".to_string())
    } else {
        Verdict::Pass
    }
}
