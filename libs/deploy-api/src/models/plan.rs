//! Deployment plan models

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Firmware version marker carried by rollback plans; each device is sent the
/// version it ran before the rolled-back deployment
pub const PREVIOUS_VERSION: &str = "previous";

/// Device filter keys understood by the device registry
pub const DEVICE_FILTER_KEYS: [&str; 4] = ["device_type", "location", "firmware_version", "tags"];

/// Rollout strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    BlueGreen,
    Canary,
    #[default]
    Rolling,
    Immediate,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::BlueGreen,
        Strategy::Canary,
        Strategy::Rolling,
        Strategy::Immediate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::BlueGreen => "blue_green",
            Strategy::Canary => "canary",
            Strategy::Rolling => "rolling",
            Strategy::Immediate => "immediate",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "blue_green" | "bluegreen" => Ok(Strategy::BlueGreen),
            "canary" => Ok(Strategy::Canary),
            "rolling" => Ok(Strategy::Rolling),
            "immediate" => Ok(Strategy::Immediate),
            _ => Err(format!("Invalid strategy: {}", s)),
        }
    }
}

/// Criteria selecting the devices a plan targets
///
/// Unrecognized keys are kept in `extra` so they can be reported by the
/// validator and survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DeviceFilters {
    pub fn is_empty(&self) -> bool {
        self.device_type.is_none()
            && self.location.is_none()
            && self.firmware_version.is_none()
            && self.tags.is_empty()
            && self.extra.is_empty()
    }

    pub fn unknown_keys(&self) -> Vec<String> {
        self.extra.keys().cloned().collect()
    }
}

/// Conditions under which a rollout is aborted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollbackCriteria {
    /// Percentage of devices that must succeed after every batch; the
    /// configured default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_success_rate: Option<f64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Fields supplied when creating a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub firmware_version: String,

    pub source_environment: String,

    pub target_environment: String,

    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default = "default_created_by")]
    pub created_by: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub device_filters: DeviceFilters,

    #[serde(default = "default_rollout_percentage")]
    pub rollout_percentage: u32,

    #[serde(default = "default_canary_percentage")]
    pub canary_percentage: u32,

    #[serde(default)]
    pub validation_tests: Vec<String>,

    #[serde(default)]
    pub pre_deployment_checks: Vec<String>,

    #[serde(default)]
    pub post_deployment_checks: Vec<String>,

    #[serde(default)]
    pub rollback_criteria: RollbackCriteria,
}

fn default_created_by() -> String {
    "api_user".to_string()
}

fn default_rollout_percentage() -> u32 {
    100
}

fn default_canary_percentage() -> u32 {
    10
}

impl PlanSpec {
    /// A spec with every optional field at its default
    pub fn new(
        name: impl Into<String>,
        firmware_version: impl Into<String>,
        source_environment: impl Into<String>,
        target_environment: impl Into<String>,
        strategy: Strategy,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            firmware_version: firmware_version.into(),
            source_environment: source_environment.into(),
            target_environment: target_environment.into(),
            strategy,
            created_by: default_created_by(),
            scheduled_at: None,
            device_filters: DeviceFilters::default(),
            rollout_percentage: default_rollout_percentage(),
            canary_percentage: default_canary_percentage(),
            validation_tests: Vec::new(),
            pre_deployment_checks: Vec::new(),
            post_deployment_checks: Vec::new(),
            rollback_criteria: RollbackCriteria::default(),
        }
    }
}

/// A declared intent to move a firmware version into an environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub plan_id: String,
    pub name: String,
    pub description: String,
    pub firmware_version: String,
    pub source_environment: String,
    pub target_environment: String,
    pub strategy: Strategy,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub device_filters: DeviceFilters,
    pub rollout_percentage: u32,
    pub canary_percentage: u32,
    pub validation_tests: Vec<String>,
    pub pre_deployment_checks: Vec<String>,
    pub post_deployment_checks: Vec<String>,
    pub rollback_criteria: RollbackCriteria,

    /// Execution this plan rolls back, set only on rollback plans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_of: Option<String>,
}

impl DeploymentPlan {
    pub fn new(plan_id: impl Into<String>, spec: PlanSpec, created_at: DateTime<Utc>) -> Self {
        Self {
            plan_id: plan_id.into(),
            name: spec.name,
            description: spec.description,
            firmware_version: spec.firmware_version,
            source_environment: spec.source_environment,
            target_environment: spec.target_environment,
            strategy: spec.strategy,
            created_by: spec.created_by,
            created_at,
            scheduled_at: spec.scheduled_at,
            approved_by: None,
            approved_at: None,
            device_filters: spec.device_filters,
            rollout_percentage: spec.rollout_percentage,
            canary_percentage: spec.canary_percentage,
            validation_tests: spec.validation_tests,
            pre_deployment_checks: spec.pre_deployment_checks,
            post_deployment_checks: spec.post_deployment_checks,
            rollback_criteria: spec.rollback_criteria,
            rollback_of: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.approved_by.is_some()
    }

    pub fn is_rollback(&self) -> bool {
        self.rollback_of.is_some()
    }
}

/// Outcome of validating a plan; warnings never make a plan invalid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,

    /// Check name -> passed
    pub checks: BTreeMap<String, bool>,
}
