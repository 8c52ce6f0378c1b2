//! Environment models

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Promotion stage of an environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStage {
    #[default]
    Development,
    Testing,
    Staging,
    Production,
}

impl DeploymentStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStage::Development => "development",
            DeploymentStage::Testing => "testing",
            DeploymentStage::Staging => "staging",
            DeploymentStage::Production => "production",
        }
    }
}

impl fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification channel kinds an environment can route events to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Slack,
    Webhook,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Slack => "slack",
            NotificationChannel::Webhook => "webhook",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurring window in which deployments to an environment are expected (UTC)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentWindow {
    /// Allowed weekdays, empty means every day
    #[serde(default)]
    pub days: Vec<Weekday>,

    pub start: NaiveTime,

    /// Exclusive; a window whose end is before its start wraps past midnight
    pub end: NaiveTime,
}

impl DeploymentWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if !self.days.is_empty() && !self.days.contains(&at.weekday()) {
            return false;
        }
        let time = at.time();
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// A named deployment target and its safety policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Unique key, filled from the configuration map key when omitted
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub stage: DeploymentStage,

    #[serde(default)]
    pub description: String,

    /// Named service -> base URL (`device_service`, `ota_service`, ...)
    #[serde(default)]
    pub api_endpoints: BTreeMap<String, String>,

    /// Logical device-group tags served by this environment
    #[serde(default)]
    pub device_groups: BTreeSet<String>,

    #[serde(default)]
    pub approval_required: bool,

    #[serde(default = "default_true")]
    pub auto_rollback: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,

    #[serde(default)]
    pub notification_channels: Vec<NotificationChannel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_window: Option<DeploymentWindow>,

    #[serde(default = "default_max_concurrent_deployments")]
    pub max_concurrent_deployments: usize,

    /// Seconds a rollback execution may run before it is timed out
    #[serde(default = "default_rollback_timeout")]
    pub rollback_timeout: u64,

    /// `host:port` of the data layer probed by the health checker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_store: Option<String>,

    /// Minimum percentage of reachable devices for a healthy connectivity check
    #[serde(default = "default_min_device_connectivity")]
    pub min_device_connectivity: f64,
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_deployments() -> usize {
    10
}

fn default_rollback_timeout() -> u64 {
    300
}

fn default_min_device_connectivity() -> f64 {
    80.0
}

impl Environment {
    pub fn new(name: impl Into<String>, stage: DeploymentStage) -> Self {
        Self {
            name: name.into(),
            stage,
            ..Default::default()
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            name: String::new(),
            stage: DeploymentStage::Development,
            description: String::new(),
            api_endpoints: BTreeMap::new(),
            device_groups: BTreeSet::new(),
            approval_required: false,
            auto_rollback: true,
            health_check_url: None,
            notification_channels: Vec::new(),
            deployment_window: None,
            max_concurrent_deployments: default_max_concurrent_deployments(),
            rollback_timeout: default_rollback_timeout(),
            data_store: None,
            min_device_connectivity: default_min_device_connectivity(),
        }
    }
}
