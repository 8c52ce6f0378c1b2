//! Health report models

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: HealthStatus,

    /// Seconds the probe took, when it measured a round trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl CheckResult {
    pub fn healthy() -> Self {
        Self::with_status(HealthStatus::Healthy)
    }

    pub fn with_status(status: HealthStatus) -> Self {
        Self {
            status,
            response_time: None,
            error: None,
            details: BTreeMap::new(),
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(HealthStatus::Unhealthy)
        }
    }

    pub fn response_time(mut self, secs: f64) -> Self {
        self.response_time = Some(secs);
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Composite verdict over every probe run against an environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub environment: String,
    pub timestamp: DateTime<Utc>,
    pub overall_status: HealthStatus,

    /// Seconds the whole check run took
    pub response_time: f64,

    pub checks: BTreeMap<String, CheckResult>,

    /// Names of every check that did not report healthy
    #[serde(default)]
    pub failed_checks: Vec<String>,
}

impl HealthReport {
    /// Build a report; any non-healthy check makes the whole report unhealthy
    pub fn from_checks(
        environment: impl Into<String>,
        checks: BTreeMap<String, CheckResult>,
        response_time: f64,
    ) -> Self {
        let failed_checks: Vec<String> = checks
            .iter()
            .filter(|(_, result)| result.status != HealthStatus::Healthy)
            .map(|(name, _)| name.clone())
            .collect();

        let overall_status = if failed_checks.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        Self {
            environment: environment.into(),
            timestamp: Utc::now(),
            overall_status,
            response_time,
            checks,
            failed_checks,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == HealthStatus::Healthy
    }
}
