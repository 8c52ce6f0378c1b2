//! Deployment execution models

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::health::HealthReport;
use crate::models::plan::DeploymentPlan;

/// Execution state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Validating,
    Deploying,
    Completed,
    Failed,
    Cancelled,
    RolledBack,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Cancelled
                | ExecutionStatus::RolledBack
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Validating => "validating",
            ExecutionStatus::Deploying => "deploying",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
            ExecutionStatus::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one device during a rollout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOutcome {
    pub device_id: String,

    /// Version sent to the device
    pub firmware_version: String,

    /// Version the device ran before, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Rollback left the device untouched because the rolled-back
    /// deployment never updated it
    #[serde(default)]
    pub skipped: bool,

    /// 1-based batch number within the strategy
    pub batch: usize,

    pub finished_at: DateTime<Utc>,
}

/// One entry of the phase timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One concrete run of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentExecution {
    pub execution_id: String,
    pub plan: DeploymentPlan,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// 0-100, never decreases, 100 only once completed
    pub progress: f64,

    pub current_stage: String,
    pub devices_targeted: usize,
    pub devices_successful: usize,
    pub devices_failed: usize,
    pub error_message: Option<String>,
    pub rollback_execution_id: Option<String>,

    /// Health reports keyed by the gate that produced them
    #[serde(default)]
    pub health_check_results: BTreeMap<String, HealthReport>,

    #[serde(default)]
    pub device_results: Vec<DeviceOutcome>,

    #[serde(default)]
    pub phases: Vec<PhaseRecord>,

    #[serde(default)]
    pub logs: Vec<String>,
}

impl DeploymentExecution {
    pub fn new(
        execution_id: impl Into<String>,
        plan: DeploymentPlan,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            plan,
            status: ExecutionStatus::Pending,
            started_at,
            completed_at: None,
            progress: 0.0,
            current_stage: "initializing".to_string(),
            devices_targeted: 0,
            devices_successful: 0,
            devices_failed: 0,
            error_message: None,
            rollback_execution_id: None,
            health_check_results: BTreeMap::new(),
            device_results: Vec::new(),
            phases: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Append a timestamped line to the execution log
    pub fn log(&mut self, message: impl AsRef<str>) {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.logs.push(format!("{} {}", ts, message.as_ref()));
    }

    /// Raise progress to `percent`; lower values are ignored
    pub fn advance_progress(&mut self, percent: f64) {
        let percent = percent.clamp(0.0, 100.0);
        if percent > self.progress {
            self.progress = percent;
        }
    }

    /// Close the running phase and open `name`
    pub fn enter_stage(&mut self, name: &str, now: DateTime<Utc>) {
        self.close_phase(now);
        self.phases.push(PhaseRecord {
            name: name.to_string(),
            started_at: now,
            finished_at: None,
        });
        self.current_stage = name.to_string();
    }

    pub fn close_phase(&mut self, now: DateTime<Utc>) {
        if let Some(phase) = self.phases.last_mut() {
            if phase.finished_at.is_none() {
                phase.finished_at = Some(now);
            }
        }
    }

    pub fn devices_processed(&self) -> usize {
        self.devices_successful + self.devices_failed
    }

    /// Percentage of processed devices that succeeded, 0 when none were processed
    pub fn success_rate(&self) -> f64 {
        let processed = self.devices_processed();
        if processed == 0 {
            0.0
        } else {
            self.devices_successful as f64 / processed as f64 * 100.0
        }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Copy of this execution keeping only the last `lines` log lines
    pub fn with_log_tail(&self, lines: usize) -> Self {
        let mut copy = self.clone();
        let skip = copy.logs.len().saturating_sub(lines);
        copy.logs.drain(..skip);
        copy
    }
}
