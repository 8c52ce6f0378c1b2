//! REST request and response bodies

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::environment::{DeploymentStage, Environment};
use crate::models::execution::{DeploymentExecution, DeviceOutcome, ExecutionStatus, PhaseRecord};
use crate::models::health::{HealthReport, HealthStatus};
use crate::models::plan::{DeploymentPlan, Strategy};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Error body returned with every non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(error: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            error: error.into(),
            details,
        }
    }
}

/// Result of approve/cancel style actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSummary {
    pub name: String,
    pub stage: DeploymentStage,
    pub description: String,
    pub approval_required: bool,
    pub auto_rollback: bool,
    pub max_concurrent_deployments: usize,
}

impl From<&Environment> for EnvironmentSummary {
    fn from(env: &Environment) -> Self {
        Self {
            name: env.name.clone(),
            stage: env.stage,
            description: env.description.clone(),
            approval_required: env.approval_required,
            auto_rollback: env.auto_rollback,
            max_concurrent_deployments: env.max_concurrent_deployments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentList {
    pub environments: Vec<EnvironmentSummary>,
    pub total: usize,
}

/// Live view of one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentStatus {
    pub name: String,
    pub stage: DeploymentStage,
    pub health_status: HealthStatus,
    pub health_details: HealthReport,
    pub active_deployments: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanList {
    pub plans: Vec<DeploymentPlan>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCreated {
    pub plan_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub approver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub message: String,
}

/// Row of the execution listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub firmware_version: String,
    pub target_environment: String,
    pub strategy: Strategy,
    pub status: ExecutionStatus,
    pub progress: f64,
    pub current_stage: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub devices_targeted: usize,
    pub devices_successful: usize,
    pub devices_failed: usize,
    pub error_message: Option<String>,
    pub rollback_execution_id: Option<String>,
}

impl From<&DeploymentExecution> for ExecutionSummary {
    fn from(exec: &DeploymentExecution) -> Self {
        Self {
            execution_id: exec.execution_id.clone(),
            plan_id: exec.plan.plan_id.clone(),
            plan_name: exec.plan.name.clone(),
            firmware_version: exec.plan.firmware_version.clone(),
            target_environment: exec.plan.target_environment.clone(),
            strategy: exec.plan.strategy,
            status: exec.status,
            progress: exec.progress,
            current_stage: exec.current_stage.clone(),
            started_at: exec.started_at,
            completed_at: exec.completed_at,
            devices_targeted: exec.devices_targeted,
            devices_successful: exec.devices_successful,
            devices_failed: exec.devices_failed,
            error_message: exec.error_message.clone(),
            rollback_execution_id: exec.rollback_execution_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionList {
    pub executions: Vec<ExecutionSummary>,
    pub total: usize,
}

/// On-demand health check across every environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecksResponse {
    pub environments: BTreeMap<String, HealthReport>,
}

/// Aggregate counters over active and archived executions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub total_deployments: usize,
    pub completed_deployments: usize,
    pub failed_deployments: usize,
    pub cancelled_deployments: usize,
    pub active_deployments: usize,

    /// Completed over terminal executions, percent with two decimals
    pub success_rate: f64,

    pub environments: usize,
    pub plans: usize,
}

/// Per-execution report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub execution_id: String,
    pub plan_name: String,
    pub firmware_version: String,
    pub target_environment: String,
    pub strategy: Strategy,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub devices_targeted: usize,
    pub devices_successful: usize,
    pub devices_failed: usize,
    pub success_rate: f64,
    pub error_message: Option<String>,
    pub rollback_execution_id: Option<String>,
    pub device_results: Vec<DeviceOutcome>,
    pub phases: Vec<PhaseRecord>,
    pub health_check_results: BTreeMap<String, HealthReport>,
    pub logs: Vec<String>,
}

impl From<&DeploymentExecution> for ExecutionReport {
    fn from(exec: &DeploymentExecution) -> Self {
        Self {
            execution_id: exec.execution_id.clone(),
            plan_name: exec.plan.name.clone(),
            firmware_version: exec.plan.firmware_version.clone(),
            target_environment: exec.plan.target_environment.clone(),
            strategy: exec.plan.strategy,
            status: exec.status,
            started_at: exec.started_at,
            completed_at: exec.completed_at,
            duration_secs: exec.duration_secs(),
            devices_targeted: exec.devices_targeted,
            devices_successful: exec.devices_successful,
            devices_failed: exec.devices_failed,
            success_rate: (exec.success_rate() * 100.0).round() / 100.0,
            error_message: exec.error_message.clone(),
            rollback_execution_id: exec.rollback_execution_id.clone(),
            device_results: exec.device_results.clone(),
            phases: exec.phases.clone(),
            health_check_results: exec.health_check_results.clone(),
            logs: exec.logs.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub targeted: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
}

/// Summary over the executions started in the last `period_days` days
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub period_days: u32,
    pub generated_at: DateTime<Utc>,
    pub deployments: DeploymentSummary,
    pub devices: DeviceSummary,
    pub by_strategy: BTreeMap<String, usize>,
    pub by_environment: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub strategies: Vec<String>,
    pub environments: Vec<String>,
    pub notification_channels: Vec<String>,
}
