//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use deploy_api::{
    ActionResponse, ApproveRequest, ConfigResponse, EnvironmentList, EnvironmentSummary,
    ErrorResponse, ExecuteResponse, ExecutionList, ExecutionSummary, HealthChecksResponse,
    HealthResponse, PlanCreated, PlanList, PlanSpec, Strategy, VersionResponse,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::DeployError;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error body plus status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse::new(message),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::PlanNotFound(_) => Self::not_found("deployment plan not found"),
            DeployError::ExecutionNotFound(_) => Self::not_found("execution not found"),
            DeployError::EnvironmentNotFound(_) => Self::not_found("environment not found"),
            DeployError::ApprovalRequired(_) => {
                Self::new(StatusCode::CONFLICT, "approval required")
            }
            DeployError::ValidationFailed(errors) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: ErrorResponse::with_details("validation failed", errors),
            },
            DeployError::EnvironmentSaturated { .. } => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "environment saturated")
            }
            DeployError::RollbackNotAllowed(reason) => Self::new(StatusCode::CONFLICT, reason),
            other => {
                error!("Request failed: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type Shared = State<Arc<ServerState>>;

pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployment-manager".to_string(),
        version: version.version,
    })
}

pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

pub async fn config_handler(State(state): Shared) -> impl IntoResponse {
    Json(ConfigResponse {
        strategies: Strategy::ALL.iter().map(|s| s.to_string()).collect(),
        environments: state.orchestrator.environments().names(),
        notification_channels: state.notification_channels.clone(),
    })
}

// -------------------------------------------------------------------------
// Environments
// -------------------------------------------------------------------------

pub async fn list_environments_handler(State(state): Shared) -> impl IntoResponse {
    let environments: Vec<EnvironmentSummary> = state
        .orchestrator
        .environments()
        .all()
        .into_iter()
        .map(EnvironmentSummary::from)
        .collect();
    let total = environments.len();
    Json(EnvironmentList {
        environments,
        total,
    })
}

pub async fn get_environment_handler(
    State(state): Shared,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .orchestrator
        .environments()
        .get(&name)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("environment not found"))
}

pub async fn environment_status_handler(
    State(state): Shared,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .orchestrator
        .environment_status(&name)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("environment not found"))
}

// -------------------------------------------------------------------------
// Plans
// -------------------------------------------------------------------------

pub async fn list_plans_handler(State(state): Shared) -> impl IntoResponse {
    let plans = state.orchestrator.list_plans();
    let total = plans.len();
    Json(PlanList { plans, total })
}

pub async fn create_plan_handler(
    State(state): Shared,
    Json(spec): Json<PlanSpec>,
) -> impl IntoResponse {
    let plan = state.orchestrator.create_plan(spec);
    (
        StatusCode::CREATED,
        Json(PlanCreated {
            plan_id: plan.plan_id,
            message: "Deployment plan created successfully".to_string(),
        }),
    )
}

pub async fn get_plan_handler(
    State(state): Shared,
    Path(plan_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .orchestrator
        .get_plan(&plan_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("deployment plan not found"))
}

pub async fn validate_plan_handler(
    State(state): Shared,
    Path(plan_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .orchestrator
        .validate_plan(&plan_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("deployment plan not found"))
}

pub async fn approve_plan_handler(
    State(state): Shared,
    Path(plan_id): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.orchestrator.approve(&plan_id, &request.approver).await {
        return Err(ApiError::not_found("deployment plan not found"));
    }
    Ok(Json(ActionResponse {
        success: true,
        message: format!("Deployment plan approved by {}", request.approver),
    }))
}

pub async fn execute_plan_handler(
    State(state): Shared,
    Path(plan_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let execution = state.orchestrator.execute(&plan_id)?;
    info!(
        "Execution {} started for plan {}",
        execution.execution_id, plan_id
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteResponse {
            execution_id: execution.execution_id,
            status: execution.status,
            message: "Deployment execution started".to_string(),
        }),
    ))
}

// -------------------------------------------------------------------------
// Executions
// -------------------------------------------------------------------------

pub async fn list_executions_handler(State(state): Shared) -> impl IntoResponse {
    let executions: Vec<ExecutionSummary> = state
        .orchestrator
        .list_executions()
        .iter()
        .map(ExecutionSummary::from)
        .collect();
    let total = executions.len();
    Json(ExecutionList { executions, total })
}

pub async fn get_execution_handler(
    State(state): Shared,
    Path(execution_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .orchestrator
        .get_execution(&execution_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("execution not found"))
}

pub async fn cancel_execution_handler(
    State(state): Shared,
    Path(execution_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.orchestrator.cancel(&execution_id).await {
        return Err(ApiError::not_found(
            "execution not found or already finished",
        ));
    }
    Ok(Json(ActionResponse {
        success: true,
        message: "Deployment cancelled".to_string(),
    }))
}

pub async fn rollback_execution_handler(
    State(state): Shared,
    Path(execution_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let rollback = state.orchestrator.rollback(&execution_id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteResponse {
            execution_id: rollback.execution_id,
            status: rollback.status,
            message: format!("Rollback of {} started", execution_id),
        }),
    ))
}

pub async fn execution_report_handler(
    State(state): Shared,
    Path(execution_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .orchestrator
        .execution_report(&execution_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("execution not found"))
}

// -------------------------------------------------------------------------
// Health, metrics and reports
// -------------------------------------------------------------------------

pub async fn health_checks_handler(State(state): Shared) -> impl IntoResponse {
    Json(HealthChecksResponse {
        environments: state.orchestrator.health_check_all().await,
    })
}

pub async fn metrics_handler(State(state): Shared) -> impl IntoResponse {
    Json(state.orchestrator.metrics())
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    7
}

pub async fn summary_report_handler(
    State(state): Shared,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    Json(state.orchestrator.summary_report(query.days, Utc::now()))
}
