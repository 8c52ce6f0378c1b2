//! Orchestrator REST API client used by the CLI

use deploy_api::{
    ActionResponse, ApproveRequest, ConfigResponse, DeploymentExecution, DeploymentPlan,
    Environment, EnvironmentList, EnvironmentStatus, ExecuteResponse, ExecutionList,
    ExecutionReport, HealthChecksResponse, MetricsResponse, PlanCreated, PlanList, PlanSpec,
    SummaryReport, ValidationResult,
};

use crate::errors::DeployError;
use crate::http::client::HttpClient;

impl HttpClient {
    pub async fn get_config(&self) -> Result<ConfigResponse, DeployError> {
        self.get("/api/config").await
    }

    pub async fn list_environments(&self) -> Result<EnvironmentList, DeployError> {
        self.get("/api/environments").await
    }

    pub async fn get_environment(&self, name: &str) -> Result<Environment, DeployError> {
        self.get(&format!("/api/environments/{}", name)).await
    }

    pub async fn environment_status(&self, name: &str) -> Result<EnvironmentStatus, DeployError> {
        self.get(&format!("/api/environments/{}/status", name))
            .await
    }

    pub async fn list_plans(&self) -> Result<PlanList, DeployError> {
        self.get("/api/plans").await
    }

    pub async fn get_plan(&self, plan_id: &str) -> Result<DeploymentPlan, DeployError> {
        self.get(&format!("/api/plans/{}", plan_id)).await
    }

    pub async fn create_plan(&self, spec: &PlanSpec) -> Result<PlanCreated, DeployError> {
        self.post("/api/plans", spec).await
    }

    pub async fn validate_plan(&self, plan_id: &str) -> Result<ValidationResult, DeployError> {
        self.post_empty(&format!("/api/plans/{}/validate", plan_id))
            .await
    }

    pub async fn approve_plan(
        &self,
        plan_id: &str,
        approver: &str,
    ) -> Result<ActionResponse, DeployError> {
        let body = ApproveRequest {
            approver: approver.to_string(),
        };
        self.post(&format!("/api/plans/{}/approve", plan_id), &body)
            .await
    }

    pub async fn execute_plan(&self, plan_id: &str) -> Result<ExecuteResponse, DeployError> {
        self.post_empty(&format!("/api/plans/{}/execute", plan_id))
            .await
    }

    pub async fn list_executions(&self) -> Result<ExecutionList, DeployError> {
        self.get("/api/executions").await
    }

    pub async fn get_execution(
        &self,
        execution_id: &str,
    ) -> Result<DeploymentExecution, DeployError> {
        self.get(&format!("/api/executions/{}", execution_id))
            .await
    }

    pub async fn cancel_execution(&self, execution_id: &str) -> Result<ActionResponse, DeployError> {
        self.post_empty(&format!("/api/executions/{}/cancel", execution_id))
            .await
    }

    pub async fn rollback_execution(
        &self,
        execution_id: &str,
    ) -> Result<ExecuteResponse, DeployError> {
        self.post_empty(&format!("/api/executions/{}/rollback", execution_id))
            .await
    }

    pub async fn execution_report(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionReport, DeployError> {
        self.get(&format!("/api/executions/{}/report", execution_id))
            .await
    }

    pub async fn health_checks(&self) -> Result<HealthChecksResponse, DeployError> {
        self.get("/api/health").await
    }

    pub async fn metrics(&self) -> Result<MetricsResponse, DeployError> {
        self.get("/api/metrics").await
    }

    pub async fn summary_report(&self, days: u32) -> Result<SummaryReport, DeployError> {
        self.get_query("/api/reports/summary", &[("days", days)])
            .await
    }
}
