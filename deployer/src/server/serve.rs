//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DeployError;
use crate::server::auth::require_auth;
use crate::server::handlers::*;
use crate::server::state::ServerState;

/// Build the API router; `/health` is the only unauthenticated route
pub fn router(state: Arc<ServerState>) -> Router {
    let api = Router::new()
        .route("/version", get(version_handler))
        .route("/api/config", get(config_handler))
        // Environments
        .route("/api/environments", get(list_environments_handler))
        .route("/api/environments/{name}", get(get_environment_handler))
        .route(
            "/api/environments/{name}/status",
            get(environment_status_handler),
        )
        // Plans
        .route(
            "/api/plans",
            get(list_plans_handler).post(create_plan_handler),
        )
        .route("/api/plans/{plan_id}", get(get_plan_handler))
        .route("/api/plans/{plan_id}/validate", post(validate_plan_handler))
        .route("/api/plans/{plan_id}/approve", post(approve_plan_handler))
        .route("/api/plans/{plan_id}/execute", post(execute_plan_handler))
        // Executions
        .route("/api/executions", get(list_executions_handler))
        .route("/api/executions/{execution_id}", get(get_execution_handler))
        .route(
            "/api/executions/{execution_id}/cancel",
            post(cancel_execution_handler),
        )
        .route(
            "/api/executions/{execution_id}/rollback",
            post(rollback_execution_handler),
        )
        .route(
            "/api/executions/{execution_id}/report",
            get(execution_report_handler),
        )
        // Health, metrics and reports
        .route("/api/health", get(health_checks_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/reports/summary", get(summary_report_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DeployError>>, DeployError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DeployError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DeployError::ServerError(e.to_string()))
    });

    Ok(handle)
}
