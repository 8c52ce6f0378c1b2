//! Error types for the deployment orchestrator

use thiserror::Error;

/// Main error type for fwdeploy
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("deployment plan not found: {0}")]
    PlanNotFound(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("approval required for plan {0}")]
    ApprovalRequired(String),

    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("environment saturated: {env} already runs {active} deployment(s)")]
    EnvironmentSaturated { env: String, active: usize },

    #[error("rollback not allowed: {0}")]
    RollbackNotAllowed(String),

    #[error("Device registry error: {0}")]
    DeviceRegistryError(String),

    #[error("Firmware transport error: {0}")]
    TransportError(String),

    #[error("Check error: {0}")]
    CheckError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
