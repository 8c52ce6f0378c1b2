//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::deploy::collaborators::{
    Collaborators, DeviceRegistry, Notifier, StaticDeviceRegistry,
};
use crate::deploy::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::environments::EnvironmentRegistry;
use crate::errors::DeployError;
use crate::health::HealthChecker;
use crate::http::{HttpCheckRunner, HttpDeviceRegistry, HttpFirmwareSender};
use crate::notify::{LogNotifier, NotificationDispatcher};
use crate::storage::settings::{AuthSettings, Settings};

const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the production collaborators described by `settings`
pub fn build_collaborators(settings: &Settings) -> Result<Collaborators, DeployError> {
    let devices: Arc<dyn DeviceRegistry> = match &settings.inventory {
        Some(inventory) => {
            info!("Using static inventory of {} devices", inventory.len());
            Arc::new(StaticDeviceRegistry::new(inventory.clone()))
        }
        None => Arc::new(HttpDeviceRegistry::new(Duration::from_secs(
            settings.health_checks.service_timeout_secs,
        ))),
    };

    let health = HealthChecker::new(settings.health_checks.clone(), devices.clone())?;
    let checks = HttpCheckRunner::new(settings.checks.clone(), TRANSPORT_TIMEOUT)?;

    let notifier: Arc<dyn Notifier> =
        if settings.notifications.enabled_channels().is_empty() {
            info!("No notification channels enabled, notifications are logged only");
            Arc::new(LogNotifier)
        } else {
            Arc::new(NotificationDispatcher::new(settings.notifications.clone())?)
        };

    Ok(Collaborators {
        devices,
        firmware: Arc::new(HttpFirmwareSender::new(TRANSPORT_TIMEOUT)),
        checks: Arc::new(checks),
        health: Arc::new(health),
        notifier,
    })
}

/// Main application state
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub auth: AuthSettings,
    pub notification_channels: Vec<String>,
}

impl AppState {
    pub fn init(settings: &Settings, options: OrchestratorOptions) -> Result<Self, DeployError> {
        info!("Initializing application state...");

        let environments = EnvironmentRegistry::from_settings(settings);
        info!("Loaded {} environments", environments.len());

        let collaborators = build_collaborators(settings)?;
        let orchestrator = Orchestrator::new(environments, collaborators, options);

        let notification_channels = settings
            .notifications
            .enabled_channels()
            .iter()
            .map(|channel| channel.as_str().to_string())
            .collect();

        Ok(Self {
            orchestrator,
            auth: settings.auth.clone(),
            notification_channels,
        })
    }

    /// Cancel every running execution
    pub async fn shutdown(&self) -> Result<(), DeployError> {
        info!("Shutting down application state...");
        self.orchestrator.shutdown().await;
        Ok(())
    }
}
