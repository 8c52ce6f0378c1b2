//! Application configuration options

use std::time::Duration;

use crate::deploy::orchestrator::OrchestratorOptions;
use crate::storage::settings::Settings;
use crate::workers::monitor;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Serve the REST API
    pub enable_server: bool,

    /// Run the execution monitor
    pub enable_monitor: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Monitor worker options
    pub monitor: monitor::Options,

    /// Orchestrator options
    pub orchestrator: OrchestratorOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            enable_server: true,
            enable_monitor: true,
            server: ServerOptions::default(),
            monitor: monitor::Options::default(),
            orchestrator: OrchestratorOptions::default(),
        }
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            monitor: monitor::Options {
                interval: Duration::from_secs(settings.monitor.interval_secs),
                ..Default::default()
            },
            orchestrator: OrchestratorOptions::from_settings(settings),
            ..Default::default()
        }
    }
}

/// Lifecycle options for the daemon
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// REST server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
        }
    }
}
