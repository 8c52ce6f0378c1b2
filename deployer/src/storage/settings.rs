//! Configuration document management

use std::collections::BTreeMap;
use std::path::Path;

use deploy_api::{DeploymentStage, Environment, NotificationChannel};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::DeployError;
use crate::logs::LogLevel;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "deployment-config.yaml";

/// Orchestrator settings, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub global: GlobalSettings,

    /// Environment name -> environment policy
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub quality_gates: QualityGateSettings,

    #[serde(default)]
    pub strategies: StrategySettings,

    #[serde(default)]
    pub health_checks: HealthCheckSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Named pre/post-deployment checks and validation tests
    #[serde(default)]
    pub checks: BTreeMap<String, CheckEndpoint>,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    /// Static device inventory, used instead of the device service when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Vec<InventoryDevice>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global: GlobalSettings::default(),
            environments: default_environments(),
            notifications: NotificationSettings::default(),
            quality_gates: QualityGateSettings::default(),
            strategies: StrategySettings::default(),
            health_checks: HealthCheckSettings::default(),
            monitor: MonitorSettings::default(),
            checks: BTreeMap::new(),
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            inventory: None,
        }
    }
}

impl Settings {
    /// Read settings from a YAML file, falling back to the built-in defaults
    /// when the file does not exist
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        if !path.exists() {
            warn!(
                "Configuration file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml(&raw)?;
        info!(
            "Loaded configuration from {} ({} environments)",
            path.display(),
            settings.environments.len()
        );
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, DeployError> {
        let mut settings: Settings = serde_yaml::from_str(raw)?;
        if settings.environments.is_empty() {
            settings.environments = default_environments();
        }
        for (name, env) in settings.environments.iter_mut() {
            if env.name.is_empty() {
                env.name = name.clone();
            } else if env.name != *name {
                return Err(DeployError::ConfigError(format!(
                    "environment key '{}' does not match its name '{}'",
                    name, env.name
                )));
            }
        }
        Ok(settings)
    }

    /// Environments in configuration order
    pub fn environment_list(&self) -> Vec<Environment> {
        self.environments.values().cloned().collect()
    }
}

/// Built-in `development` and `production` environments
pub fn default_environments() -> BTreeMap<String, Environment> {
    let mut development = Environment::new("development", DeploymentStage::Development);
    development.description = "Development environment".to_string();
    development.api_endpoints.insert(
        "device_service".to_string(),
        "http://localhost:3002".to_string(),
    );
    development
        .api_endpoints
        .insert("ota_service".to_string(), "http://localhost:3004".to_string());
    development.device_groups.insert("dev_devices".to_string());
    development.approval_required = false;
    development.auto_rollback = true;

    let mut production = Environment::new("production", DeploymentStage::Production);
    production.description = "Production environment".to_string();
    production.api_endpoints.insert(
        "device_service".to_string(),
        "https://api.company.com:3002".to_string(),
    );
    production.api_endpoints.insert(
        "ota_service".to_string(),
        "https://api.company.com:3004".to_string(),
    );
    production.device_groups.insert("prod_devices".to_string());
    production.approval_required = true;
    production.auto_rollback = true;
    production.health_check_url = Some("https://api.company.com".to_string());
    production.notification_channels =
        vec![NotificationChannel::Email, NotificationChannel::Slack];

    let mut envs = BTreeMap::new();
    envs.insert(development.name.clone(), development);
    envs.insert(production.name.clone(), production);
    envs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default = "default_organization")]
    pub organization: String,

    #[serde(default = "default_environment_label")]
    pub environment_label: String,

    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_organization() -> String {
    "default".to_string()
}

fn default_environment_label() -> String {
    "production".to_string()
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            organization: default_organization(),
            environment_label: default_environment_label(),
            log_level: LogLevel::Info,
        }
    }
}

/// Notification channel credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub email: EmailSettings,

    #[serde(default)]
    pub slack: SlackSettings,

    #[serde(default)]
    pub webhook: WebhookSettings,
}

impl NotificationSettings {
    pub fn enabled_channels(&self) -> Vec<NotificationChannel> {
        let mut channels = Vec::new();
        if self.email.enabled {
            channels.push(NotificationChannel::Email);
        }
        if self.slack.enabled {
            channels.push(NotificationChannel::Slack);
        }
        if self.webhook.enabled {
            channels.push(NotificationChannel::Webhook);
        }
        channels
    }
}

/// Email is delivered through an HTTP mail relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub relay_url: String,

    #[serde(default = "default_from_address")]
    pub from_address: String,

    #[serde(default)]
    pub recipients: Vec<String>,

    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
}

fn default_from_address() -> String {
    "fwdeploy@localhost".to_string()
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            relay_url: String::new(),
            from_address: default_from_address(),
            recipients: Vec::new(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing)]
    pub webhook_url: Option<SecretString>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    /// Extra headers sent with every webhook call
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGateSettings {
    /// Applied when a plan's rollback criteria name no threshold
    #[serde(default = "default_min_success_rate")]
    pub default_min_success_rate: f64,
}

fn default_min_success_rate() -> f64 {
    80.0
}

impl Default for QualityGateSettings {
    fn default() -> Self {
        Self {
            default_min_success_rate: default_min_success_rate(),
        }
    }
}

/// Pauses used by the rollout strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySettings {
    #[serde(default = "default_blue_green_validation")]
    pub blue_green_validation_secs: u64,

    #[serde(default = "default_blue_green_switch")]
    pub blue_green_switch_secs: u64,

    #[serde(default = "default_canary_validation_period")]
    pub canary_validation_period_secs: u64,

    #[serde(default = "default_rolling_batch_pause")]
    pub rolling_batch_pause_secs: u64,
}

fn default_blue_green_validation() -> u64 {
    10
}

fn default_blue_green_switch() -> u64 {
    5
}

fn default_canary_validation_period() -> u64 {
    30
}

fn default_rolling_batch_pause() -> u64 {
    5
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            blue_green_validation_secs: default_blue_green_validation(),
            blue_green_switch_secs: default_blue_green_switch(),
            canary_validation_period_secs: default_canary_validation_period(),
            rolling_batch_pause_secs: default_rolling_batch_pause(),
        }
    }
}

impl StrategySettings {
    /// All pauses disabled
    pub fn no_pauses() -> Self {
        Self {
            blue_green_validation_secs: 0,
            blue_green_switch_secs: 0,
            canary_validation_period_secs: 0,
            rolling_batch_pause_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckSettings {
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    #[serde(default = "default_service_timeout")]
    pub service_timeout_secs: u64,

    #[serde(default = "default_cpu_warning")]
    pub cpu_warning_percent: f64,

    #[serde(default = "default_memory_warning")]
    pub memory_warning_percent: f64,

    #[serde(default = "default_disk_warning")]
    pub disk_warning_percent: f64,
}

fn default_api_timeout() -> u64 {
    10
}

fn default_service_timeout() -> u64 {
    5
}

fn default_cpu_warning() -> f64 {
    80.0
}

fn default_memory_warning() -> f64 {
    85.0
}

fn default_disk_warning() -> f64 {
    90.0
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            api_timeout_secs: default_api_timeout(),
            service_timeout_secs: default_service_timeout(),
            cpu_warning_percent: default_cpu_warning(),
            memory_warning_percent: default_memory_warning(),
            disk_warning_percent: default_disk_warning(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,

    #[serde(default = "default_history_retention")]
    pub history_retention_days: u32,
}

fn default_monitor_interval() -> u64 {
    60
}

fn default_execution_timeout() -> u64 {
    3600
}

fn default_history_retention() -> u32 {
    30
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval(),
            execution_timeout_secs: default_execution_timeout(),
            history_retention_days: default_history_retention(),
        }
    }
}

/// HTTP endpoint backing a named check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckEndpoint {
    pub url: String,

    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
}

fn default_expected_status() -> u16 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// REST API credentials; the API is open when neither is set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    #[serde(default, skip_serializing)]
    pub jwt_secret: Option<SecretString>,
}

impl AuthSettings {
    pub fn is_open(&self) -> bool {
        self.api_key.is_none() && self.jwt_secret.is_none()
    }
}

/// Device entry of the static inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryDevice {
    pub device_id: String,

    #[serde(default)]
    pub device_type: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub firmware_version: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Environment the device belongs to, any environment when unset
    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default = "default_true")]
    pub online: bool,
}

fn default_true() -> bool {
    true
}
