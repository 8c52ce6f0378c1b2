//! Composite environment health checks

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deploy_api::{CheckResult, Environment, HealthReport, HealthStatus};
use futures::future::join_all;
use reqwest::Client;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::deploy::collaborators::{Connectivity, DeviceRegistry, HealthProbe};
use crate::errors::DeployError;
use crate::storage::settings::HealthCheckSettings;
use crate::telemetry::{sample_resources, HostResources};
use crate::utils::{percent, round2};

/// Probes API, services, data layer, host resources and device connectivity
pub struct HealthChecker {
    client: Client,
    settings: HealthCheckSettings,
    devices: Arc<dyn DeviceRegistry>,
}

impl HealthChecker {
    pub fn new(
        settings: HealthCheckSettings,
        devices: Arc<dyn DeviceRegistry>,
    ) -> Result<Self, DeployError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            settings,
            devices,
        })
    }

    async fn probe_http(&self, base_url: &str, timeout: Duration) -> CheckResult {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        let started = Instant::now();
        match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                let status = if code == 200 {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                };
                CheckResult::with_status(status)
                    .response_time(started.elapsed().as_secs_f64())
                    .detail("status_code", code)
                    .detail("endpoint", base_url)
            }
            Err(e) => CheckResult::unhealthy(e.to_string()).detail("endpoint", base_url),
        }
    }

    async fn probe_data_store(&self, environment: &Environment) -> CheckResult {
        let Some(address) = environment.data_store.as_deref() else {
            return CheckResult::healthy().detail("configured", false);
        };
        let started = Instant::now();
        let timeout = Duration::from_secs(self.settings.service_timeout_secs);
        match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(_)) => CheckResult::healthy()
                .response_time(started.elapsed().as_secs_f64())
                .detail("address", address),
            Ok(Err(e)) => CheckResult::unhealthy(e.to_string()).detail("address", address),
            Err(_) => CheckResult::unhealthy("connection timed out").detail("address", address),
        }
    }

    async fn probe_resources(&self) -> CheckResult {
        match tokio::task::spawn_blocking(sample_resources).await {
            Ok(resources) => classify_resources(&resources, &self.settings),
            Err(e) => CheckResult::unhealthy(format!("resource sampling failed: {}", e)),
        }
    }

    async fn probe_devices(&self, environment: &Environment) -> CheckResult {
        match self.devices.connectivity(environment).await {
            Ok(connectivity) => {
                classify_connectivity(connectivity, environment.min_device_connectivity)
            }
            Err(e) => CheckResult::unhealthy(e.to_string()),
        }
    }

    /// Run every probe to completion and combine the results
    pub async fn check_environment(&self, environment: &Environment) -> HealthReport {
        let started = Instant::now();
        let api_timeout = Duration::from_secs(self.settings.api_timeout_secs);
        let service_timeout = Duration::from_secs(self.settings.service_timeout_secs);

        let api = async {
            match environment.health_check_url.as_deref() {
                Some(url) => Some(self.probe_http(url, api_timeout).await),
                None => None,
            }
        };
        let services = join_all(environment.api_endpoints.iter().map(|(name, url)| async move {
            (
                format!("service_{}", name),
                self.probe_http(url, service_timeout).await,
            )
        }));

        let (api, services, database, resources, devices) = futures::join!(
            api,
            services,
            self.probe_data_store(environment),
            self.probe_resources(),
            self.probe_devices(environment),
        );

        let mut checks = BTreeMap::new();
        if let Some(api) = api {
            checks.insert("api".to_string(), api);
        }
        checks.extend(services);
        checks.insert("database".to_string(), database);
        checks.insert("resources".to_string(), resources);
        checks.insert("devices".to_string(), devices);

        let report =
            HealthReport::from_checks(&environment.name, checks, started.elapsed().as_secs_f64());
        if report.is_healthy() {
            debug!("Environment {} is healthy", environment.name);
        } else {
            warn!(
                "Environment {} is unhealthy: {}",
                environment.name,
                report.failed_checks.join(", ")
            );
        }
        report
    }
}

#[async_trait]
impl HealthProbe for HealthChecker {
    async fn check(&self, environment: &Environment) -> HealthReport {
        self.check_environment(environment).await
    }
}

/// Warning when any resource is above its threshold
pub fn classify_resources(resources: &HostResources, settings: &HealthCheckSettings) -> CheckResult {
    let over = f64::from(resources.cpu_percent) > settings.cpu_warning_percent
        || f64::from(resources.memory_percent) > settings.memory_warning_percent
        || f64::from(resources.disk_percent) > settings.disk_warning_percent;
    let status = if over {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    };
    CheckResult::with_status(status)
        .detail("cpu_percent", round2(f64::from(resources.cpu_percent)))
        .detail("memory_percent", round2(f64::from(resources.memory_percent)))
        .detail("disk_percent", round2(f64::from(resources.disk_percent)))
        .detail("available_memory", resources.available_memory)
        .detail("free_disk", resources.free_disk)
}

/// Unhealthy when fewer than `min_percent` of the devices are online
pub fn classify_connectivity(connectivity: Connectivity, min_percent: f64) -> CheckResult {
    let rate = if connectivity.total == 0 {
        100.0
    } else {
        percent(connectivity.online, connectivity.total)
    };
    let result = if rate >= min_percent {
        CheckResult::healthy()
    } else {
        CheckResult::unhealthy(format!(
            "device connectivity {:.1}% below {:.1}%",
            rate, min_percent
        ))
    };
    result
        .detail("online_devices", connectivity.online)
        .detail("total_devices", connectivity.total)
        .detail("connectivity_rate", round2(rate))
}
