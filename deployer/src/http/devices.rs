//! Device service client

use std::time::Duration;

use async_trait::async_trait;
use deploy_api::{DeviceFilters, Environment};
use serde::Deserialize;
use tracing::debug;

use crate::deploy::collaborators::{matches_filters, Connectivity, DeviceRegistry};
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::storage::settings::InventoryDevice;

/// Key of the device service in `Environment::api_endpoints`
pub const DEVICE_SERVICE: &str = "device_service";

#[derive(Debug, Clone, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DeviceConfiguration {
    #[serde(default)]
    tags: Vec<String>,
}

/// Device record as served by `GET /api/devices`
#[derive(Debug, Clone, Deserialize)]
struct DeviceRecord {
    device_id: String,
    #[serde(default)]
    firmware_version: Option<String>,
    #[serde(default)]
    is_online: bool,
    #[serde(default)]
    device_type: Option<Named>,
    #[serde(default)]
    location: Option<Named>,
    #[serde(default)]
    configuration: Option<DeviceConfiguration>,
}

impl From<DeviceRecord> for InventoryDevice {
    fn from(record: DeviceRecord) -> Self {
        InventoryDevice {
            device_id: record.device_id,
            device_type: record.device_type.map(|t| t.name),
            location: record.location.map(|l| l.name),
            firmware_version: record.firmware_version,
            tags: record.configuration.unwrap_or_default().tags,
            environment: None,
            online: record.is_online,
        }
    }
}

/// Device registry backed by each environment's device service
pub struct HttpDeviceRegistry {
    timeout: Duration,
}

impl HttpDeviceRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn fetch(&self, environment: &Environment) -> Result<Vec<InventoryDevice>, DeployError> {
        let base_url = environment.api_endpoints.get(DEVICE_SERVICE).ok_or_else(|| {
            DeployError::DeviceRegistryError(format!(
                "environment {} has no {} endpoint",
                environment.name, DEVICE_SERVICE
            ))
        })?;

        let client = HttpClient::with_timeout(base_url, self.timeout)?;
        let records: Vec<DeviceRecord> = client
            .get("/api/devices")
            .await
            .map_err(|e| DeployError::DeviceRegistryError(e.to_string()))?;
        debug!(
            "Fetched {} devices for environment {}",
            records.len(),
            environment.name
        );
        Ok(records.into_iter().map(InventoryDevice::from).collect())
    }
}

#[async_trait]
impl DeviceRegistry for HttpDeviceRegistry {
    async fn resolve(
        &self,
        filters: &DeviceFilters,
        environment: &Environment,
    ) -> Result<Vec<String>, DeployError> {
        Ok(self
            .fetch(environment)
            .await?
            .into_iter()
            .filter(|device| matches_filters(device, filters))
            .map(|device| device.device_id)
            .collect())
    }

    async fn connectivity(&self, environment: &Environment) -> Result<Connectivity, DeployError> {
        let devices = self.fetch(environment).await?;
        Ok(Connectivity {
            online: devices.iter().filter(|device| device.online).count(),
            total: devices.len(),
        })
    }
}
