//! OTA service client

use std::time::Duration;

use async_trait::async_trait;
use deploy_api::Environment;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::deploy::collaborators::{Delivery, FirmwareSender};
use crate::errors::DeployError;
use crate::http::client::HttpClient;

/// Key of the OTA service in `Environment::api_endpoints`
pub const OTA_SERVICE: &str = "ota_service";

#[derive(Debug, Clone, Serialize)]
struct UpdateRequest<'a> {
    firmware_version: &'a str,
    force_update: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct UpdateResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    current_version: Option<String>,
}

/// Triggers device updates through each environment's OTA service
pub struct HttpFirmwareSender {
    timeout: Duration,
}

impl HttpFirmwareSender {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl FirmwareSender for HttpFirmwareSender {
    async fn send_firmware(
        &self,
        device_id: &str,
        firmware_version: &str,
        environment: &Environment,
    ) -> Result<Delivery, DeployError> {
        let base_url = environment.api_endpoints.get(OTA_SERVICE).ok_or_else(|| {
            DeployError::TransportError(format!(
                "environment {} has no {} endpoint",
                environment.name, OTA_SERVICE
            ))
        })?;

        let client = HttpClient::with_timeout(base_url, self.timeout)?;
        let path = format!("/api/devices/{}/update", device_id);
        let request = UpdateRequest {
            firmware_version,
            force_update: false,
        };
        let response: UpdateResponse = client
            .post(&path, &request)
            .await
            .map_err(|e| DeployError::TransportError(e.to_string()))?;

        if !response.success {
            warn!(
                "OTA update rejected for {}: {}",
                device_id,
                response.message.as_deref().unwrap_or("no reason given")
            );
            return Ok(Delivery::rejected());
        }

        debug!("OTA update triggered for {}", device_id);
        let delivery = Delivery::accepted();
        Ok(match response.current_version {
            Some(version) if version != "unknown" => delivery.replacing(version),
            _ => delivery,
        })
    }
}
