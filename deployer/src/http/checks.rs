//! Named deployment checks backed by HTTP endpoints

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use deploy_api::Environment;
use reqwest::Client;
use tracing::{info, warn};

use crate::deploy::collaborators::CheckRunner;
use crate::errors::DeployError;
use crate::storage::settings::CheckEndpoint;

/// Runs a check by calling its configured URL and comparing the status code
///
/// A check with no configured endpoint fails.
pub struct HttpCheckRunner {
    client: Client,
    checks: BTreeMap<String, CheckEndpoint>,
}

impl HttpCheckRunner {
    pub fn new(
        checks: BTreeMap<String, CheckEndpoint>,
        timeout: Duration,
    ) -> Result<Self, DeployError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, checks })
    }
}

#[async_trait]
impl CheckRunner for HttpCheckRunner {
    async fn run_check(
        &self,
        name: &str,
        execution_id: &str,
        environment: &Environment,
    ) -> Result<bool, DeployError> {
        let endpoint = self.checks.get(name).ok_or_else(|| {
            DeployError::CheckError(format!("no endpoint configured for check {}", name))
        })?;

        let response = self
            .client
            .get(&endpoint.url)
            .query(&[
                ("execution_id", execution_id),
                ("environment", environment.name.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DeployError::CheckError(format!("{}: {}", name, e)))?;

        let status = response.status().as_u16();
        let passed = status == endpoint.expected_status;
        if passed {
            info!("Check {} passed", name);
        } else {
            warn!(
                "Check {} failed: expected status {}, got {}",
                name, endpoint.expected_status, status
            );
        }
        Ok(passed)
    }
}
