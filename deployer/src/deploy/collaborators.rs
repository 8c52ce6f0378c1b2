//! Interfaces to the services the orchestrator drives

use std::sync::Arc;

use async_trait::async_trait;
use deploy_api::{DeviceFilters, Environment, HealthReport};

use crate::errors::DeployError;
use crate::notify::dispatcher::NotificationLevel;
use crate::storage::settings::InventoryDevice;

/// Reachability of an environment's device fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    pub online: usize,
    pub total: usize,
}

/// Resolves device filters to concrete device ids
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Device ids matching `filters` in `environment`, in a stable order
    async fn resolve(
        &self,
        filters: &DeviceFilters,
        environment: &Environment,
    ) -> Result<Vec<String>, DeployError>;

    async fn connectivity(&self, environment: &Environment) -> Result<Connectivity, DeployError>;
}

/// Transport verdict for one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub accepted: bool,

    /// Version the device ran before the update, when the transport knows it
    pub replaced_version: Option<String>,
}

impl Delivery {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            replaced_version: None,
        }
    }

    pub fn rejected() -> Self {
        Self::default()
    }

    pub fn replacing(mut self, version: impl Into<String>) -> Self {
        self.replaced_version = Some(version.into());
        self
    }
}

/// Pushes a firmware version to one device
#[async_trait]
pub trait FirmwareSender: Send + Sync {
    /// A rejected delivery means the device refused or failed the update
    async fn send_firmware(
        &self,
        device_id: &str,
        firmware_version: &str,
        environment: &Environment,
    ) -> Result<Delivery, DeployError>;
}

/// Runs named pre/post-deployment checks and canary validation tests
#[async_trait]
pub trait CheckRunner: Send + Sync {
    async fn run_check(
        &self,
        name: &str,
        execution_id: &str,
        environment: &Environment,
    ) -> Result<bool, DeployError>;
}

/// Produces a composite health verdict; never fails
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, environment: &Environment) -> HealthReport;
}

/// Delivers a message to the channels of an environment; never fails
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, environment: &Environment, message: &str, level: NotificationLevel);
}

/// Every collaborator the orchestrator needs
#[derive(Clone)]
pub struct Collaborators {
    pub devices: Arc<dyn DeviceRegistry>,
    pub firmware: Arc<dyn FirmwareSender>,
    pub checks: Arc<dyn CheckRunner>,
    pub health: Arc<dyn HealthProbe>,
    pub notifier: Arc<dyn Notifier>,
}

/// Device registry backed by the configured static inventory
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceRegistry {
    devices: Vec<InventoryDevice>,
}

impl StaticDeviceRegistry {
    pub fn new(devices: Vec<InventoryDevice>) -> Self {
        Self { devices }
    }

    fn in_environment<'a>(
        &'a self,
        environment: &'a Environment,
    ) -> impl Iterator<Item = &'a InventoryDevice> + 'a {
        self.devices.iter().filter(move |device| {
            device
                .environment
                .as_deref()
                .map_or(true, |name| name == environment.name)
        })
    }
}

/// Whether a device matches every recognized filter
pub fn matches_filters(device: &InventoryDevice, filters: &DeviceFilters) -> bool {
    fn same(wanted: &Option<String>, actual: &Option<String>) -> bool {
        match wanted {
            None => true,
            Some(wanted) => actual
                .as_deref()
                .is_some_and(|actual| actual.eq_ignore_ascii_case(wanted)),
        }
    }

    same(&filters.device_type, &device.device_type)
        && same(&filters.location, &device.location)
        && same(&filters.firmware_version, &device.firmware_version)
        && filters.tags.iter().all(|tag| device.tags.contains(tag))
}

#[async_trait]
impl DeviceRegistry for StaticDeviceRegistry {
    async fn resolve(
        &self,
        filters: &DeviceFilters,
        environment: &Environment,
    ) -> Result<Vec<String>, DeployError> {
        Ok(self
            .in_environment(environment)
            .filter(|device| matches_filters(device, filters))
            .map(|device| device.device_id.clone())
            .collect())
    }

    async fn connectivity(&self, environment: &Environment) -> Result<Connectivity, DeployError> {
        let (online, total) = self
            .in_environment(environment)
            .fold((0, 0), |(online, total), device| {
                (online + usize::from(device.online), total + 1)
            });
        Ok(Connectivity { online, total })
    }
}
