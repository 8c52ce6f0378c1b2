//! Installed firmware versions per device

use std::collections::HashMap;

/// Last firmware version this orchestrator installed on each
/// (environment, device) pair
#[derive(Debug, Clone, Default)]
pub struct FirmwareLedger {
    installed: HashMap<(String, String), String>,
}

impl FirmwareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installed(&self, environment: &str, device_id: &str) -> Option<&str> {
        self.installed
            .get(&(environment.to_string(), device_id.to_string()))
            .map(String::as_str)
    }

    /// Record a successful install and return the version it replaced
    pub fn record(&mut self, environment: &str, device_id: &str, version: &str) -> Option<String> {
        self.installed.insert(
            (environment.to_string(), device_id.to_string()),
            version.to_string(),
        )
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}
