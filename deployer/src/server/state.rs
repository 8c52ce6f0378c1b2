//! Server state

use crate::deploy::orchestrator::Orchestrator;
use crate::storage::settings::AuthSettings;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Orchestrator,
    pub auth: AuthSettings,

    /// Enabled notification channel names, reported by `/api/config`
    pub notification_channels: Vec<String>,
}

impl ServerState {
    pub fn new(
        orchestrator: Orchestrator,
        auth: AuthSettings,
        notification_channels: Vec<String>,
    ) -> Self {
        Self {
            orchestrator,
            auth,
            notification_channels,
        }
    }
}
