//! Fans deployment events out to an environment's notification channels

use async_trait::async_trait;
use deploy_api::{Environment, NotificationChannel};
use reqwest::Client;
use tracing::{debug, error, info};

use crate::deploy::collaborators::Notifier;
use crate::errors::DeployError;
use crate::notify::channels;
use crate::storage::settings::NotificationSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "success",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        }
    }

    /// Slack attachment color
    pub fn color(&self) -> &'static str {
        match self {
            NotificationLevel::Info | NotificationLevel::Success => "#36a64f",
            NotificationLevel::Warning => "#ff9500",
            NotificationLevel::Error => "#ff0000",
        }
    }
}

/// Delivers to email, Slack and webhook; no retries
pub struct NotificationDispatcher {
    client: Client,
    settings: NotificationSettings,
}

impl NotificationDispatcher {
    pub fn new(settings: NotificationSettings) -> Result<Self, DeployError> {
        let client = Client::builder().timeout(channels::CHANNEL_TIMEOUT).build()?;
        Ok(Self { client, settings })
    }

    async fn send(
        &self,
        channel: NotificationChannel,
        message: &str,
        level: NotificationLevel,
    ) -> Result<bool, DeployError> {
        match channel {
            NotificationChannel::Email if self.settings.email.enabled => {
                channels::send_email(&self.client, &self.settings.email, message, level).await?
            }
            NotificationChannel::Slack if self.settings.slack.enabled => {
                channels::send_slack(&self.client, &self.settings.slack, message, level).await?
            }
            NotificationChannel::Webhook if self.settings.webhook.enabled => {
                channels::send_webhook(&self.client, &self.settings.webhook, message, level)
                    .await?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn notify(&self, environment: &Environment, message: &str, level: NotificationLevel) {
        for channel in &environment.notification_channels {
            match self.send(*channel, message, level).await {
                Ok(true) => info!("{} notification sent for {}", channel, environment.name),
                Ok(false) => debug!("Notification channel {} is disabled", channel),
                Err(e) => error!("Failed to send {} notification: {}", channel, e),
            }
        }
    }
}

/// Notifier that only logs, used when no channel is enabled
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, environment: &Environment, message: &str, level: NotificationLevel) {
        info!("[{}] {} ({})", level.as_str(), message, environment.name);
    }
}
