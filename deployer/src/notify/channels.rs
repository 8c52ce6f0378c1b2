//! Notification channel transports

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::errors::DeployError;
use crate::notify::dispatcher::NotificationLevel;
use crate::storage::settings::{EmailSettings, SlackSettings, WebhookSettings};

pub(crate) const CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    channel: &str,
) -> Result<(), DeployError> {
    let response = request.json(body).timeout(CHANNEL_TIMEOUT).send().await?;
    if !response.status().is_success() {
        return Err(DeployError::NotificationError(format!(
            "{} notification failed: {}",
            channel,
            response.status()
        )));
    }
    Ok(())
}

/// Send through the HTTP mail relay
pub async fn send_email(
    client: &Client,
    settings: &EmailSettings,
    message: &str,
    level: NotificationLevel,
) -> Result<(), DeployError> {
    if settings.relay_url.is_empty() {
        return Err(DeployError::NotificationError(
            "email relay_url is not configured".to_string(),
        ));
    }
    if settings.recipients.is_empty() {
        return Err(DeployError::NotificationError(
            "email has no recipients".to_string(),
        ));
    }

    let body = json!({
        "from": settings.from_address,
        "to": settings.recipients,
        "subject": format!("Deployment Notification - {}", level.as_str().to_uppercase()),
        "text": message,
    });

    let mut request = client.post(&settings.relay_url);
    if let Some(key) = &settings.api_key {
        request = request.bearer_auth(key.expose_secret());
    }
    post_json(request, &body, "email").await
}

/// Post an attachment to a Slack incoming webhook
pub async fn send_slack(
    client: &Client,
    settings: &SlackSettings,
    message: &str,
    level: NotificationLevel,
) -> Result<(), DeployError> {
    let Some(url) = &settings.webhook_url else {
        return Err(DeployError::NotificationError(
            "slack webhook_url is not configured".to_string(),
        ));
    };

    let body = json!({
        "text": "Deployment Notification",
        "attachments": [{
            "color": level.color(),
            "text": message,
            "ts": Utc::now().timestamp(),
        }],
    });
    post_json(client.post(url.expose_secret()), &body, "slack").await
}

/// Post a JSON event to the generic webhook
pub async fn send_webhook(
    client: &Client,
    settings: &WebhookSettings,
    message: &str,
    level: NotificationLevel,
) -> Result<(), DeployError> {
    if settings.url.is_empty() {
        return Err(DeployError::NotificationError(
            "webhook url is not configured".to_string(),
        ));
    }

    let body = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "level": level.as_str(),
        "message": message,
        "source": "deployment_manager",
    });

    let mut request = client.post(&settings.url);
    for (name, value) in &settings.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    post_json(request, &body, "webhook").await
}
