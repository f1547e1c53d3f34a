use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::error::NotificationError;
use crate::models::{EmailPayload, Notification};

/// Delivers one email. Implementations may block on the network; the
/// dispatcher worker is the only caller.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Posts the notification to an email-sending webhook as JSON.
pub struct WebhookTransport {
    client: Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl EmailTransport for WebhookTransport {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        debug!("Posting {:?} email {} to webhook", notification.kind, notification.id);

        let response = self.client
            .post(&self.url)
            .json(&EmailPayload::from(notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Transport(format!("webhook returned {}: {}", status, body)));
        }

        Ok(())
    }
}

/// Writes the email to the log instead of sending it.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            notification_id = %notification.id,
            kind = ?notification.kind,
            to = %notification.recipient_email,
            "Email '{}' for {} (Dr. {} on {} at {})",
            notification.subject(),
            notification.context.patient_name,
            notification.context.doctor_name,
            notification.context.date,
            notification.context.time.format("%H:%M"),
        );
        Ok(())
    }
}

/// Webhook when configured, log otherwise.
pub fn transport_from_config(config: &AppConfig) -> Arc<dyn EmailTransport> {
    match &config.notification_webhook_url {
        Some(url) => {
            info!("Email notifications will be posted to {}", url);
            Arc::new(WebhookTransport::new(url.clone()))
        }
        None => {
            info!("NOTIFICATION_WEBHOOK_URL not set, emails will be logged");
            Arc::new(LogTransport)
        }
    }
}
