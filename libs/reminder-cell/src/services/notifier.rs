use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

/// Outbound channel for reminder messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Posts `{from, to, subject, text}` to a transactional mail API.
pub struct HttpEmailNotifier {
    client: Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpEmailNotifier {
    pub fn new(endpoint: &str, api_key: &str, from: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for HttpEmailNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        debug!("Sending reminder email to {}", to);

        let mut req = self.client
            .post(&self.endpoint)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": body,
            }));
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Mail API error ({}): {}", status, error_text));
        }

        Ok(())
    }
}

/// Writes reminders to the log instead of sending them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(recipient = %to, subject = %subject, "Reminder (log only): {}", body);
        Ok(())
    }
}

pub fn notifier_from_config(config: &AppConfig) -> Arc<dyn Notifier> {
    match &config.notifier_url {
        Some(url) => Arc::new(HttpEmailNotifier::new(url, &config.notifier_api_key, &config.notifier_from)),
        None => {
            warn!("NOTIFIER_URL not set, reminders will only be logged");
            Arc::new(LogNotifier)
        }
    }
}
