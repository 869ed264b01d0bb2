use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::{
    config::WebhookConfig,
    error::{AppError, Result},
    integrations::{BaseIntegration, Integration, IntegrationEvent},
};

/// Posts each booking event as JSON to a configured URL.
pub struct WebhookIntegration {
    base: BaseIntegration,
    client: Client,
    config: WebhookConfig,
}

impl WebhookIntegration {
    pub fn new(config: Option<WebhookConfig>) -> Option<Self> {
        let cfg = config.filter(|cfg| cfg.enabled)?;

        let client = match Client::builder().timeout(Duration::from_secs(10)).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Booking webhook disabled, HTTP client failed to build: {}", e);
                return None;
            }
        };

        Some(Self {
            base: BaseIntegration::new("Webhook", cfg.enabled),
            client,
            config: cfg,
        })
    }
}

#[async_trait]
impl Integration for WebhookIntegration {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn is_enabled(&self) -> bool {
        self.base.enabled
    }

    async fn health_check(&self) -> Result<()> {
        if !(self.config.url.starts_with("http://") || self.config.url.starts_with("https://")) {
            return Err(AppError::Integration(format!(
                "Webhook URL must be http(s): {}",
                self.config.url
            )));
        }
        Ok(())
    }

    async fn handle_event(&self, event: &IntegrationEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.config.url)
            .json(event)
            .send()
            .await
            .map_err(|e| AppError::Integration(format!("Webhook delivery failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Integration(format!(
                "Webhook endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
