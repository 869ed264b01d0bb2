use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::domain::Booking;
use crate::error::Result;

pub mod webhook;

/// Booking lifecycle notifications, emitted after the transition commits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "booking", rename_all = "snake_case")]
pub enum IntegrationEvent {
    BookingConfirmed(Booking),
    BookingFailed(Booking),
    BookingCancelled(Booking),
    /// Payment arrived after cancellation; the refund collaborator owes it back.
    RefundOwed(Booking),
}

impl IntegrationEvent {
    pub fn booking(&self) -> &Booking {
        match self {
            IntegrationEvent::BookingConfirmed(booking)
            | IntegrationEvent::BookingFailed(booking)
            | IntegrationEvent::BookingCancelled(booking)
            | IntegrationEvent::RefundOwed(booking) => booking,
        }
    }
}

#[async_trait]
pub trait Integration: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    async fn health_check(&self) -> Result<()>;
    async fn handle_event(&self, event: &IntegrationEvent) -> Result<()>;
}

#[derive(Default)]
pub struct IntegrationManager {
    integrations: RwLock<Vec<Arc<dyn Integration>>>,
}

impl IntegrationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, integration: Arc<dyn Integration>) {
        if integration.is_enabled() {
            tracing::info!("Registered integration: {}", integration.name());
            self.integrations.write().await.push(integration);
        }
    }

    /// Fans the event out to every enabled integration. Failures are logged
    /// and never reach the booking flow that emitted the event.
    pub async fn handle_event(&self, event: IntegrationEvent) {
        let integrations = self.integrations.read().await;

        for integration in integrations.iter() {
            if !integration.is_enabled() {
                continue;
            }

            match integration.handle_event(&event).await {
                Ok(_) => {
                    tracing::debug!(
                        "Integration {} handled event for booking {}",
                        integration.name(),
                        event.booking().id
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Integration {} failed to handle event: {:?}",
                        integration.name(),
                        e
                    );
                }
            }
        }
    }

    pub async fn health_check_all(&self) -> Vec<(String, Result<()>)> {
        let integrations = self.integrations.read().await;
        let mut results = Vec::new();

        for integration in integrations.iter() {
            let name = integration.name().to_string();
            let result = integration.health_check().await;
            results.push((name, result));
        }

        results
    }
}

// Base implementation for common integration functionality
pub struct BaseIntegration {
    pub name: String,
    pub enabled: bool,
}

impl BaseIntegration {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
        }
    }
}
