//! Payment gateway abstraction.
//!
//! A gateway does two things for the booking core: it creates an order the
//! customer pays against, and it turns a raw callback into a payload whose
//! authenticity can be checked. Reconciling that payload into booking state
//! is the payment service's job.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::{PaymentProvider, PaymentsConfig, ServerConfig},
    domain::PaymentOutcome,
    error::{AppError, Result},
};

pub mod razorpay;
pub mod sandbox;
pub mod signature;
pub mod stripe_client;

pub use razorpay::RazorpayGateway;
pub use sandbox::SandboxGateway;
pub use stripe_client::StripeGateway;

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub order_id: String,
    /// Hosted checkout page, for gateways that have one.
    pub checkout_url: Option<String>,
}

/// A callback exactly as it reached us. Nothing in here is trusted.
#[derive(Debug, Clone, Default)]
pub struct RawCallback {
    pub body: String,
    pub content_type: Option<String>,
    pub signature_header: Option<String>,
}

/// Structurally parsed, not yet verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    pub order_id: String,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub outcome: PaymentOutcome,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Creates an order at the gateway. Network failures surface as
    /// `AppError::Gateway` so the caller can retry.
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder>;

    /// Extracts the order reference and outcome. Malformed bodies are
    /// `BadRequest`; authenticity is not checked here.
    fn parse_callback(&self, raw: &RawCallback) -> Result<CallbackPayload>;

    /// Fails with `AppError::SignatureInvalid` unless the callback was signed
    /// by the gateway.
    fn verify_callback(&self, raw: &RawCallback, payload: &CallbackPayload) -> Result<()>;
}

/// Builds the gateway selected in configuration. Falls back to the sandbox
/// when the selected provider has no credentials.
pub fn build_gateway(
    config: &PaymentsConfig,
    server: &ServerConfig,
) -> Result<Arc<dyn PaymentGateway>> {
    match config.provider {
        PaymentProvider::Razorpay => match &config.razorpay {
            Some(razorpay) => {
                tracing::info!("Razorpay payment processing enabled");
                Ok(Arc::new(RazorpayGateway::new(razorpay.clone())?))
            }
            None => {
                tracing::warn!("Razorpay selected but missing configuration, using sandbox gateway");
                Ok(Arc::new(SandboxGateway::new(config.sandbox_secret.clone())))
            }
        },
        PaymentProvider::Stripe => match &config.stripe {
            Some(stripe) => {
                tracing::info!("Stripe payment processing enabled");
                Ok(Arc::new(StripeGateway::new(
                    stripe.secret_key.clone(),
                    stripe.webhook_secret.clone(),
                    server.base_url.clone(),
                )))
            }
            None => {
                tracing::warn!("Stripe selected but missing configuration, using sandbox gateway");
                Ok(Arc::new(SandboxGateway::new(config.sandbox_secret.clone())))
            }
        },
        PaymentProvider::Sandbox => {
            tracing::info!("Sandbox payment gateway enabled; no real charges will be made");
            Ok(Arc::new(SandboxGateway::new(config.sandbox_secret.clone())))
        }
    }
}

pub(crate) fn malformed(what: &str) -> AppError {
    AppError::BadRequest(format!("Malformed gateway callback: {}", what))
}
