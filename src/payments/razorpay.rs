use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{
    config::RazorpayConfig,
    domain::PaymentOutcome,
    error::{AppError, Result},
    payments::{
        malformed, signature, CallbackPayload, GatewayOrder, OrderRequest, PaymentGateway,
        RawCallback,
    },
};

#[derive(Debug, Serialize)]
struct CreateOrderBody {
    amount: i64,
    currency: String,
    receipt: String,
    payment_capture: u8,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FailureMetadata {
    order_id: String,
    payment_id: Option<String>,
}

pub struct RazorpayGateway {
    client: Client,
    config: RazorpayConfig,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn order_body(request: &OrderRequest) -> CreateOrderBody {
        CreateOrderBody {
            amount: request.amount_cents,
            currency: request.currency.to_uppercase(),
            receipt: format!("booking_{}", request.booking_id),
            payment_capture: 1,
        }
    }

    fn parse_fields(raw: &RawCallback) -> Result<HashMap<String, String>> {
        let is_json = raw
            .content_type
            .as_deref()
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            serde_json::from_str(&raw.body).map_err(|_| malformed("invalid JSON body"))
        } else {
            serde_urlencoded::from_str(&raw.body).map_err(|_| malformed("invalid form body"))
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
        let response = self
            .client
            .post(format!("{}/orders", self.config.api_base))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&Self::order_body(request))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Razorpay request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!("Razorpay API error {}: {}", status, body)));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Unexpected Razorpay response: {}", e)))?;

        tracing::debug!("Created Razorpay order {} for booking {}", order.id, request.booking_id);

        Ok(GatewayOrder {
            order_id: order.id,
            checkout_url: None,
        })
    }

    fn parse_callback(&self, raw: &RawCallback) -> Result<CallbackPayload> {
        let mut fields = Self::parse_fields(raw)?;

        if let Some(order_id) = fields.remove("razorpay_order_id") {
            return Ok(CallbackPayload {
                order_id,
                payment_id: fields.remove("razorpay_payment_id"),
                signature: fields.remove("razorpay_signature"),
                outcome: PaymentOutcome::Success,
            });
        }

        // Checkout failures post the order reference inside error[metadata].
        if let Some(metadata) = fields.get("error[metadata]") {
            let metadata: FailureMetadata = serde_json::from_str(metadata)
                .map_err(|_| malformed("invalid error metadata"))?;
            return Ok(CallbackPayload {
                order_id: metadata.order_id,
                payment_id: metadata.payment_id,
                signature: None,
                outcome: PaymentOutcome::Failure,
            });
        }

        Err(malformed("missing razorpay_order_id"))
    }

    fn verify_callback(&self, _raw: &RawCallback, payload: &CallbackPayload) -> Result<()> {
        let (Some(payment_id), Some(sig)) = (&payload.payment_id, &payload.signature) else {
            return Err(AppError::SignatureInvalid);
        };

        if signature::verify_order_payment(&self.config.key_secret, &payload.order_id, payment_id, sig) {
            Ok(())
        } else {
            Err(AppError::SignatureInvalid)
        }
    }
}
