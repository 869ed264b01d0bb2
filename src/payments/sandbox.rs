use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    domain::PaymentOutcome,
    error::{AppError, Result},
    payments::{
        malformed, signature, CallbackPayload, GatewayOrder, OrderRequest, PaymentGateway,
        RawCallback,
    },
};

/// Local gateway for development and tests. Orders are minted in-process and
/// callbacks are JSON signed with the same HMAC scheme Razorpay uses.
pub struct SandboxGateway {
    secret: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SandboxStatus {
    Success,
    Failed,
}

#[derive(Debug, Deserialize)]
struct SandboxCallback {
    order_id: String,
    payment_id: Option<String>,
    signature: Option<String>,
    status: SandboxStatus,
}

impl SandboxGateway {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Signature a real gateway would attach for this order and payment.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        signature::sign_order_payment(&self.secret, order_id, payment_id)
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
        let order_id = format!("order_sandbox_{}", uuid::Uuid::new_v4().simple());
        tracing::debug!(
            "Sandbox order {} for booking {} ({} {})",
            order_id,
            request.booking_id,
            request.amount_cents,
            request.currency
        );

        Ok(GatewayOrder {
            order_id,
            checkout_url: None,
        })
    }

    fn parse_callback(&self, raw: &RawCallback) -> Result<CallbackPayload> {
        let callback: SandboxCallback =
            serde_json::from_str(&raw.body).map_err(|_| malformed("invalid sandbox body"))?;

        Ok(CallbackPayload {
            order_id: callback.order_id,
            payment_id: callback.payment_id,
            signature: callback.signature,
            outcome: match callback.status {
                SandboxStatus::Success => PaymentOutcome::Success,
                SandboxStatus::Failed => PaymentOutcome::Failure,
            },
        })
    }

    fn verify_callback(&self, _raw: &RawCallback, payload: &CallbackPayload) -> Result<()> {
        let (Some(payment_id), Some(sig)) = (&payload.payment_id, &payload.signature) else {
            return Err(AppError::SignatureInvalid);
        };

        if signature::verify_order_payment(&self.secret, &payload.order_id, payment_id, sig) {
            Ok(())
        } else {
            Err(AppError::SignatureInvalid)
        }
    }
}
