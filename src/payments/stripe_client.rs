use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, Currency, Webhook, WebhookError,
};

use crate::{
    domain::PaymentOutcome,
    error::{AppError, Result},
    payments::{malformed, CallbackPayload, GatewayOrder, OrderRequest, PaymentGateway, RawCallback},
};

/// Stripe Checkout as a booking gateway: the checkout session is the
/// gateway order, and webhook events report its outcome.
pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(api_key: String, webhook_secret: String, base_url: String) -> Self {
        let client = Client::new(api_key);
        Self {
            client,
            webhook_secret,
            base_url,
        }
    }

    fn currency(code: &str) -> Result<Currency> {
        match code.to_ascii_lowercase().as_str() {
            "inr" => Ok(Currency::INR),
            "usd" => Ok(Currency::USD),
            "eur" => Ok(Currency::EUR),
            "gbp" => Ok(Currency::GBP),
            other => Err(AppError::Gateway(format!("Unsupported Stripe currency: {}", other))),
        }
    }

    fn outcome_for(event_type: &str) -> Option<PaymentOutcome> {
        match event_type {
            "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
                Some(PaymentOutcome::Success)
            }
            "checkout.session.expired" | "checkout.session.async_payment_failed" => {
                Some(PaymentOutcome::Failure)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
        let success_url = format!("{}/bookings/{}/confirmation", self.base_url, request.booking_id);
        let cancel_url = format!("{}/bookings/{}/payment", self.base_url, request.booking_id);

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency: Self::currency(&request.currency)?,
                unit_amount: Some(request.amount_cents),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.description.clone(),
                    description: Some(format!("Booking {}", request.booking_id)),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("booking_id".to_string(), request.booking_id.to_string());
        params.metadata = Some(metadata);
        let booking_id_str = request.booking_id.to_string();
        params.client_reference_id = Some(&booking_id_str);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe error: {}", e)))?;

        Ok(GatewayOrder {
            order_id: session.id.to_string(),
            checkout_url: session.url,
        })
    }

    fn parse_callback(&self, raw: &RawCallback) -> Result<CallbackPayload> {
        let event: serde_json::Value =
            serde_json::from_str(&raw.body).map_err(|_| malformed("invalid JSON body"))?;

        let event_type = event["type"].as_str().ok_or_else(|| malformed("missing event type"))?;
        let outcome = Self::outcome_for(event_type).ok_or_else(|| {
            tracing::debug!("Unhandled webhook event type: {}", event_type);
            AppError::BadRequest(format!("Unhandled webhook event type: {}", event_type))
        })?;

        let session = &event["data"]["object"];
        let order_id = session["id"]
            .as_str()
            .ok_or_else(|| malformed("missing checkout session id"))?;

        Ok(CallbackPayload {
            order_id: order_id.to_string(),
            payment_id: session["payment_intent"].as_str().map(str::to_string),
            signature: raw.signature_header.clone(),
            outcome,
        })
    }

    fn verify_callback(&self, raw: &RawCallback, _payload: &CallbackPayload) -> Result<()> {
        let signature = raw
            .signature_header
            .as_deref()
            .ok_or(AppError::SignatureInvalid)?;

        Webhook::construct_event(&raw.body, signature, &self.webhook_secret)
            .map(|_| ())
            .map_err(|e: WebhookError| {
                tracing::debug!("Stripe webhook rejected: {}", e);
                AppError::SignatureInvalid
            })
    }
}
