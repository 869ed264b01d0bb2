use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PaymentStatus;

/// The single payment record of a booking. Created by the first
/// `begin_payment`, then updated in place by later attempts and callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub gateway: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub transaction_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters the caller hands to the gateway's checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub booking_id: Uuid,
    pub gateway: String,
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub checkout_url: Option<String>,
}

pub fn new_transaction_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}
