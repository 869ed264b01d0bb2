use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Slot, SlotKey};
use crate::error::{AppError, Result};

/// Payment status shared by bookings and their payment record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Confirmed,
    /// Set by the refund collaborator, never by the booking core.
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "confirmed" => Ok(PaymentStatus::Confirmed),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Confirmed)
    }
}

/// Lifecycle position derived from the stored flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingState {
    PendingPayment,
    Confirmed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub seat_id: Option<Uuid>,
    pub zone_id: Option<Uuid>,
    pub quantity: i64,
    pub total_price_cents: i64,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub is_confirmed: bool,
    pub is_cancelled: bool,
    pub cancellation_date: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub ticket_code: Option<String>,
    pub booking_date: DateTime<Utc>,
    /// When the current payment window opened. Reset by each new attempt.
    pub pending_since: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A booking that has just claimed `slot` and awaits payment.
    pub fn new_pending(user_id: Uuid, event_id: Uuid, slot: &Slot) -> Self {
        let now = Utc::now();
        let (seat_id, zone_id) = match slot {
            Slot::Seat(seat) => (Some(seat.id), None),
            Slot::ZoneUnits { zone, .. } => (None, Some(zone.id)),
        };

        Self {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            seat_id,
            zone_id,
            quantity: slot.quantity(),
            total_price_cents: slot.total_price_cents(),
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            transaction_id: None,
            payment_date: None,
            is_confirmed: false,
            is_cancelled: false,
            cancellation_date: None,
            cancellation_reason: None,
            ticket_code: None,
            booking_date: now,
            pending_since: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> BookingState {
        if self.is_cancelled {
            BookingState::Cancelled
        } else if self.is_confirmed {
            BookingState::Confirmed
        } else if self.payment_status == PaymentStatus::Failed {
            BookingState::Failed
        } else {
            BookingState::PendingPayment
        }
    }

    /// Whether this booking currently holds its seat or zone units.
    /// Pending and confirmed bookings hold; cancelled and failed ones don't.
    pub fn holds_inventory(&self) -> bool {
        !self.is_cancelled && self.payment_status != PaymentStatus::Failed
    }

    pub fn slot_key(&self) -> Result<SlotKey> {
        match (self.seat_id, self.zone_id) {
            (Some(seat_id), None) => Ok(SlotKey::Seat(seat_id)),
            (None, Some(zone_id)) => Ok(SlotKey::Zone(zone_id)),
            _ => Err(AppError::Internal(format!(
                "Booking {} must reference exactly one of seat or zone",
                self.id
            ))),
        }
    }

    pub fn refund_due(&self) -> bool {
        self.is_cancelled && self.payment_status.is_paid()
    }
}
