use rand::{distributions::Uniform, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Booking, Event, Holder, Seat, Zone};

pub const TICKET_CODE_LENGTH: usize = 10;
const TICKET_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random uppercase alphanumeric code. Uniqueness is checked by the caller
/// against issued codes and backed by a unique index.
pub fn generate_ticket_code() -> String {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..TICKET_CODE_ALPHABET.len());
    (0..TICKET_CODE_LENGTH)
        .map(|_| TICKET_CODE_ALPHABET[rng.sample(dist)] as char)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TicketSlot {
    Seat { seat: String },
    Zone { zone: String, quantity: i64 },
}

impl TicketSlot {
    pub fn for_seat(seat: &Seat) -> Self {
        TicketSlot::Seat { seat: seat.label() }
    }

    pub fn for_zone(zone: &Zone, quantity: i64) -> Self {
        TicketSlot::Zone { zone: zone.name.clone(), quantity }
    }
}

/// Fields consumed by the external PDF/QR renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketData {
    pub booking_id: Uuid,
    pub ticket_code: String,
    pub event: String,
    pub date: String,
    pub time: String,
    pub venue: String,
    pub holder_name: String,
    pub slot: TicketSlot,
    /// Encoded QR payload, see [`QrPayload`].
    pub qr_payload: String,
}

/// The QR body. Field order and formats are part of the contract with the
/// entry scanners.
#[derive(Debug, Serialize)]
pub struct QrPayload<'a> {
    pub ticket_code: &'a str,
    pub event: &'a str,
    pub date: &'a str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

impl TicketData {
    pub fn new(
        booking: &Booking,
        ticket_code: String,
        event: &Event,
        holder: &Holder,
        slot: TicketSlot,
    ) -> serde_json::Result<Self> {
        let date = event.formatted_date();
        let holder_name = holder.full_name();

        let (seat, zone, quantity) = match &slot {
            TicketSlot::Seat { seat } => (Some(seat.as_str()), None, None),
            TicketSlot::Zone { zone, quantity } => (None, Some(zone.as_str()), Some(*quantity)),
        };
        let qr_payload = serde_json::to_string(&QrPayload {
            ticket_code: &ticket_code,
            event: &event.title,
            date: &date,
            name: &holder_name,
            seat,
            zone,
            quantity,
        })?;

        Ok(Self {
            booking_id: booking.id,
            ticket_code,
            event: event.title.clone(),
            date,
            time: event.formatted_time(),
            venue: event.venue_name.clone(),
            holder_name,
            slot,
            qr_payload,
        })
    }
}
