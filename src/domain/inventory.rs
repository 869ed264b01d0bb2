use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A numbered seat of an indoor event. `is_available` is false exactly while
/// a holding booking (pending or confirmed, not cancelled, not failed)
/// references it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub event_id: Uuid,
    pub row: String,
    pub number: i32,
    pub category: String,
    pub price_cents: i64,
    pub is_available: bool,
}

impl Seat {
    pub fn label(&self) -> String {
        format!("{}{}", self.row, self.number)
    }
}

/// A capacity pool of an outdoor event. Remaining units are never stored;
/// they are derived from the bookings that hold units in the zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: String,
    pub capacity: i64,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneAvailability {
    #[serde(flatten)]
    pub zone: Zone,
    pub available_seats: i64,
}

impl ZoneAvailability {
    pub fn available_percentage(&self) -> i64 {
        if self.zone.capacity > 0 {
            self.available_seats * 100 / self.zone.capacity
        } else {
            0
        }
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotSelection {
    Seat { seat_id: Uuid },
    #[serde(rename = "zone")]
    ZoneUnits { zone_id: Uuid, quantity: i64 },
}

/// A selection resolved against the inventory of its event.
#[derive(Debug, Clone)]
pub enum Slot {
    Seat(Seat),
    ZoneUnits { zone: Zone, quantity: i64 },
}

impl Slot {
    pub fn key(&self) -> SlotKey {
        match self {
            Slot::Seat(seat) => SlotKey::Seat(seat.id),
            Slot::ZoneUnits { zone, .. } => SlotKey::Zone(zone.id),
        }
    }

    pub fn quantity(&self) -> i64 {
        match self {
            Slot::Seat(_) => 1,
            Slot::ZoneUnits { quantity, .. } => *quantity,
        }
    }

    /// Seat price, or zone unit price times quantity.
    pub fn total_price_cents(&self) -> i64 {
        match self {
            Slot::Seat(seat) => seat.price_cents,
            Slot::ZoneUnits { zone, quantity } => zone.price_cents * quantity,
        }
    }
}

/// Identity of a contended inventory row: one seat, or one zone aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Seat(Uuid),
    Zone(Uuid),
}
