use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog data owned by the events collaborator. The booking core only
/// reads it to decide the slot kind and the booking/cancellation windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub venue_name: String,
    pub is_indoor: bool,
    pub is_published: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Theater layout: individually numbered seats.
    Indoor,
    /// Capacity pools split into zones.
    Outdoor,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        if self.is_indoor {
            EventKind::Indoor
        } else {
            EventKind::Outdoor
        }
    }

    /// Cancellation closes on the start date itself.
    pub fn has_started(&self, today: NaiveDate) -> bool {
        self.start_date <= today
    }

    pub fn has_ended(&self, today: NaiveDate) -> bool {
        self.end_date < today
    }

    pub fn formatted_date(&self) -> String {
        self.start_date.format("%d %b %Y").to_string()
    }

    pub fn formatted_time(&self) -> String {
        self.start_time.format("%I:%M %p").to_string()
    }
}
