use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ticket holder as known to the accounts collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holder {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Holder {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
