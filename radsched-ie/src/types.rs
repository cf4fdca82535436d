use radsched_core::conversation::{Location, PatientIdentifiers, Slot};
use serde::{Deserialize, Serialize};

/// `GET locations(modality)` response row. Used only when
/// the upstream order webhook did not already supply `availableLocations`.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationsResponse {
    pub locations: Vec<Location>,
}

/// `POST slot-request` body. Fire-and-forget: the IE
/// answers later via the `schedule-response` webhook, correlated by
/// `conversation_id`.
#[derive(Debug, Clone, Serialize)]
pub struct SlotRequest {
    pub conversation_id: String,
    pub selected_location: Location,
    pub order_ids: Vec<String>,
    pub duration_minutes: i32,
    pub patient: PatientIdentifiers,
}

/// `POST book-appointment` body. Also fire-and-forget;
/// confirmation arrives via the `appointment-notification` webhook.
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    pub conversation_id: String,
    pub order_ids: Vec<String>,
    pub selected_slot: Slot,
    pub patient: PatientIdentifiers,
}

/// Generic envelope the IE returns for a fire-and-forget accept, just
/// enough to distinguish "accepted, wait for the callback" from a
/// synchronous rejection (malformed request, unknown location, etc).
#[derive(Debug, Clone, Deserialize)]
pub struct IeAck {
    #[serde(default = "default_accepted")]
    pub accepted: bool,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_accepted() -> bool {
    true
}
