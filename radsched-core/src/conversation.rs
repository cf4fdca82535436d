use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, PhoneEncrypted, PhoneHash};
use crate::state::State;

/// Patient identifiers forwarded with an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientIdentifiers {
    pub mrn: String,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A single procedure line item within an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Procedure {
    pub code: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_duration_minutes: Option<i32>,
}

/// A candidate imaging location, as supplied by the order webhook or
/// fetched from the IE's `GET locations` operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub capabilities: Option<serde_json::Value>,
}

/// One order, either the single active order being acted on, or queued in
/// `pending_orders`. Required-field validation happens at the inbound edge;
/// this type already assumes a valid shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: String,
    #[serde(default)]
    pub order_group_id: Option<String>,
    pub modality: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub order_description: Option<String>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub estimated_duration_minutes: Option<i32>,
    #[serde(default)]
    pub ordering_practice: Option<String>,
    #[serde(default)]
    pub available_locations: Vec<Location>,
    pub patient: PatientIdentifiers,
    /// Opaque, validated-shape-only passthrough. The core never interprets
    /// this; a future safety-check subsystem consumes it via its own typed
    /// interface. Must be a JSON object or absent — enforced
    /// at the inbound edge, not here.
    #[serde(default)]
    pub patient_context: Option<serde_json::Value>,
}

/// A slot offered by the RIS via the IE's schedule-response callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub slot_id: String,
    pub start_at: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub resource_id: Option<String>,
}

/// The confirmed appointment, populated once the IE's appointment-
/// notification callback reports `new_appointment`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub appointment_id: String,
    #[serde(default)]
    pub filler_appointment_id: Option<String>,
    pub status: String,
    pub date_time: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub service_description: Option<String>,
}

/// The aggregate document attached to a Conversation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OrderData {
    pub active_order: Option<Order>,
    #[serde(default)]
    pub pending_orders: Vec<Order>,
    pub selected_location: Option<Location>,
    #[serde(default)]
    pub available_slots: Vec<Slot>,
    pub selected_slot: Option<Slot>,
    pub appointment: Option<Appointment>,
}

impl OrderData {
    /// Order ids already known to this conversation (active + pending),
    /// used to dedup a re-delivered order by its orderId.
    pub fn known_order_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .pending_orders
            .iter()
            .map(|o| o.order_id.as_str())
            .collect();
        if let Some(active) = &self.active_order {
            ids.push(active.order_id.as_str());
        }
        ids
    }

    /// Whether the given orderId has already been recorded on this
    /// conversation, active or pending.
    pub fn has_order(&self, order_id: &str) -> bool {
        self.known_order_ids().iter().any(|id| *id == order_id)
    }
}

/// A single patient scheduling session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub phone_hash: PhoneHash,
    pub phone_encrypted: PhoneEncrypted,
    pub organization_id: String,
    pub state: State,
    pub order_data: OrderData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Set when a slot-request has been issued and not yet answered;
    /// cleared on a schedule-response callback. Drives the async-timeout
    /// retry tracking.
    pub slot_request_sent_at: Option<DateTime<Utc>>,
    pub slot_retry_count: i32,
    pub slot_request_failed_at: Option<DateTime<Utc>>,

    /// Set when a booking request has been issued and not yet confirmed.
    /// Represents the `BOOKING_IN_FLIGHT` sub-state as a flag rather than a
    /// new top-level state.
    pub booking_request_sent_at: Option<DateTime<Utc>>,
    pub booking_retry_count: i32,

    /// Persisted so the "after three unrecognized replies" rule survives
    /// across separate webhook deliveries. Reset to 0 on any state
    /// transition. See DESIGN.md Open Question 5.
    pub unrecognized_replies: i32,
}

impl Conversation {
    /// Construct a brand-new conversation for a freshly-ingested order.
    pub fn new(
        phone_hash: PhoneHash,
        phone_encrypted: PhoneEncrypted,
        organization_id: impl Into<String>,
        initial_state: State,
        order_data: OrderData,
        now: DateTime<Utc>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            id: ConversationId::new(),
            phone_hash,
            phone_encrypted,
            organization_id: organization_id.into(),
            state: initial_state,
            order_data,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(ttl_hours),
            completed_at: None,
            slot_request_sent_at: None,
            slot_retry_count: 0,
            slot_request_failed_at: None,
            booking_request_sent_at: None,
            booking_retry_count: 0,
            unrecognized_replies: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.state.is_terminal() && self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> PatientIdentifiers {
        PatientIdentifiers {
            mrn: "MRN1".into(),
            dob: None,
            gender: None,
            name: None,
        }
    }

    #[test]
    fn new_conversation_sets_absolute_expiry_from_creation() {
        let now = Utc::now();
        let c = Conversation::new(
            PhoneHash("h1".into()),
            PhoneEncrypted("enc".into()),
            "org1",
            State::ConsentPending,
            OrderData::default(),
            now,
            24,
        );
        assert_eq!(c.expires_at, now + Duration::hours(24));
        assert!(!c.is_expired(now));
        assert!(c.is_expired(now + Duration::hours(25)));
    }

    #[test]
    fn has_order_checks_both_active_and_pending() {
        let mut od = OrderData::default();
        od.active_order = Some(Order {
            order_id: "O1".into(),
            order_group_id: None,
            modality: "XR".into(),
            priority: None,
            order_description: None,
            procedures: vec![],
            estimated_duration_minutes: None,
            ordering_practice: None,
            available_locations: vec![],
            patient: patient(),
            patient_context: None,
        });
        assert!(od.has_order("O1"));
        assert!(!od.has_order("O2"));

        od.pending_orders.push(Order {
            order_id: "O2".into(),
            ..od.active_order.clone().unwrap()
        });
        assert!(od.has_order("O2"));
    }

    #[test]
    fn terminal_conversation_is_never_considered_expired() {
        let now = Utc::now();
        let mut c = Conversation::new(
            PhoneHash("h1".into()),
            PhoneEncrypted("enc".into()),
            "org1",
            State::ConsentPending,
            OrderData::default(),
            now,
            24,
        );
        c.state = State::Cancelled;
        c.expires_at = now - Duration::hours(1);
        assert!(!c.is_expired(now));
    }
}
