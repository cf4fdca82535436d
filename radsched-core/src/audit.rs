use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, PhoneHash};

/// Category of an audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    OrderReceived,
    ConsentPrompted,
    ConsentGranted,
    ConsentDenied,
    LocationPrompted,
    LocationSelected,
    SlotRequestSent,
    SlotsOffered,
    SlotSelected,
    BookingRequestSent,
    BookingConfirmed,
    BookingFailed,
    OptOut,
    UnrecognizedReply,
    Cancelled,
    Expired,
    EngineError,
    /// An operator-initiated transition or resend via the admin API,
    /// rather than a patient- or engine-driven one.
    AdminOverride,
}

/// Direction of an audited message relative to the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,
    Outbound,
    /// Internal state transitions with no corresponding wire message
    /// (e.g. an expiry sweep cancelling a conversation).
    System,
}

/// A single, append-only, PHI-free audit record.
///
/// Never carries a raw phone number, patient name, or message body — only
/// the `phone_hash` join key and structured metadata. Enforced by
/// construction: there is no field here a caller could populate with PHI
/// and no `PhoneEncrypted` member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub conversation_id: Option<ConversationId>,
    pub organization_id: String,
    pub phone_hash: PhoneHash,
    pub message_type: MessageType,
    pub direction: Direction,
    pub consent_status: bool,
    pub timestamp: DateTime<Utc>,
    /// The sender number an outbound send went out from, for provider-side
    /// reconciliation. `None` for inbound/system entries.
    pub from_number: Option<String>,
    pub success: bool,
    pub error_code: Option<String>,
}

impl AuditEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conversation_id: Option<ConversationId>,
        organization_id: impl Into<String>,
        phone_hash: PhoneHash,
        message_type: MessageType,
        direction: Direction,
        consent_status: bool,
        success: bool,
        error_code: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new_with_from_number(
            conversation_id,
            organization_id,
            phone_hash,
            message_type,
            direction,
            consent_status,
            None,
            success,
            error_code,
            now,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_with_from_number(
        conversation_id: Option<ConversationId>,
        organization_id: impl Into<String>,
        phone_hash: PhoneHash,
        message_type: MessageType,
        direction: Direction,
        consent_status: bool,
        from_number: Option<String>,
        success: bool,
        error_code: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            conversation_id,
            organization_id: organization_id.into(),
            phone_hash,
            message_type,
            direction,
            consent_status,
            timestamp: now,
            from_number,
            success,
            error_code,
        }
    }
}

/// Append-only sink for audit entries, implemented by `radsched-store`
/// against Postgres and by an in-memory recorder in tests. Kept as a trait
/// here (rather than a concrete store type) so `radsched-engine` can depend
/// on "something that records audit events" without depending on the
/// storage crate's connection machinery.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), crate::error::CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_carries_no_phi_bearing_fields() {
        let e = AuditEntry::new(
            Some(ConversationId::new()),
            "org1",
            PhoneHash("h1".into()),
            MessageType::ConsentGranted,
            Direction::Inbound,
            true,
            true,
            None,
            Utc::now(),
        );
        let json = serde_json::to_value(&e).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("phone_encrypted"));
        assert!(!obj.contains_key("body"));
        assert!(!obj.contains_key("name"));
    }
}
