use async_trait::async_trait;
use chrono::{DateTime, Utc};
use radsched_core::audit::{AuditEntry, AuditSink, Direction, MessageType};
use radsched_core::error::CoreError;
use radsched_core::ids::{ConversationId, PhoneHash};
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::error::StoreError;

/// Postgres-backed [`AuditSink`]. Writes are fire-and-forget from the
/// caller's perspective in the sense that a failed audit write never blocks
/// the patient-facing flow (requires the attempt, not that a
/// storage blip can stall scheduling) — callers log-and-continue on error
/// rather than propagating it into the conversation state machine.
#[derive(Clone)]
pub struct AuditRepo {
    pool: PgPool,
}

impl AuditRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (
                id, conversation_id, organization_id, phone_hash, message_type,
                direction, consent_status, "timestamp", from_number, success, error_code
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.conversation_id.map(|c| c.0))
        .bind(&entry.organization_id)
        .bind(&entry.phone_hash.0)
        .bind(message_type_str(entry.message_type))
        .bind(direction_str(entry.direction))
        .bind(entry.consent_status)
        .bind(entry.timestamp)
        .bind(&entry.from_number)
        .bind(entry.success)
        .bind(&entry.error_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete audit entries older than the configured retention window.
    /// Returns the number of rows deleted, for the retention sweep's log
    /// line.
    pub async fn sweep_retention(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM audit_entries WHERE \"timestamp\" < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Outbound/inbound SMS volume over a date range, for the admin stats
    /// dashboard. System-direction entries (sweep-driven
    /// cancellations, etc.) are excluded — this counts wire traffic, not
    /// internal transitions.
    pub async fn sms_volume_by_direction(
        &self,
        organization_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(Direction, i64)>, StoreError> {
        let mut qb = sqlx::QueryBuilder::new(
            r#"
            SELECT direction, count(*) AS n
            FROM audit_entries
            WHERE direction IN ('INBOUND', 'OUTBOUND')
              AND "timestamp" >= "#,
        );
        qb.push_bind(from).push(r#" AND "timestamp" <= "#).push_bind(to);
        if let Some(org) = organization_id {
            qb.push(" AND organization_id = ").push_bind(org);
        }
        qb.push(" GROUP BY direction");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| {
                let direction_str: String = r.try_get("direction")?;
                let n: i64 = r.try_get("n")?;
                Ok((
                    match direction_str.as_str() {
                        "INBOUND" => Direction::Inbound,
                        _ => Direction::Outbound,
                    },
                    n,
                ))
            })
            .collect()
    }

    /// All audit entries for one conversation, oldest first — backs the
    /// admin conversation-detail view's audit trail.
    pub async fn find_by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT * FROM audit_entries WHERE conversation_id = $1 ORDER BY \"timestamp\" ASC",
        )
        .bind(conversation_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl AuditSink for AuditRepo {
    async fn record(&self, entry: AuditEntry) -> Result<(), CoreError> {
        self.insert(&entry).await.map_err(Into::into)
    }
}

fn message_type_str(m: MessageType) -> &'static str {
    match m {
        MessageType::OrderReceived => "ORDER_RECEIVED",
        MessageType::ConsentPrompted => "CONSENT_PROMPTED",
        MessageType::ConsentGranted => "CONSENT_GRANTED",
        MessageType::ConsentDenied => "CONSENT_DENIED",
        MessageType::LocationPrompted => "LOCATION_PROMPTED",
        MessageType::LocationSelected => "LOCATION_SELECTED",
        MessageType::SlotRequestSent => "SLOT_REQUEST_SENT",
        MessageType::SlotsOffered => "SLOTS_OFFERED",
        MessageType::SlotSelected => "SLOT_SELECTED",
        MessageType::BookingRequestSent => "BOOKING_REQUEST_SENT",
        MessageType::BookingConfirmed => "BOOKING_CONFIRMED",
        MessageType::BookingFailed => "BOOKING_FAILED",
        MessageType::OptOut => "OPT_OUT",
        MessageType::UnrecognizedReply => "UNRECOGNIZED_REPLY",
        MessageType::Cancelled => "CANCELLED",
        MessageType::Expired => "EXPIRED",
        MessageType::EngineError => "ENGINE_ERROR",
        MessageType::AdminOverride => "ADMIN_OVERRIDE",
    }
}

fn direction_str(d: Direction) -> &'static str {
    match d {
        Direction::Inbound => "INBOUND",
        Direction::Outbound => "OUTBOUND",
        Direction::System => "SYSTEM",
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: uuid::Uuid,
    conversation_id: Option<uuid::Uuid>,
    organization_id: String,
    phone_hash: String,
    message_type: String,
    direction: String,
    consent_status: bool,
    timestamp: DateTime<Utc>,
    from_number: Option<String>,
    success: bool,
    error_code: Option<String>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(r: AuditRow) -> Result<Self, StoreError> {
        let message_type = match r.message_type.as_str() {
            "ORDER_RECEIVED" => MessageType::OrderReceived,
            "CONSENT_PROMPTED" => MessageType::ConsentPrompted,
            "CONSENT_GRANTED" => MessageType::ConsentGranted,
            "CONSENT_DENIED" => MessageType::ConsentDenied,
            "LOCATION_PROMPTED" => MessageType::LocationPrompted,
            "LOCATION_SELECTED" => MessageType::LocationSelected,
            "SLOT_REQUEST_SENT" => MessageType::SlotRequestSent,
            "SLOTS_OFFERED" => MessageType::SlotsOffered,
            "SLOT_SELECTED" => MessageType::SlotSelected,
            "BOOKING_REQUEST_SENT" => MessageType::BookingRequestSent,
            "BOOKING_CONFIRMED" => MessageType::BookingConfirmed,
            "BOOKING_FAILED" => MessageType::BookingFailed,
            "OPT_OUT" => MessageType::OptOut,
            "UNRECOGNIZED_REPLY" => MessageType::UnrecognizedReply,
            "CANCELLED" => MessageType::Cancelled,
            "EXPIRED" => MessageType::Expired,
            "ADMIN_OVERRIDE" => MessageType::AdminOverride,
            _ => MessageType::EngineError,
        };
        let direction = match r.direction.as_str() {
            "INBOUND" => Direction::Inbound,
            "OUTBOUND" => Direction::Outbound,
            _ => Direction::System,
        };
        Ok(AuditEntry {
            id: r.id,
            conversation_id: r.conversation_id.map(ConversationId),
            organization_id: r.organization_id,
            phone_hash: PhoneHash(r.phone_hash),
            message_type,
            direction,
            consent_status: r.consent_status,
            timestamp: r.timestamp,
            from_number: r.from_number,
            success: r.success,
            error_code: r.error_code,
        })
    }
}
