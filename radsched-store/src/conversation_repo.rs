use chrono::{DateTime, Utc};
use radsched_core::conversation::{Conversation, OrderData};
use radsched_core::ids::{ConversationId, PhoneEncrypted, PhoneHash};
use radsched_core::state::State;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::error::StoreError;

/// Postgres-backed repository for [`Conversation`].
///
/// Transitions use compare-and-swap: every `UPDATE` carries a `WHERE state
/// = $expected` clause, and a zero affected-row count means the
/// conversation moved under us, surfaced as
/// [`StoreError::ConcurrentTransition`] rather than silently overwriting a
/// newer state. This is the same optimistic-concurrency shape as an
/// etcd `put`-with-revision compare-and-swap, expressed in SQL.
#[derive(Clone)]
pub struct ConversationRepo {
    pool: PgPool,
}

impl ConversationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a brand-new conversation. Fails with
    /// [`StoreError::ActiveConversationExists`] if the partial unique index
    /// already has a non-terminal row for this `(organization_id,
    /// phone_hash)` — callers should instead load and append to that
    /// conversation (order consolidation).
    pub async fn create(&self, c: &Conversation) -> Result<(), StoreError> {
        let order_data = serde_json::to_value(&c.order_data)?;
        let result = sqlx::query(
            r#"
            INSERT INTO conversations (
                id, phone_hash, phone_encrypted, organization_id, state, order_data,
                created_at, updated_at, expires_at, completed_at,
                slot_request_sent_at, slot_retry_count, slot_request_failed_at,
                booking_request_sent_at, booking_retry_count, unrecognized_replies
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            "#,
        )
        .bind(c.id.0)
        .bind(&c.phone_hash.0)
        .bind(&c.phone_encrypted.0)
        .bind(&c.organization_id)
        .bind(c.state.as_str())
        .bind(order_data)
        .bind(c.created_at)
        .bind(c.updated_at)
        .bind(c.expires_at)
        .bind(c.completed_at)
        .bind(c.slot_request_sent_at)
        .bind(c.slot_retry_count)
        .bind(c.slot_request_failed_at)
        .bind(c.booking_request_sent_at)
        .bind(c.booking_retry_count)
        .bind(c.unrecognized_replies)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::ActiveConversationExists)
            }
            Err(e) => Err(StoreError::Transient(e)),
        }
    }

    pub async fn get(&self, id: ConversationId) -> Result<Conversation, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM conversations WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        row_to_conversation(&row)
    }

    /// Find the single non-terminal conversation for a phone number, if
    /// any — the lookup the SMS and IE-callback webhooks use to resolve
    /// "which conversation is this reply for".
    pub async fn get_active_by_phone(
        &self,
        organization_id: &str,
        phone_hash: &PhoneHash,
    ) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM conversations
            WHERE organization_id = $1 AND phone_hash = $2
              AND state NOT IN ('CONFIRMED', 'CANCELLED', 'EXPIRED')
            "#,
        )
        .bind(organization_id)
        .bind(&phone_hash.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_conversation(&r)).transpose()
    }

    /// Find a non-terminal conversation by the MRN on its active order.
    /// Backs the IE callback receivers' fallback lookup:
    /// when a `schedule-response`/`appointment-notification` payload's
    /// correlation id doesn't resolve to a conversation (e.g. the IE
    /// echoed it back malformed), the patient MRN embedded in the
    /// callback's own patient block still identifies the session. Not
    /// scoped to an organization — the IE callback carries no
    /// organization context, and an MRN is assumed globally correlatable
    /// to the one conversation it was issued against.
    pub async fn find_active_by_mrn(&self, mrn: &str) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM conversations
            WHERE order_data->'active_order'->'patient'->>'mrn' = $1
              AND state NOT IN ('CONFIRMED', 'CANCELLED', 'EXPIRED')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(mrn)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_conversation(&r)).transpose()
    }

    /// Compare-and-swap the state and persist the full updated document.
    /// `expected_state` must match the row's current state or no rows are
    /// affected and [`StoreError::ConcurrentTransition`] is returned.
    pub async fn cas_update(
        &self,
        c: &Conversation,
        expected_state: State,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let order_data = serde_json::to_value(&c.order_data)?;
        let result = sqlx::query(
            r#"
            UPDATE conversations SET
                state = $1, order_data = $2, updated_at = $3, completed_at = $4,
                slot_request_sent_at = $5, slot_retry_count = $6, slot_request_failed_at = $7,
                booking_request_sent_at = $8, booking_retry_count = $9, unrecognized_replies = $10
            WHERE id = $11 AND state = $12
            "#,
        )
        .bind(c.state.as_str())
        .bind(order_data)
        .bind(now)
        .bind(c.completed_at)
        .bind(c.slot_request_sent_at)
        .bind(c.slot_retry_count)
        .bind(c.slot_request_failed_at)
        .bind(c.booking_request_sent_at)
        .bind(c.booking_retry_count)
        .bind(c.unrecognized_replies)
        .bind(c.id.0)
        .bind(expected_state.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConcurrentTransition);
        }
        Ok(())
    }

    /// Mark every expired, non-terminal conversation `EXPIRED` in one pass.
    /// Returns the number of conversations transitioned, for the sweep's
    /// audit log line. This is a hard deadline, not a
    /// CAS race with any single conversation's own transitions, so a plain
    /// bulk `UPDATE` is correct here.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<ConversationId>, StoreError> {
        let rows = sqlx::query(
            r#"
            UPDATE conversations
            SET state = 'EXPIRED', completed_at = $1, updated_at = $1
            WHERE expires_at <= $1
              AND state NOT IN ('CONFIRMED', 'CANCELLED', 'EXPIRED')
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ConversationId(r.get::<uuid::Uuid, _>("id")))
            .collect())
    }

    /// Conversations with a slot request outstanding past the SLA —
    /// candidates for the stuck-session monitor's retry-or-fail decision.
    pub async fn find_stuck_slot_requests(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM conversations
            WHERE slot_request_sent_at IS NOT NULL
              AND slot_request_sent_at <= $1
              AND state NOT IN ('CONFIRMED', 'CANCELLED', 'EXPIRED')
            "#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_conversation).collect()
    }

    /// Conversations with a booking request outstanding past the SLA.
    pub async fn find_stuck_booking_requests(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM conversations
            WHERE booking_request_sent_at IS NOT NULL
              AND booking_request_sent_at <= $1
              AND state NOT IN ('CONFIRMED', 'CANCELLED', 'EXPIRED')
            "#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_conversation).collect()
    }

    /// Filtered listing backing the admin console's conversation table.
    /// `filter.stuck` means "has an outstanding slot or
    /// booking request right now", independent of the SLA the stuck-session
    /// monitor applies — an operator paging through the admin UI wants to
    /// see in-flight requests, not just ones that have already breached SLA.
    pub async fn list(
        &self,
        filter: &ConversationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Conversation>, StoreError> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM conversations WHERE 1 = 1");

        if let Some(org) = &filter.organization_id {
            qb.push(" AND organization_id = ").push_bind(org.clone());
        }
        if let Some(state) = filter.state {
            qb.push(" AND state = ").push_bind(state.as_str());
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        if filter.stuck {
            qb.push(" AND (slot_request_sent_at IS NOT NULL OR booking_request_sent_at IS NOT NULL)");
        }

        qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_conversation).collect()
    }

    /// Conversation counts grouped by state over a date range, for the
    /// admin stats dashboard.
    pub async fn counts_by_state(
        &self,
        organization_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(State, i64)>, StoreError> {
        let mut qb = sqlx::QueryBuilder::new(
            "SELECT state, count(*) AS n FROM conversations WHERE created_at >= ",
        );
        qb.push_bind(from).push(" AND created_at <= ").push_bind(to);
        if let Some(org) = organization_id {
            qb.push(" AND organization_id = ").push_bind(org);
        }
        qb.push(" GROUP BY state");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| {
                let state_str: String = r.try_get("state")?;
                let state: State = state_str.parse().map_err(|_| {
                    StoreError::Corrupt(serde_json::Error::io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "unknown conversation state in database row",
                    )))
                })?;
                let n: i64 = r.try_get("n")?;
                Ok((state, n))
            })
            .collect()
    }

    /// Average seconds spent per final state, approximated from terminal
    /// conversations as `completed_at - created_at` bucketed by the state
    /// they ended in.
    ///
    /// This is an approximation, not a true average time-in-state: the
    /// schema keeps `created_at`/`completed_at` but no per-transition
    /// history log, so a conversation that visited `CHOOSING_LOCATION` then
    /// `CHOOSING_TIME` before landing in `CONFIRMED` has its whole lifetime
    /// attributed to `CONFIRMED`, not split across the states it passed
    /// through. Good enough to answer "how long does a confirmed booking
    /// typically take end to end" without a schema migration; not a
    /// per-state funnel.
    pub async fn avg_time_in_state(
        &self,
        organization_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(State, f64)>, StoreError> {
        let mut qb = sqlx::QueryBuilder::new(
            r#"
            SELECT state, avg(extract(epoch FROM completed_at - created_at)) AS avg_secs
            FROM conversations
            WHERE completed_at IS NOT NULL
              AND created_at >= "#,
        );
        qb.push_bind(from).push(" AND created_at <= ").push_bind(to);
        if let Some(org) = organization_id {
            qb.push(" AND organization_id = ").push_bind(org);
        }
        qb.push(" GROUP BY state");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| {
                let state_str: String = r.try_get("state")?;
                let state: State = state_str.parse().map_err(|_| {
                    StoreError::Corrupt(serde_json::Error::io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "unknown conversation state in database row",
                    )))
                })?;
                let avg_secs: f64 = r.try_get::<Option<f64>, _>("avg_secs")?.unwrap_or(0.0);
                Ok((state, avg_secs))
            })
            .collect()
    }
}

/// Filter set for [`ConversationRepo::list`]. All fields are optional
/// except `stuck`, which defaults to `false` (no filtering on in-flight
/// requests).
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub organization_id: Option<String>,
    pub state: Option<State>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub stuck: bool,
}

fn row_to_conversation(row: &sqlx::postgres::PgRow) -> Result<Conversation, StoreError> {
    let order_data: serde_json::Value = row.try_get("order_data")?;
    let order_data: OrderData = serde_json::from_value(order_data)?;
    let state: String = row.try_get("state")?;
    let state: State = state
        .parse()
        .map_err(|_| StoreError::Corrupt(serde_json::Error::io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "unknown conversation state in database row",
        ))))?;

    Ok(Conversation {
        id: ConversationId(row.try_get("id")?),
        phone_hash: PhoneHash(row.try_get("phone_hash")?),
        phone_encrypted: PhoneEncrypted(row.try_get("phone_encrypted")?),
        organization_id: row.try_get("organization_id")?,
        state,
        order_data,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        expires_at: row.try_get("expires_at")?,
        completed_at: row.try_get("completed_at")?,
        slot_request_sent_at: row.try_get("slot_request_sent_at")?,
        slot_retry_count: row.try_get("slot_retry_count")?,
        slot_request_failed_at: row.try_get("slot_request_failed_at")?,
        booking_request_sent_at: row.try_get("booking_request_sent_at")?,
        booking_retry_count: row.try_get("booking_retry_count")?,
        unrecognized_replies: row.try_get("unrecognized_replies")?,
    })
}
