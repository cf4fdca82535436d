use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use radsched_core::audit::{AuditEntry, Direction, MessageType};
use radsched_core::ids::ConversationId;
use radsched_core::{Conversation, State as ConvState};
use radsched_store::{ConversationFilter, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::server::AppState;

/// De-identified projection of a [`Conversation`] for admin responses.
/// Deliberately omits `phone_encrypted` — the admin surface is built from
/// `phone_hash` alone.
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub organization_id: String,
    pub phone_hash: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub slot_request_sent_at: Option<DateTime<Utc>>,
    pub slot_retry_count: i32,
    pub booking_request_sent_at: Option<DateTime<Utc>>,
    pub booking_retry_count: i32,
    pub unrecognized_replies: i32,
}

impl From<&Conversation> for ConversationSummary {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id.0,
            organization_id: c.organization_id.clone(),
            phone_hash: c.phone_hash.0.clone(),
            state: c.state.as_str().to_string(),
            created_at: c.created_at,
            updated_at: c.updated_at,
            expires_at: c.expires_at,
            completed_at: c.completed_at,
            slot_request_sent_at: c.slot_request_sent_at,
            slot_retry_count: c.slot_retry_count,
            booking_request_sent_at: c.booking_request_sent_at,
            booking_retry_count: c.booking_retry_count,
            unrecognized_replies: c.unrecognized_replies,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditTrailEntry {
    pub message_type: String,
    pub direction: String,
    pub consent_status: bool,
    pub timestamp: DateTime<Utc>,
    pub from_number: Option<String>,
    pub success: bool,
    pub error_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub summary: ConversationSummary,
    pub order_data: Value,
    pub audit_trail: Vec<AuditTrailEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub organization_id: Option<String>,
    pub state: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stuck: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<ConversationSummary>>, (StatusCode, Json<Value>)> {
    let state_filter = q.state.as_deref().map(str::parse::<ConvState>).transpose().map_err(bad_request)?;

    let filter = ConversationFilter {
        organization_id: q.organization_id,
        state: state_filter,
        from: q.from,
        to: q.to,
        stuck: q.stuck,
    };
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let offset = q.offset.unwrap_or(0).max(0);

    let rows = state.conversations.list(&filter, limit, offset).await.map_err(internal_error)?;
    Ok(Json(rows.iter().map(ConversationSummary::from).collect()))
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationDetail>, (StatusCode, Json<Value>)> {
    let conversation_id = ConversationId(id);
    let conversation = state.conversations.get(conversation_id).await.map_err(not_found_or_internal)?;
    let order_data = serde_json::to_value(&conversation.order_data).map_err(internal_error)?;
    let audit_trail = state
        .audit
        .find_by_conversation(conversation_id)
        .await
        .map_err(internal_error)?
        .into_iter()
        .map(|e| AuditTrailEntry {
            message_type: message_type_str(e.message_type).to_string(),
            direction: direction_str(e.direction).to_string(),
            consent_status: e.consent_status,
            timestamp: e.timestamp,
            from_number: e.from_number,
            success: e.success,
            error_code: e.error_code,
        })
        .collect();

    Ok(Json(ConversationDetail {
        summary: ConversationSummary::from(&conversation),
        order_data,
        audit_trail,
    }))
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

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub to_state: String,
    pub reason: String,
}

/// Force a conversation to a new state outside the engine's normal
/// transition rules. Mandatory `reason` is persisted verbatim onto the
/// audit entry's `error_code` field (the taxonomy's free-text slot) as
/// operator-authored operational metadata, not patient data.
pub async fn transition_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<ConversationSummary>, (StatusCode, Json<Value>)> {
    if body.reason.trim().is_empty() {
        return Err(bad_request("reason is required".to_string()));
    }
    let to_state: ConvState = body.to_state.parse().map_err(bad_request)?;

    let conversation_id = ConversationId(id);
    let mut conversation = state.conversations.get(conversation_id).await.map_err(not_found_or_internal)?;

    let expected_state = conversation.state;
    let now = Utc::now();
    conversation.state = to_state;
    conversation.updated_at = now;
    if to_state.is_terminal() {
        conversation.completed_at = Some(now);
    }

    state.conversations.cas_update(&conversation, expected_state, now).await.map_err(internal_error)?;

    let entry = AuditEntry::new(
        Some(conversation_id),
        conversation.organization_id.clone(),
        conversation.phone_hash.clone(),
        MessageType::AdminOverride,
        Direction::System,
        true,
        true,
        Some(format!("{} -> {}: {}", expected_state.as_str(), to_state.as_str(), body.reason)),
        now,
    );
    if let Err(e) = state.audit.insert(&entry).await {
        tracing::error!(error = %e, conversation_id = %conversation_id, "failed to write admin override audit entry");
    }

    Ok(Json(ConversationSummary::from(&conversation)))
}

/// Re-send the message the conversation's current state would prompt the
/// patient with. Delegates to [`radsched_core::ResendSink`] rather than
/// sending directly — this crate has no route to the plaintext phone
/// number and must not gain one.
pub async fn resend_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state.resend_sink.resend(ConversationId(id)).await.map_err(core_error_response)?;
    Ok(StatusCode::ACCEPTED)
}

fn bad_request(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })))
}

fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    tracing::error!(error = %e, "admin handler failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "internal error" })))
}

fn not_found_or_internal(e: StoreError) -> (StatusCode, Json<Value>) {
    match e {
        StoreError::NotFound => (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))),
        other => internal_error(other),
    }
}

fn core_error_response(e: radsched_core::CoreError) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": e.to_string() })))
}
