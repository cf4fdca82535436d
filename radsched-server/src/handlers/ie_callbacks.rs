use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use chrono::Utc;
use radsched_core::audit::{AuditEntry, Direction, MessageType};
use radsched_core::conversation::{Appointment, Slot};
use radsched_core::error::CoreError;
use radsched_core::ids::ConversationId;
use radsched_core::Conversation;
use radsched_engine::{apply_patch, decide, Event};
use serde::Deserialize;

use crate::effects::{execute_effects, EffectContext};
use crate::error::EdgeError;
use crate::state::AppState;

/// `POST /webhooks/hl7/schedule-response` body.
#[derive(Debug, Deserialize)]
pub struct ScheduleResponseBody {
    pub message_control_id: String,
    pub success: bool,
    #[serde(default)]
    pub patient: Option<PatientRef>,
    #[serde(default)]
    pub available_slots: Vec<SlotDto>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlotDto {
    pub slot_id: String,
    pub start_at: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub resource_id: Option<String>,
}

impl From<SlotDto> for Slot {
    fn from(dto: SlotDto) -> Self {
        Slot {
            slot_id: dto.slot_id,
            start_at: dto.start_at,
            duration_minutes: dto.duration_minutes,
            resource_id: dto.resource_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PatientRef {
    pub mrn: String,
}

/// `POST /webhooks/hl7/appointment-notification` body.
#[derive(Debug, Deserialize)]
pub struct AppointmentNotificationBody {
    pub message_control_id: String,
    pub action: String,
    #[serde(default)]
    pub appointment: Option<AppointmentDto>,
    #[serde(default)]
    pub patient: Option<PatientRef>,
    #[serde(default)]
    pub order_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentDto {
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

impl From<AppointmentDto> for Appointment {
    fn from(dto: AppointmentDto) -> Self {
        Appointment {
            appointment_id: dto.appointment_id,
            filler_appointment_id: dto.filler_appointment_id,
            status: dto.status,
            date_time: dto.date_time,
            location_name: dto.location_name,
            service_description: dto.service_description,
        }
    }
}

/// Handles `POST /webhooks/hl7/schedule-response`. Conversation
/// lookup is by `messageControlId` (the conversation id we sent on
/// slot-request) falling back to the patient MRN embedded in the callback,
/// to tolerate an IE that echoes the correlation id back malformed.
pub async fn schedule_response(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<&'static str, EdgeError> {
    require_bearer(&state, &headers)?;

    let parsed: ScheduleResponseBody = serde_json::from_slice(&body)
        .map_err(|e| EdgeError(CoreError::Validation(format!("malformed schedule-response body: {e}"))))?;

    let now = Utc::now();
    let Some(conversation) = resolve_conversation(&state, &parsed.message_control_id, parsed.patient.as_ref()).await? else {
        return Ok("");
    };

    let event = if parsed.success {
        Event::SlotsReturned {
            slots: parsed.available_slots.into_iter().map(Slot::from).collect(),
        }
    } else if parsed.available_slots.is_empty() && parsed.error_message.is_none() {
        Event::SlotsEmpty
    } else {
        Event::SlotRequestFailed { retries_exhausted: false }
    };

    apply_event(&state, conversation, event, now, MessageType::SlotsOffered).await
}

/// Handles `POST /webhooks/hl7/appointment-notification`. Of the four
/// possible actions, only `new_appointment` drives a state transition in this
/// version; `rescheduled`/`cancelled`/`modified` are audited but otherwise
/// a no-op, since the engine has no post-confirmation state to revise them
/// into.
pub async fn appointment_notification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<&'static str, EdgeError> {
    require_bearer(&state, &headers)?;

    let parsed: AppointmentNotificationBody = serde_json::from_slice(&body)
        .map_err(|e| EdgeError(CoreError::Validation(format!("malformed appointment-notification body: {e}"))))?;

    let now = Utc::now();
    let Some(conversation) = resolve_conversation(&state, &parsed.message_control_id, parsed.patient.as_ref()).await? else {
        return Ok("");
    };

    if parsed.action != "new_appointment" {
        state
            .audit
            .insert(&AuditEntry::new(
                Some(conversation.id),
                conversation.organization_id.clone(),
                conversation.phone_hash.clone(),
                MessageType::EngineError,
                Direction::System,
                true,
                true,
                Some(format!("unhandled appointment action: {}", parsed.action)),
                now,
            ))
            .await?;
        return Ok("");
    }

    let Some(appointment_dto) = parsed.appointment else {
        return Err(EdgeError(CoreError::Validation("appointment is required for new_appointment".to_string())));
    };

    let event = Event::BookingConfirmed {
        appointment: appointment_dto.into(),
        order_ids: parsed.order_ids,
    };

    apply_event(&state, conversation, event, now, MessageType::BookingConfirmed).await
}

async fn resolve_conversation(
    state: &AppState,
    message_control_id: &str,
    patient: Option<&PatientRef>,
) -> Result<Option<Conversation>, EdgeError> {
    if let Ok(id) = message_control_id.parse::<uuid::Uuid>() {
        match state.conversations.get(ConversationId(id)).await {
            Ok(conversation) => return Ok(Some(conversation)),
            Err(radsched_store::StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(patient) = patient {
        return Ok(state.conversations.find_active_by_mrn(&patient.mrn).await?);
    }

    Ok(None)
}

async fn apply_event(
    state: &AppState,
    conversation: Conversation,
    event: Event,
    now: chrono::DateTime<Utc>,
    audit_message_type: MessageType,
) -> Result<&'static str, EdgeError> {
    let prior_state = conversation.state;
    let decision = decide(event, &conversation, &state.session, state.safety.as_ref(), now);

    let mut updated = conversation.clone();
    apply_patch(&mut updated, &decision.patch);
    updated.updated_at = now;

    if decision.patch.is_noop() {
        // Idempotent replay — nothing to persist or audit.
        return Ok("");
    }

    state.conversations.cas_update(&updated, prior_state, now).await?;

    let phone_plaintext = radsched_crypto::decrypt_phone(&state.phone_enc_key, &updated.phone_encrypted.0)
        .map_err(|_| EdgeError(CoreError::Internal))?;

    let ctx = EffectContext {
        dispatcher: &state.dispatcher,
        ie: &state.ie,
        consent: &state.consent,
        conversation: &updated,
        phone_plaintext: &phone_plaintext,
    };
    execute_effects(&decision.effects, &ctx).await;

    state
        .audit
        .insert(&AuditEntry::new(
            Some(updated.id),
            updated.organization_id.clone(),
            updated.phone_hash.clone(),
            audit_message_type,
            Direction::System,
            true,
            true,
            None,
            now,
        ))
        .await?;

    Ok("")
}

fn require_bearer(state: &AppState, headers: &HeaderMap) -> Result<(), EdgeError> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if crate::auth::verify_bearer(bearer, &state.ie_bearer_token) {
        Ok(())
    } else {
        Err(EdgeError(CoreError::Auth))
    }
}
