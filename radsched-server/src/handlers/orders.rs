use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use chrono::Utc;
use radsched_core::audit::{AuditEntry, Direction, MessageType};
use radsched_core::conversation::{Conversation, Location, Order, PatientIdentifiers, Procedure};
use radsched_core::ids::{PhoneEncrypted, PhoneHash};
use radsched_engine::{apply_patch, ingest_new_order, ingest_order_for_existing};
use serde::Deserialize;
use serde_json::Value;

use crate::effects::{execute_effects, EffectContext};
use crate::error::EdgeError;
use crate::state::AppState;

/// `POST /orders/webhook` body — camelCase because the ordering system
/// that calls this is internal and happy to match whatever shape we ask
/// for, unlike the external SMS/HL7 callers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWebhookBody {
    pub organization_id: String,
    pub order_id: String,
    pub patient_phone: String,
    pub modality: String,
    #[serde(default)]
    pub order_group_id: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub order_description: Option<String>,
    #[serde(default)]
    pub procedures: Vec<ProcedureDto>,
    #[serde(default)]
    pub estimated_duration_minutes: Option<i32>,
    #[serde(default)]
    pub ordering_practice: Option<String>,
    #[serde(default)]
    pub available_locations: Vec<LocationDto>,
    pub patient: PatientDto,
    #[serde(default)]
    pub patient_context: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureDto {
    pub code: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub capabilities: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDto {
    pub mrn: String,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<OrderWebhookBody> for Order {
    fn from(body: OrderWebhookBody) -> Self {
        Order {
            order_id: body.order_id,
            order_group_id: body.order_group_id,
            modality: body.modality,
            priority: body.priority,
            order_description: body.order_description,
            procedures: body
                .procedures
                .into_iter()
                .map(|p| Procedure {
                    code: p.code,
                    description: p.description,
                    estimated_duration_minutes: p.estimated_duration_minutes,
                })
                .collect(),
            estimated_duration_minutes: body.estimated_duration_minutes,
            ordering_practice: body.ordering_practice,
            available_locations: body
                .available_locations
                .into_iter()
                .map(|l| Location {
                    id: l.id,
                    name: l.name,
                    address: l.address,
                    capabilities: l.capabilities,
                })
                .collect(),
            patient: PatientIdentifiers {
                mrn: body.patient.mrn,
                dob: body.patient.dob,
                gender: body.patient.gender,
                name: body.patient.name,
            },
            patient_context: body.patient_context,
        }
    }
}

/// Handles `POST /orders/webhook`. Per : find (or create) the
/// non-terminal conversation for this phone number within this
/// organization, attach the order, persist the resulting patch, then run
/// whatever effects that produced (a consent prompt or a location prompt).
pub async fn orders_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<&'static str, EdgeError> {
    let bearer = bearer_token(&headers);
    let signature = headers.get("x-webhook-signature").and_then(|v| v.to_str().ok());

    if !crate::auth::verify_order_webhook(bearer.as_deref(), signature, &body, &state.order_webhook_secret) {
        return Err(EdgeError(radsched_core::error::CoreError::Auth));
    }

    let parsed: OrderWebhookBody = serde_json::from_slice(&body)
        .map_err(|e| EdgeError(radsched_core::error::CoreError::Validation(format!("malformed order webhook body: {e}"))))?;

    if parsed.order_id.is_empty() || parsed.patient_phone.is_empty() || parsed.modality.is_empty() {
        return Err(EdgeError(radsched_core::error::CoreError::Validation(
            "orderId, patientPhone, and modality are required".to_string(),
        )));
    }

    let organization_id = parsed.organization_id.clone();
    let patient_phone = parsed.patient_phone.clone();
    let phone_hash = PhoneHash(radsched_crypto::phone_hash(&state.phone_hash_key, &patient_phone));
    let now = Utc::now();
    let order: Order = parsed.into();

    let existing = state.conversations.get_active_by_phone(&organization_id, &phone_hash).await?;

    let conversation = match existing {
        None => {
            let consent = state.consent.get(&organization_id, &phone_hash).await?;
            let consent_active = consent.map(|c| c.is_active()).unwrap_or(false);
            let outcome = ingest_new_order(order, consent_active);

            let phone_encrypted = PhoneEncrypted(
                radsched_crypto::encrypt_phone(&state.phone_enc_key, &patient_phone)
                    .map_err(|_| EdgeError(radsched_core::error::CoreError::Internal))?,
            );

            let conversation = Conversation::new(
                phone_hash.clone(),
                phone_encrypted,
                organization_id.clone(),
                outcome.state,
                outcome.order_data,
                now,
                state.session.ttl_hours,
            );

            state.conversations.create(&conversation).await?;
            run_effects(&state, &conversation, &patient_phone, &outcome.effects).await;
            conversation
        }
        Some(existing) => {
            let prior_state = existing.state;
            let outcome = ingest_order_for_existing(order, existing.state, &existing.order_data);

            let mut updated = existing;
            apply_patch(&mut updated, &outcome.patch);
            updated.updated_at = now;

            state.conversations.cas_update(&updated, prior_state, now).await?;
            run_effects(&state, &updated, &patient_phone, &outcome.effects).await;
            updated
        }
    };

    state
        .audit
        .insert(&AuditEntry::new(
            Some(conversation.id),
            organization_id,
            phone_hash,
            MessageType::OrderReceived,
            Direction::Inbound,
            true,
            true,
            None,
            now,
        ))
        .await?;

    Ok("")
}

async fn run_effects(state: &AppState, conversation: &Conversation, phone_plaintext: &str, effects: &[radsched_engine::Effect]) {
    let ctx = EffectContext {
        dispatcher: &state.dispatcher,
        ie: &state.ie,
        consent: &state.consent,
        conversation,
        phone_plaintext,
    };
    execute_effects(effects, &ctx).await;
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}
