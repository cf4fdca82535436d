use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{OriginalUri, Path, State};
use axum::http::HeaderMap;
use chrono::Utc;
use radsched_core::audit::{AuditEntry, Direction, MessageType};
use radsched_core::error::CoreError;
use radsched_core::ids::PhoneHash;
use radsched_engine::{apply_patch, decide, Effect, Event};

use crate::effects::{execute_effects, EffectContext};
use crate::error::EdgeError;
use crate::state::AppState;

/// Handles `POST /sms/webhook/{organization_id}/{provider}` — inbound SMS
/// reply from a carrier. The `provider` path segment
/// picks which signing secret and provider-defined canonical string to
/// verify against; everything else about the route is provider-agnostic.
///
/// This handler always responds success once the inbound audit row is
/// written (to avoid provider redelivery storms) — the only early exit is
/// an auth failure, which never reaches that audit write in the first
/// place because the sender can't be trusted yet.
pub async fn sms_webhook(
    State(state): State<Arc<AppState>>,
    Path((organization_id, provider)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<&'static str, EdgeError> {
    let secret = state
        .sms_provider_secrets
        .get(&provider)
        .ok_or(EdgeError(CoreError::Auth))?;

    let form: HashMap<String, String> = serde_urlencoded::from_bytes(&body)
        .map_err(|e| EdgeError(CoreError::Validation(format!("malformed SMS webhook body: {e}"))))?;

    let signature = headers
        .get("x-twilio-signature")
        .or_else(|| headers.get("x-provider-signature"))
        .and_then(|v| v.to_str().ok());

    let full_url = request_url(&headers, &uri);
    let params: Vec<(String, String)> = form.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    let signed_payload = crate::auth::twilio_signed_payload(&full_url, &params);

    let verified = signature
        .map(|sig| crate::auth::verify_sms_signature(&signed_payload, secret, sig))
        .unwrap_or(false);
    if !verified {
        return Err(EdgeError(CoreError::Auth));
    }

    let from_phone = form.get("From").cloned().unwrap_or_default();
    let text_body = form.get("Body").cloned().unwrap_or_default();

    if from_phone.is_empty() {
        return Err(EdgeError(CoreError::Validation("From is required".to_string())));
    }

    let now = Utc::now();
    let phone_hash = PhoneHash(radsched_crypto::phone_hash(&state.phone_hash_key, &from_phone));

    let existing = state.conversations.get_active_by_phone(&organization_id, &phone_hash).await?;

    let Some(conversation) = existing else {
        // : no session -> audit `no_session` and drop, no
        // outbound send of any kind.
        state
            .audit
            .insert(&AuditEntry::new(
                None,
                organization_id,
                phone_hash,
                MessageType::UnrecognizedReply,
                Direction::Inbound,
                false,
                true,
                Some("no_session".to_string()),
                now,
            ))
            .await?;
        return Ok("");
    };

    let prior_state = conversation.state;
    let decision = decide(
        Event::InboundSms { body: text_body },
        &conversation,
        &state.session,
        state.safety.as_ref(),
        now,
    );

    let mut updated = conversation.clone();
    apply_patch(&mut updated, &decision.patch);
    updated.updated_at = now;

    if !decision.patch.is_noop() {
        state.conversations.cas_update(&updated, prior_state, now).await?;
    }

    let phone_plaintext = radsched_crypto::decrypt_phone(&state.phone_enc_key, &updated.phone_encrypted.0)
        .map_err(|_| EdgeError(CoreError::Internal))?;

    run_effects(&state, &updated, &phone_plaintext, &decision.effects).await;

    state
        .audit
        .insert(&AuditEntry::new(
            Some(updated.id),
            updated.organization_id.clone(),
            updated.phone_hash.clone(),
            inbound_reply_message_type(&decision.effects),
            Direction::Inbound,
            true,
            true,
            None,
            now,
        ))
        .await?;

    Ok("")
}

/// Classifies what an inbound reply "was" for audit purposes, from the
/// side effects `decide` actually produced rather than re-running the
/// parser — the effects already tell us definitively whether this reply
/// granted consent, opted out, picked a location, or picked a slot.
fn inbound_reply_message_type(effects: &[Effect]) -> MessageType {
    for effect in effects {
        match effect {
            Effect::RecordConsentGrant => return MessageType::ConsentGranted,
            Effect::RecordConsentRevoke => return MessageType::OptOut,
            Effect::IssueSlotRequest { .. } => return MessageType::LocationSelected,
            Effect::IssueBookingRequest { .. } => return MessageType::SlotSelected,
            Effect::SendSms { message_type: MessageType::Cancelled, .. } => return MessageType::Cancelled,
            _ => {}
        }
    }
    MessageType::UnrecognizedReply
}

async fn run_effects(
    state: &AppState,
    conversation: &radsched_core::Conversation,
    phone_plaintext: &str,
    effects: &[Effect],
) {
    let ctx = EffectContext {
        dispatcher: &state.dispatcher,
        ie: &state.ie,
        consent: &state.consent,
        conversation,
        phone_plaintext,
    };
    execute_effects(effects, &ctx).await;
}

/// Reconstructs the full externally-visible URL a provider signed over,
/// from the `Host` header and the request's own path+query. Providers sign
/// the URL their webhook was actually configured against, which is always
/// `https://` in production regardless of what scheme terminated at this
/// process behind a reverse proxy (places TLS termination out
/// of scope as an external collaborator).
fn request_url(headers: &HeaderMap, uri: &axum::http::Uri) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("https://{host}{uri}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_consent_grant_effect() {
        let effects = vec![Effect::RecordConsentGrant];
        assert_eq!(inbound_reply_message_type(&effects), MessageType::ConsentGranted);
    }

    #[test]
    fn classifies_opt_out_effect() {
        let effects = vec![Effect::RecordConsentRevoke];
        assert_eq!(inbound_reply_message_type(&effects), MessageType::OptOut);
    }

    #[test]
    fn falls_back_to_unrecognized_with_no_matching_effect() {
        let effects: Vec<Effect> = vec![];
        assert_eq!(inbound_reply_message_type(&effects), MessageType::UnrecognizedReply);
    }

    #[test]
    fn request_url_builds_https_regardless_of_inbound_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::HOST, "example.com".parse().unwrap());
        let uri: axum::http::Uri = "/sms/webhook/org1/twilio".parse().unwrap();
        assert_eq!(request_url(&headers, &uri), "https://example.com/sms/webhook/org1/twilio");
    }
}
