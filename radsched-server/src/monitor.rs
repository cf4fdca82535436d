use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use radsched_core::Conversation;
use radsched_engine::{apply_patch, decide, Event};
use radsched_store::sweep::{try_advisory_lock, STUCK_MONITOR_LOCK_KEY};
use tracing::{error, info, warn};

use crate::effects::{execute_effects, EffectContext};
use crate::state::AppState;

/// Runs the stuck-session monitor loop for the process lifetime, per
/// : periodically scan for conversations whose outstanding
/// slot- or booking-request has outlived its SLA, and push them through
/// `decide()` as a timeout event so they either retry or fail out.
///
/// Guarded by a single Postgres advisory lock so that when
/// `radsched-server` is horizontally scaled, only one replica's monitor
/// runs a given tick — the same single-runner shape the expiry and
/// retention sweeps use, just with one shared lock key for the whole
/// monitor rather than a lock per conversation, since the conversations a
/// tick finds are independent CAS writes anyway.
pub async fn run(state: Arc<AppState>, interval_seconds: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));

    loop {
        ticker.tick().await;

        let conn = match try_advisory_lock(&state.db_pool, STUCK_MONITOR_LOCK_KEY).await {
            Ok(Some(conn)) => conn,
            Ok(None) => continue, // another replica holds the lock this tick
            Err(e) => {
                error!(error = %e, "stuck-session monitor failed to acquire advisory lock");
                continue;
            }
        };

        if let Err(e) = sweep_once(&state).await {
            error!(error = %e, "stuck-session monitor sweep failed");
        }

        drop(conn);
    }
}

async fn sweep_once(state: &AppState) -> Result<(), radsched_store::StoreError> {
    let now = Utc::now();

    let slot_cutoff = now - chrono::Duration::seconds(state.session.slot_response_sla_seconds);
    let stuck_slots = state.conversations.find_stuck_slot_requests(slot_cutoff).await?;
    for conversation in stuck_slots {
        let retries_exhausted = conversation.slot_retry_count >= state.session.slot_max_retries;
        handle_timeout(state, conversation, Event::SlotRequestTimeout { retries_exhausted }, now).await;
    }

    let booking_cutoff = now - chrono::Duration::seconds(state.session.booking_sla_seconds);
    let stuck_bookings = state.conversations.find_stuck_booking_requests(booking_cutoff).await?;
    for conversation in stuck_bookings {
        let retries_exhausted = conversation.booking_retry_count >= state.session.slot_max_retries;
        handle_timeout(state, conversation, Event::BookingTimeout { retries_exhausted }, now).await;
    }

    state.metrics.record_sweep_run("stuck_monitor");
    Ok(())
}

async fn handle_timeout(state: &AppState, conversation: Conversation, event: Event, now: chrono::DateTime<Utc>) {
    let prior_state = conversation.state;
    let decision = decide(event, &conversation, &state.session, state.safety.as_ref(), now);

    if decision.patch.is_noop() {
        return;
    }

    let mut updated = conversation.clone();
    apply_patch(&mut updated, &decision.patch);
    updated.updated_at = now;

    if let Err(e) = state.conversations.cas_update(&updated, prior_state, now).await {
        warn!(conversation_id = %updated.id, error = %e, "monitor lost CAS race on timeout transition");
        return;
    }

    let phone_plaintext = match radsched_crypto::decrypt_phone(&state.phone_enc_key, &updated.phone_encrypted.0) {
        Ok(p) => p,
        Err(e) => {
            error!(conversation_id = %updated.id, error = %e, "monitor failed to decrypt phone for timeout notification");
            return;
        }
    };

    let ctx = EffectContext {
        dispatcher: &state.dispatcher,
        ie: &state.ie,
        consent: &state.consent,
        conversation: &updated,
        phone_plaintext: &phone_plaintext,
    };
    execute_effects(&decision.effects, &ctx).await;

    info!(conversation_id = %updated.id, new_state = ?updated.state, "stuck-session monitor advanced conversation");
}
