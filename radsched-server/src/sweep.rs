use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use radsched_store::sweep::try_advisory_lock;
use tracing::{error, info};

use crate::state::AppState;

/// Single-runner lock keys for the two periodic sweeps, distinct from
/// [`radsched_store::sweep::STUCK_MONITOR_LOCK_KEY`] so the three
/// background loops never contend with one another for the same lock.
const EXPIRY_SWEEP_LOCK_KEY: i64 = 0x5253_4558_5049_5259; // "RSEXPIRY"
const RETENTION_SWEEP_LOCK_KEY: i64 = 0x5253_5245_5445_4e54; // "RSRETENT" (truncated)

/// Runs the expiry sweep loop: periodically marks every non-terminal
/// conversation whose `expires_at` has passed as `EXPIRED`. A hard TTL
/// deadline, not CAS'd against any single conversation's own in-flight
/// transition — `sweep_expired` is a bulk `UPDATE`.
pub async fn run_expiry_sweep(state: Arc<AppState>, interval_seconds: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));

    loop {
        ticker.tick().await;

        let conn = match try_advisory_lock(&state.db_pool, EXPIRY_SWEEP_LOCK_KEY).await {
            Ok(Some(conn)) => conn,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "expiry sweep failed to acquire advisory lock");
                continue;
            }
        };

        let now = Utc::now();
        match state.conversations.sweep_expired(now).await {
            Ok(ids) => {
                if !ids.is_empty() {
                    info!(count = ids.len(), "expiry sweep transitioned conversations to EXPIRED");
                }
                state.metrics.record_sweep_run("expiry");
            }
            Err(e) => error!(error = %e, "expiry sweep query failed"),
        }

        drop(conn);
    }
}

/// Runs the audit retention sweep loop: deletes audit rows older than the
/// configured retention window (— HIPAA requires at least
/// the configured retention, not a ceiling, so this only ever deletes
/// rows strictly older than the cutoff).
pub async fn run_retention_sweep(state: Arc<AppState>, interval_seconds: u64, retention_days: i64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));

    loop {
        ticker.tick().await;

        let conn = match try_advisory_lock(&state.db_pool, RETENTION_SWEEP_LOCK_KEY).await {
            Ok(Some(conn)) => conn,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "retention sweep failed to acquire advisory lock");
                continue;
            }
        };

        let cutoff = Utc::now() - chrono::Duration::days(retention_days);
        match state.audit.sweep_retention(cutoff).await {
            Ok(count) => {
                if count > 0 {
                    info!(count, "retention sweep deleted expired audit entries");
                }
                state.metrics.record_sweep_run("retention");
            }
            Err(e) => error!(error = %e, "retention sweep query failed"),
        }

        drop(conn);
    }
}
