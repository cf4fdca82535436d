use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, Postgres};

/// A fixed, arbitrary key identifying the stuck-session monitor's
/// single-runner lock. Any `bigint` works as a `pg_advisory_lock` key; this
/// one has no meaning beyond "the stuck-session monitor".
pub const STUCK_MONITOR_LOCK_KEY: i64 = 0x5253_4d4f_4e49_544f; // "RSMONITO"

/// Try to acquire a session-level Postgres advisory lock, non-blocking.
///
/// `pg_advisory_lock` is tied to the connection that took it, so this
/// checks out a dedicated connection from the pool (rather than borrowing
/// one for a single query and handing it back) and returns it to the
/// caller to hold for as long as the lock should stay held; dropping the
/// connection releases the lock even if the process crashes mid-sweep.
/// Used so that when `radsched-server` is horizontally scaled, only one
/// replica's sweep loop runs a given periodic job at a time.
pub async fn try_advisory_lock(
    pool: &PgPool,
    key: i64,
) -> Result<Option<PoolConnection<Postgres>>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .bind(key)
        .fetch_one(&mut *conn)
        .await?;
    Ok(if acquired { Some(conn) } else { None })
}
