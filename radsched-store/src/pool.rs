use radsched_core::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect a Postgres pool sized per [`DatabaseConfig`]. Migrations are run
/// separately by the server binary at startup via `sqlx::migrate!`.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}
