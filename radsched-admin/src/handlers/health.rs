use axum::response::Json;
use serde_json::{json, Value};

/// Liveness probe, no auth required — mirrors the inbound edge's own
/// `/health` route.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
