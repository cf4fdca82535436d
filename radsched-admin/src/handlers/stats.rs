use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub organization_id: Option<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StateCount {
    pub state: String,
    pub count: i64,
}

pub async fn counts_by_state(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RangeQuery>,
) -> Result<Json<Vec<StateCount>>, (StatusCode, Json<Value>)> {
    let rows = state
        .conversations
        .counts_by_state(q.organization_id.as_deref(), q.from, q.to)
        .await
        .map_err(internal_error)?;
    Ok(Json(
        rows.into_iter().map(|(s, n)| StateCount { state: s.as_str().to_string(), count: n }).collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct StateAvgSeconds {
    pub state: String,
    pub avg_seconds: f64,
}

/// See `ConversationRepo::avg_time_in_state` for the approximation this
/// endpoint surfaces — time-to-terminal-state bucketed by final state, not
/// a true per-visit average.
pub async fn avg_time_in_state(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RangeQuery>,
) -> Result<Json<Vec<StateAvgSeconds>>, (StatusCode, Json<Value>)> {
    let rows = state
        .conversations
        .avg_time_in_state(q.organization_id.as_deref(), q.from, q.to)
        .await
        .map_err(internal_error)?;
    Ok(Json(
        rows.into_iter()
            .map(|(s, secs)| StateAvgSeconds { state: s.as_str().to_string(), avg_seconds: secs })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct DirectionVolume {
    pub direction: String,
    pub count: i64,
}

pub async fn sms_volume(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RangeQuery>,
) -> Result<Json<Vec<DirectionVolume>>, (StatusCode, Json<Value>)> {
    let rows = state
        .audit
        .sms_volume_by_direction(q.organization_id.as_deref(), q.from, q.to)
        .await
        .map_err(internal_error)?;
    Ok(Json(
        rows.into_iter()
            .map(|(d, n)| DirectionVolume { direction: direction_str(d).to_string(), count: n })
            .collect(),
    ))
}

fn direction_str(d: radsched_core::Direction) -> &'static str {
    match d {
        radsched_core::Direction::Inbound => "INBOUND",
        radsched_core::Direction::Outbound => "OUTBOUND",
        radsched_core::Direction::System => "SYSTEM",
    }
}

fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    tracing::error!(error = %e, "admin stats handler failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "internal error" })))
}
