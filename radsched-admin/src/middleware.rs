use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use subtle::ConstantTimeEq;

use crate::server::AppState;

/// Admin API bearer-token authentication. Disabled (passes every request
/// through) when `admin.api_key` is unset in configuration — acceptable
/// for local development, never for a deployed instance.
pub async fn bearer_auth(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = &state.api_key else {
        return Ok(next.run(request).await);
    };

    let authorized = match auth {
        Some(TypedHeader(Authorization(bearer))) => {
            let provided = bearer.token().as_bytes();
            let expected = expected.as_bytes();
            provided.len() == expected.len() && bool::from(provided.ct_eq(expected))
        }
        None => false,
    };

    if authorized {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}
