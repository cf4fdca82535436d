use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use radsched_core::error::CoreError;
use radsched_sms::SmsError;
use radsched_store::StoreError;
use serde_json::json;

/// Wraps [`CoreError`] so the inbound edge can implement `IntoResponse`
/// without that impl living in `radsched-core` (which has no axum
/// dependency, by design — it is a pure domain crate).
///
/// Every handler collapses its failure paths to this type; 
/// propagation policy, nothing else is allowed to escape a handler.
#[derive(Debug)]
pub struct EdgeError(pub CoreError);

impl From<CoreError> for EdgeError {
    fn from(e: CoreError) -> Self {
        Self(e)
    }
}

impl From<StoreError> for EdgeError {
    fn from(e: StoreError) -> Self {
        Self(e.into())
    }
}

impl From<radsched_ie::IeError> for EdgeError {
    fn from(e: radsched_ie::IeError) -> Self {
        Self(e.into())
    }
}

/// `radsched-sms` has no `From<SmsError> for CoreError` of its own — unlike
/// `StoreError`/`IeError` — because the dispatcher's failure modes
/// (consent-blocked, unregistered provider, config-missing) are audited
/// and swallowed inside `Dispatcher::send` itself; by the time one escapes
/// here it is either a deployment mistake or a storage blip.
impl From<SmsError> for EdgeError {
    fn from(e: SmsError) -> Self {
        let core = match e {
            SmsError::ConsentNotGranted => CoreError::ConsentBlocked,
            SmsError::Storage(store_err) => store_err.into(),
            SmsError::OrgConfigNotFound(_) | SmsError::ProviderNotRegistered(_) => CoreError::Internal,
        };
        Self(core)
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match &self.0 {
            CoreError::Validation(msg) => json!({ "error": msg }),
            CoreError::Internal | CoreError::StorageTransient => json!({ "error": "internal error" }),
            _ => json!({ "error": self.0.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
