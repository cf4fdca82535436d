use thiserror::Error;

/// Unified error taxonomy for the scheduling core, mirroring 
/// one-for-one. Every inbound-edge handler maps its failures down to one of
/// these variants so that propagation policy ("the engine never throws
/// through the inbound edge") is enforced by the type system rather than by
/// convention.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed webhook payload. Maps to HTTP 400, no side effects.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Bad bearer token / signature. Maps to HTTP 403.
    #[error("authentication failed")]
    Auth,

    /// Attempted a non-whitelisted outbound send without granted consent.
    #[error("consent not granted for this recipient")]
    ConsentBlocked,

    /// Backing store unavailable (connection pool exhausted, etc). Maps to
    /// a retryable 5xx so the upstream redelivers.
    #[error("storage temporarily unavailable")]
    StorageTransient,

    /// Interface-engine call failed transiently; state is left unchanged
    /// and the stuck-session monitor will retry.
    #[error("interface engine temporarily unreachable")]
    IeTransient,

    /// Interface-engine call failed after retry exhaustion, or reported a
    /// definitive failure. Patient-visible "please call", conversation
    /// cancelled.
    #[error("interface engine failed permanently: {0}")]
    IeTerminal(String),

    /// No active conversation found for an inbound SMS or callback.
    #[error("no active conversation for this recipient")]
    NoActiveConversation,

    /// A CAS state transition lost its race (another writer already moved
    /// the conversation out of the expected state).
    #[error("conversation state changed concurrently")]
    ConcurrentTransition,

    /// Unexpected internal failure. Never carries PHI; message text is
    /// sanitized at construction time by callers.
    #[error("internal error")]
    Internal,
}

impl CoreError {
    /// Map to an HTTP status code per the error taxonomy.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            CoreError::Auth => 403,
            CoreError::ConsentBlocked => 200, // swallowed: audited, not surfaced as an error
            CoreError::StorageTransient => 503,
            CoreError::IeTransient => 200, // accepted; state unchanged, monitor retries
            CoreError::IeTerminal(_) => 200,
            CoreError::NoActiveConversation => 200, // webhook still 200s; audited and dropped
            CoreError::ConcurrentTransition => 409,
            CoreError::Internal => 500,
        }
    }

    /// The single neutral user-visible message template 
    /// Every distinct terminal failure mode collapses to this text so that
    /// a patient cannot probe which specific failure occurred.
    pub const PATIENT_FACING_FAILURE: &'static str =
        "We're unable to complete this by text right now, please call our scheduling line.";
}
