use async_trait::async_trait;

/// The outcome bucket a provider reports for one send attempt:
/// `SendResult{status ∈ {sent, transient_fail, permanent_fail_failover,
/// permanent_fail_recipient}, provider_code}`. This is the seam: adding a
/// provider means implementing [`SmsProvider`], not touching the
/// dispatcher's failover/classification logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Sent,
    /// Worth retrying the same provider once before giving up on it.
    TransientFail,
    /// Sender-side failure; switching providers is likely to resolve it.
    PermanentFailFailover,
    /// Recipient-side failure; no provider switch will help.
    PermanentFailRecipient,
}

/// The normalized error-code taxonomy. Providers map their own
/// carrier-specific codes into this fixed set; the dispatcher never sees a
/// raw vendor code when deciding whether to fail over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NumberBlocked,
    CarrierViolation,
    RateLimited,
    ProviderError,
    NetworkError,
    InvalidNumber,
    InvalidContent,
    Undeliverable,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NumberBlocked => "NUMBER_BLOCKED",
            ErrorCode::CarrierViolation => "CARRIER_VIOLATION",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::InvalidNumber => "INVALID_NUMBER",
            ErrorCode::InvalidContent => "INVALID_CONTENT",
            ErrorCode::Undeliverable => "UNDELIVERABLE",
        }
    }

    /// Whether this error code belongs to failover-eligible
    /// set (sender-side) rather than the recipient-side set.
    pub fn is_failover_eligible(self) -> bool {
        matches!(
            self,
            ErrorCode::NumberBlocked
                | ErrorCode::CarrierViolation
                | ErrorCode::RateLimited
                | ErrorCode::ProviderError
                | ErrorCode::NetworkError
        )
    }
}

/// Result of a single provider send attempt.
#[derive(Debug, Clone)]
pub struct ProviderResult {
    pub status: ProviderStatus,
    pub error_code: Option<ErrorCode>,
    /// Vendor-specific code, carried for provider-side reconciliation; never
    /// written to an audit row (no-free-text invariant covers
    /// audit entries, not this struct, but the dispatcher only forwards
    /// `error_code.as_str()` onward, never `raw_code`).
    pub raw_code: Option<String>,
}

impl ProviderResult {
    pub fn sent() -> Self {
        Self {
            status: ProviderStatus::Sent,
            error_code: None,
            raw_code: None,
        }
    }

    pub fn failure(status: ProviderStatus, error_code: ErrorCode, raw_code: impl Into<String>) -> Self {
        Self {
            status,
            error_code: Some(error_code),
            raw_code: Some(raw_code.into()),
        }
    }
}

/// Capability trait for an SMS provider: a name, an async send operation,
/// and a normalized result type rather than a raw status code. Adding a
/// provider means implementing this trait, not changing the dispatcher.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, to: &str, body: &str, from: &str) -> ProviderResult;
}
