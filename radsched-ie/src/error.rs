use thiserror::Error;

/// Errors raised by the interface-engine client, already collapsed to the
/// two buckets `radsched-engine` needs to decide between: retry-worthy vs.
/// definitively failed.
#[derive(Error, Debug)]
pub enum IeError {
    /// Transport-level failure after exhausting the bounded retry budget
    /// (connection refused, timeout, 5xx). The engine leaves conversation
    /// state unchanged and lets the stuck-session monitor retry.
    #[error("interface engine unreachable after retries: {0}")]
    Transient(String),

    /// The IE responded but reported a definitive failure (4xx, or a
    /// structured error body). No amount of retrying will help.
    #[error("interface engine rejected the request: {0}")]
    Terminal(String),
}

impl From<IeError> for radsched_core::error::CoreError {
    fn from(e: IeError) -> Self {
        match e {
            IeError::Transient(_) => radsched_core::error::CoreError::IeTransient,
            IeError::Terminal(msg) => radsched_core::error::CoreError::IeTerminal(msg),
        }
    }
}
