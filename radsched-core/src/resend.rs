use async_trait::async_trait;

use crate::error::CoreError;
use crate::ids::ConversationId;

/// Re-sends the message a conversation's current state would prompt the
/// patient with, without changing any state.
///
/// Kept as a trait here — rather than a concrete type depending on
/// `radsched-sms`'s `Dispatcher` and `radsched-crypto`'s phone decryption —
/// so `radsched-admin` can expose a `resend` endpoint while never linking
/// against `radsched-crypto` itself (no-decrypt-path
/// requirement is enforced at the dependency-graph level, not just by
/// convention). `radsched-server` supplies the real implementation, which
/// decrypts `phone_encrypted` and calls the SMS dispatcher; tests can
/// substitute a recording stub.
#[async_trait]
pub trait ResendSink: Send + Sync {
    async fn resend(&self, conversation_id: ConversationId) -> Result<(), CoreError>;
}
