use std::sync::Arc;

use async_trait::async_trait;
use radsched_core::audit::MessageType;
use radsched_core::error::CoreError;
use radsched_core::ids::ConversationId;
use radsched_core::ResendSink;
use radsched_engine::current_prompt_for;

use crate::state::AppState;

/// The real [`ResendSink`]: decrypts the conversation's phone number and
/// re-sends whatever prompt its current state implies. Lives here rather
/// than in `radsched-admin` because only this crate links
/// `radsched-crypto` (no-decrypt-path boundary).
pub struct ServerResendSink {
    pub state: Arc<AppState>,
}

#[async_trait]
impl ResendSink for ServerResendSink {
    async fn resend(&self, conversation_id: ConversationId) -> Result<(), CoreError> {
        let conversation = self.state.conversations.get(conversation_id).await?;

        let Some(body) = current_prompt_for(&conversation) else {
            // Terminal or COORDINATOR_REVIEW states have no standing prompt
            // to replay; nothing to resend.
            return Ok(());
        };

        let phone_plaintext =
            radsched_crypto::decrypt_phone(&self.state.phone_enc_key, &conversation.phone_encrypted.0)
                .map_err(|_| CoreError::Internal)?;

        self.state
            .dispatcher
            .send(
                &conversation.organization_id,
                Some(conversation.id),
                &conversation.phone_hash,
                &phone_plaintext,
                &body,
                MessageType::AdminOverride,
            )
            .await
            .map_err(|e| crate::error::EdgeError::from(e).0)?;

        Ok(())
    }
}
