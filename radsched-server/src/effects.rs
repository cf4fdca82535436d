use radsched_core::consent::ConsentMethod;
use radsched_core::conversation::Conversation;
use radsched_engine::Effect;
use radsched_ie::{BookingRequest, IeClient, SlotRequest};
use radsched_sms::Dispatcher;
use radsched_store::ConsentRepo;

/// Collaborators an [`Effect`] needs to actually run, borrowed for the
/// duration of one handler's effect-execution pass.
pub struct EffectContext<'a> {
    pub dispatcher: &'a Dispatcher,
    pub ie: &'a IeClient,
    pub consent: &'a ConsentRepo,
    /// The conversation *after* its patch has already been committed —
    /// effects never mutate conversation state, only read identifiers and
    /// patient data out of it.
    pub conversation: &'a Conversation,
    pub phone_plaintext: &'a str,
}

/// Runs every effect `decide`/`ingest_*` returned, in order, against real
/// collaborators. Per the ordering implies (the conversation
/// patch that produced these effects is already durably committed by the
/// time this runs), a failure here is logged and swallowed rather than
/// bubbled up: the stuck-session monitor already owns retrying a
/// conversation stuck on a timestamp the patch optimistically set, so
/// letting this function fail loudly would just turn a retryable gap into
/// a 500 the caller can't act on.
pub async fn execute_effects(effects: &[Effect], ctx: &EffectContext<'_>) {
    for effect in effects {
        if let Err(err) = execute_one(effect, ctx).await {
            tracing::warn!(
                conversation_id = %ctx.conversation.id,
                effect = ?effect,
                error = %err,
                "effect execution failed, leaving conversation state for monitor to retry"
            );
        }
    }
}

async fn execute_one(effect: &Effect, ctx: &EffectContext<'_>) -> Result<(), EffectError> {
    match effect {
        Effect::SendSms { message_type, body } => {
            ctx.dispatcher
                .send(
                    &ctx.conversation.organization_id,
                    Some(ctx.conversation.id),
                    &ctx.conversation.phone_hash,
                    ctx.phone_plaintext,
                    body,
                    *message_type,
                )
                .await?;
            Ok(())
        }
        Effect::IssueSlotRequest { selected_location, order_ids, duration_minutes } => {
            let patient = active_order_patient(ctx.conversation)?;
            let request = SlotRequest {
                conversation_id: ctx.conversation.id.to_string(),
                selected_location: selected_location.clone(),
                order_ids: order_ids.clone(),
                duration_minutes: *duration_minutes,
                patient,
            };
            ctx.ie.request_slots(&request).await?;
            Ok(())
        }
        Effect::IssueBookingRequest { order_ids, selected_slot } => {
            let patient = active_order_patient(ctx.conversation)?;
            let request = BookingRequest {
                conversation_id: ctx.conversation.id.to_string(),
                order_ids: order_ids.clone(),
                selected_slot: selected_slot.clone(),
                patient,
            };
            ctx.ie.book_appointment(&request).await?;
            Ok(())
        }
        Effect::RecordConsentGrant => {
            ctx.consent
                .grant(&ctx.conversation.phone_hash, &ctx.conversation.organization_id, ConsentMethod::SmsReply)
                .await?;
            Ok(())
        }
        Effect::RecordConsentRevoke => {
            ctx.consent
                .revoke(&ctx.conversation.phone_hash, &ctx.conversation.organization_id)
                .await?;
            Ok(())
        }
    }
}

fn active_order_patient(conversation: &Conversation) -> Result<radsched_core::PatientIdentifiers, EffectError> {
    conversation
        .order_data
        .active_order
        .as_ref()
        .map(|order| order.patient.clone())
        .ok_or(EffectError::NoActiveOrder)
}

#[derive(Debug, thiserror::Error)]
enum EffectError {
    #[error("conversation has no active order to attach identifiers from")]
    NoActiveOrder,
    #[error(transparent)]
    Sms(#[from] radsched_sms::SmsError),
    #[error(transparent)]
    Ie(#[from] radsched_ie::IeError),
    #[error(transparent)]
    Store(#[from] radsched_store::StoreError),
}
