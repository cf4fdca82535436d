use chrono::{DateTime, Utc};
use radsched_core::{OrderData, State};

/// Field-level updates to apply to a [`radsched_core::Conversation`] after a
/// `decide()` call, kept separate from the read of the conversation so the
/// decision logic stays a pure function of (event, snapshot) -> patch.
///
/// `Option<Option<T>>` fields distinguish "leave unchanged" (`None`) from
/// "clear to `None`" (`Some(None)`) from "set" (`Some(Some(v))`).
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub next_state: Option<State>,
    pub order_data: Option<OrderData>,
    pub slot_request_sent_at: Option<Option<DateTime<Utc>>>,
    pub slot_retry_count: Option<i32>,
    pub slot_request_failed_at: Option<Option<DateTime<Utc>>>,
    pub booking_request_sent_at: Option<Option<DateTime<Utc>>>,
    pub booking_retry_count: Option<i32>,
    pub unrecognized_replies: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ConversationPatch {
    pub fn transition_to(state: State) -> Self {
        Self {
            next_state: Some(state),
            ..Default::default()
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_order_data(mut self, order_data: OrderData) -> Self {
        self.order_data = Some(order_data);
        self
    }

    pub fn with_completed_at(mut self, now: DateTime<Utc>) -> Self {
        self.completed_at = Some(now);
        self
    }

    pub fn resetting_unrecognized(mut self) -> Self {
        self.unrecognized_replies = Some(0);
        self
    }

    pub fn incrementing_unrecognized(mut self, current: i32) -> Self {
        self.unrecognized_replies = Some(current + 1);
        self
    }

    /// Whether this patch changes nothing at all — the shape
    /// `Decision::unchanged()` always produces, and the signal callers use
    /// to skip a pointless CAS write (e.g. an idempotent callback replay
    ///).
    pub fn is_noop(&self) -> bool {
        self.next_state.is_none()
            && self.order_data.is_none()
            && self.slot_request_sent_at.is_none()
            && self.slot_retry_count.is_none()
            && self.slot_request_failed_at.is_none()
            && self.booking_request_sent_at.is_none()
            && self.booking_retry_count.is_none()
            && self.unrecognized_replies.is_none()
            && self.completed_at.is_none()
    }
}

/// Apply a patch to a conversation in place. Used by callers (the inbound
/// edge, the monitor) after a successful CAS write; `radsched-engine` itself
/// never touches storage.
pub fn apply_patch(conversation: &mut radsched_core::Conversation, patch: &ConversationPatch) {
    if let Some(state) = patch.next_state {
        conversation.state = state;
    }
    if let Some(order_data) = &patch.order_data {
        conversation.order_data = order_data.clone();
    }
    if let Some(v) = patch.slot_request_sent_at {
        conversation.slot_request_sent_at = v;
    }
    if let Some(v) = patch.slot_retry_count {
        conversation.slot_retry_count = v;
    }
    if let Some(v) = patch.slot_request_failed_at {
        conversation.slot_request_failed_at = v;
    }
    if let Some(v) = patch.booking_request_sent_at {
        conversation.booking_request_sent_at = v;
    }
    if let Some(v) = patch.booking_retry_count {
        conversation.booking_retry_count = v;
    }
    if let Some(v) = patch.unrecognized_replies {
        conversation.unrecognized_replies = v;
    }
    if let Some(v) = patch.completed_at {
        conversation.completed_at = Some(v);
    }
}
