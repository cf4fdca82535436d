use radsched_core::{MessageType, Order, OrderData, State};

use crate::effect::Effect;
use crate::messages;
use crate::patch::ConversationPatch;

/// Result of ingesting an order webhook when no active conversation exists
/// for the recipient's phone_hash.
pub struct NewConversationOutcome {
    pub state: State,
    pub order_data: OrderData,
    pub effects: Vec<Effect>,
}

/// Handle an order webhook when no active conversation exists, per
/// two "(none)" transition rows: consent-gated entry into
/// either `CONSENT_PENDING` or straight to `CHOOSING_LOCATION`.
pub fn ingest_new_order(order: Order, consent_active: bool) -> NewConversationOutcome {
    let mut order_data = OrderData::default();
    order_data.active_order = Some(order);

    if consent_active {
        let locations = order_data.active_order.as_ref().unwrap().available_locations.clone();
        NewConversationOutcome {
            state: State::ChoosingLocation,
            order_data,
            effects: vec![Effect::SendSms {
                message_type: MessageType::LocationPrompted,
                body: messages::location_prompt(&locations, false),
            }],
        }
    } else {
        NewConversationOutcome {
            state: State::ConsentPending,
            order_data,
            effects: vec![Effect::SendSms {
                message_type: MessageType::ConsentPrompted,
                body: messages::consent_prompt(1),
            }],
        }
    }
}

/// Result of ingesting an order webhook for an existing, non-terminal
/// conversation.
pub struct AppendOrderOutcome {
    pub patch: ConversationPatch,
    pub effects: Vec<Effect>,
}

/// Handle an order webhook when a non-terminal conversation already exists,
/// applying the always-queue rule and CONSENT_PENDING re-send rule.
/// A no-op (empty patch, no effects) if `order.order_id` is already known to
/// this conversation — idempotent replay.
pub fn ingest_order_for_existing(order: Order, state: State, order_data: &OrderData) -> AppendOrderOutcome {
    if order_data.has_order(&order.order_id) {
        return AppendOrderOutcome {
            patch: ConversationPatch::none(),
            effects: vec![],
        };
    }

    let mut updated = order_data.clone();
    updated.pending_orders.push(order);

    let effects = if state == State::ConsentPending {
        let order_count = 1 + updated.pending_orders.len();
        vec![Effect::SendSms {
            message_type: MessageType::ConsentPrompted,
            body: messages::consent_prompt(order_count),
        }]
    } else {
        // Non-CONSENT_PENDING, non-terminal: silently queued, no SMS, per
        // re-send rule (do not interrupt a mid-conversation
        // patient).
        vec![]
    };

    AppendOrderOutcome {
        patch: ConversationPatch::none().with_order_data(updated),
        effects,
    }
}
