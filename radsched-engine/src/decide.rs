use chrono::{DateTime, Utc};
use radsched_core::config::SessionConfig;
use radsched_core::{Conversation, MessageType, State};

use crate::consolidation::aggregate_for_booking;
use crate::effect::Effect;
use crate::event::Event;
use crate::ingest;
use crate::messages;
use crate::parser::{parse_inbound, ParsedReply};
use crate::patch::ConversationPatch;
use crate::safety::{SafetyCheck, SafetyVerdict};

/// Output of one [`decide`] call: what to change on the conversation, and
/// what side effects to execute. Side effects are data; `decide` never
/// performs I/O.
#[derive(Debug, Clone, Default)]
pub struct Decision {
    pub patch: ConversationPatch,
    pub effects: Vec<Effect>,
}

impl Decision {
    fn unchanged() -> Self {
        Self::default()
    }
}

/// The pure state-transition function for an existing, non-terminal
/// conversation, covering every row of transition table
/// except the two "(none)" rows (handled by [`crate::ingest`] before a
/// conversation exists).
pub fn decide(
    event: Event,
    conversation: &Conversation,
    config: &SessionConfig,
    safety: &dyn SafetyCheck,
    now: DateTime<Utc>,
) -> Decision {
    if conversation.state.is_terminal() {
        return Decision::unchanged();
    }

    match event {
        Event::OrderAppended { order } => {
            let outcome = ingest::ingest_order_for_existing(order, conversation.state, &conversation.order_data);
            Decision { patch: outcome.patch, effects: outcome.effects }
        }
        Event::InboundSms { body } => decide_inbound_sms(&body, conversation, config, safety, now),
        Event::SlotsReturned { slots } => decide_slots_returned(slots, conversation),
        Event::SlotsEmpty => decide_slots_empty(conversation),
        Event::SlotRequestFailed { retries_exhausted } | Event::SlotRequestTimeout { retries_exhausted } => {
            decide_slot_retry_or_cancel(conversation, config, retries_exhausted, now)
        }
        Event::BookingConfirmed { appointment, order_ids: _ } => decide_booking_confirmed(appointment, conversation, now),
        Event::BookingFailed { retries_exhausted } | Event::BookingTimeout { retries_exhausted } => {
            decide_booking_retry_or_cancel(conversation, config, retries_exhausted, now)
        }
        Event::ExpirySweep => decide_expiry(conversation, now),
    }
}

fn decide_expiry(conversation: &Conversation, now: DateTime<Utc>) -> Decision {
    if !conversation.is_expired(now) {
        return Decision::unchanged();
    }
    Decision {
        patch: ConversationPatch::transition_to(State::Expired).with_completed_at(now),
        effects: vec![],
    }
}

fn decide_inbound_sms(
    body: &str,
    conversation: &Conversation,
    config: &SessionConfig,
    safety: &dyn SafetyCheck,
    now: DateTime<Utc>,
) -> Decision {
    let parsed = parse_inbound(body);

    match parsed {
        ParsedReply::OptOut => opt_out(now),
        ParsedReply::Decline if conversation.state == State::ConsentPending => opt_out(now),
        ParsedReply::Consent if conversation.state == State::ConsentPending => {
            let order_data = &conversation.order_data;
            let locations = order_data
                .active_order
                .as_ref()
                .map(|o| o.available_locations.clone())
                .unwrap_or_default();
            Decision {
                patch: ConversationPatch::transition_to(State::ChoosingLocation).resetting_unrecognized(),
                effects: vec![
                    Effect::RecordConsentGrant,
                    Effect::SendSms {
                        message_type: MessageType::LocationPrompted,
                        body: messages::location_prompt(&locations, false),
                    },
                ],
            }
        }
        ParsedReply::Digit(n) if conversation.state == State::ChoosingLocation => {
            decide_location_choice(n, conversation, config, now)
        }
        ParsedReply::Digit(n) if conversation.state == State::ChoosingTime => {
            decide_slot_choice(n, conversation, config, safety, now)
        }
        _ => decide_unrecognized(conversation, config, now),
    }
}

fn opt_out(now: DateTime<Utc>) -> Decision {
    Decision {
        patch: ConversationPatch::transition_to(State::Cancelled).with_completed_at(now),
        effects: vec![
            Effect::RecordConsentRevoke,
            Effect::SendSms {
                message_type: MessageType::OptOut,
                body: messages::opt_out_ack(),
            },
        ],
    }
}

fn decide_location_choice(n: u32, conversation: &Conversation, config: &SessionConfig, now: DateTime<Utc>) -> Decision {
    let order_data = &conversation.order_data;
    let locations = order_data
        .active_order
        .as_ref()
        .map(|o| o.available_locations.clone())
        .unwrap_or_default();

    let idx = n.checked_sub(1).map(|i| i as usize);
    let selected = idx.and_then(|i| locations.get(i).cloned());

    let Some(location) = selected else {
        return reprompt_or_cancel(
            conversation,
            config,
            now,
            Effect::SendSms {
                message_type: MessageType::LocationPrompted,
                body: messages::location_prompt(&locations, true),
            },
        );
    };

    let mut updated = order_data.clone();
    updated.selected_location = Some(location.clone());

    let order_ids = updated.known_order_ids().into_iter().map(String::from).collect::<Vec<_>>();
    let duration_minutes = updated
        .active_order
        .as_ref()
        .and_then(|o| o.estimated_duration_minutes)
        .unwrap_or(30);

    Decision {
        patch: ConversationPatch::transition_to(State::ChoosingTime)
            .with_order_data(updated)
            .resetting_unrecognized(),
        effects: vec![
            Effect::IssueSlotRequest {
                selected_location: location.clone(),
                order_ids,
                duration_minutes,
            },
            Effect::SendSms {
                message_type: MessageType::SlotRequestSent,
                body: messages::searching_message(&location.name),
            },
        ],
    }
    .with_slot_request_sent_at(now)
}

fn decide_slot_choice(
    n: u32,
    conversation: &Conversation,
    config: &SessionConfig,
    safety: &dyn SafetyCheck,
    now: DateTime<Utc>,
) -> Decision {
    let order_data = &conversation.order_data;
    let idx = n.checked_sub(1).map(|i| i as usize);
    let selected = idx.and_then(|i| order_data.available_slots.get(i).cloned());

    let Some(slot) = selected else {
        return reprompt_or_cancel(
            conversation,
            config,
            now,
            Effect::SendSms {
                message_type: MessageType::SlotsOffered,
                body: messages::slot_prompt(&order_data.available_slots),
            },
        );
    };

    let patient_context = order_data.active_order.as_ref().and_then(|o| o.patient_context.as_ref());
    if let SafetyVerdict::Block = safety.check(patient_context) {
        return Decision {
            patch: ConversationPatch::transition_to(State::CoordinatorReview).resetting_unrecognized(),
            effects: vec![],
        };
    }

    let mut updated = order_data.clone();
    updated.selected_slot = Some(slot.clone());

    let (aggregate, remaining) = aggregate_for_booking(&updated, config.default_aggregation_rule);
    updated.pending_orders = remaining;

    Decision {
        patch: ConversationPatch::none().with_order_data(updated).resetting_unrecognized(),
        effects: vec![Effect::IssueBookingRequest {
            order_ids: aggregate.order_ids,
            selected_slot: slot,
        }],
    }
    .with_booking_request_sent_at(now)
}

fn decide_unrecognized(conversation: &Conversation, config: &SessionConfig, now: DateTime<Utc>) -> Decision {
    let current_prompt = current_prompt_for(conversation);
    let Some(prompt) = current_prompt else {
        return Decision::unchanged();
    };
    reprompt_or_cancel(
        conversation,
        config,
        now,
        Effect::SendSms {
            message_type: MessageType::UnrecognizedReply,
            body: messages::unrecognized_reply_preface(&prompt),
        },
    )
}

/// The message a conversation's current state would prompt the patient
/// with — used both to build an unrecognized-reply reprompt and, by
/// `radsched-admin`'s resend endpoint, to re-send the same prompt without
/// duplicating its rendering logic.
pub fn current_prompt_for(conversation: &Conversation) -> Option<String> {
    match conversation.state {
        State::ConsentPending => {
            let order_count = 1 + conversation.order_data.pending_orders.len();
            Some(messages::consent_prompt(order_count))
        }
        State::ChoosingLocation => {
            let locations = conversation
                .order_data
                .active_order
                .as_ref()
                .map(|o| o.available_locations.clone())
                .unwrap_or_default();
            Some(messages::location_prompt(&locations, false))
        }
        State::ChoosingTime => Some(messages::slot_prompt(&conversation.order_data.available_slots)),
        State::CoordinatorReview => None,
        State::Confirmed | State::Cancelled | State::Expired => None,
    }
}

/// Shared "increment unrecognized_replies, re-prompt; on the third strike,
/// send the terminal call-us message and cancel" behavior, used both for
/// genuinely unrecognized replies and for out-of-range digit choices
/// (boundary behavior explicitly counts both).
fn reprompt_or_cancel(conversation: &Conversation, config: &SessionConfig, now: DateTime<Utc>, reprompt: Effect) -> Decision {
    let next_count = conversation.unrecognized_replies + 1;
    if next_count >= config.max_unrecognized_replies {
        Decision {
            patch: ConversationPatch::transition_to(State::Cancelled).with_completed_at(now),
            effects: vec![Effect::SendSms {
                message_type: MessageType::Cancelled,
                body: messages::PATIENT_CALL_MESSAGE.to_string(),
            }],
        }
    } else {
        Decision {
            patch: ConversationPatch::none().incrementing_unrecognized(conversation.unrecognized_replies),
            effects: vec![reprompt],
        }
    }
}

fn decide_slots_returned(slots: Vec<radsched_core::Slot>, conversation: &Conversation) -> Decision {
    if conversation.state != State::ChoosingTime {
        return Decision::unchanged();
    }
    let mut updated = conversation.order_data.clone();
    updated.available_slots = slots.clone();

    Decision {
        patch: ConversationPatch::none().with_order_data(updated),
        effects: vec![Effect::SendSms {
            message_type: MessageType::SlotsOffered,
            body: messages::slot_prompt(&slots),
        }],
    }
    .clearing_slot_request()
}

fn decide_slots_empty(conversation: &Conversation) -> Decision {
    if conversation.state != State::ChoosingTime {
        return Decision::unchanged();
    }
    let location_name = conversation
        .order_data
        .selected_location
        .as_ref()
        .map(|l| l.name.clone())
        .unwrap_or_default();
    let locations = conversation
        .order_data
        .active_order
        .as_ref()
        .map(|o| o.available_locations.clone())
        .unwrap_or_default();

    Decision {
        patch: ConversationPatch::transition_to(State::ChoosingLocation),
        effects: vec![Effect::SendSms {
            message_type: MessageType::LocationPrompted,
            body: messages::no_availability_prompt(&location_name, &locations),
        }],
    }
    .clearing_slot_request()
}

fn decide_slot_retry_or_cancel(
    conversation: &Conversation,
    config: &SessionConfig,
    retries_exhausted: bool,
    now: DateTime<Utc>,
) -> Decision {
    if conversation.state != State::ChoosingTime {
        return Decision::unchanged();
    }
    if retries_exhausted || conversation.slot_retry_count >= config.slot_max_retries {
        return Decision {
            patch: ConversationPatch::transition_to(State::Cancelled).with_completed_at(now),
            effects: vec![Effect::SendSms {
                message_type: MessageType::BookingFailed,
                body: messages::PATIENT_CALL_MESSAGE.to_string(),
            }],
        };
    }

    let location = conversation.order_data.selected_location.clone().expect("slot retry requires a selected location");
    let order_ids = conversation
        .order_data
        .known_order_ids()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let duration_minutes = conversation
        .order_data
        .active_order
        .as_ref()
        .and_then(|o| o.estimated_duration_minutes)
        .unwrap_or(30);

    Decision {
        patch: ConversationPatch {
            slot_retry_count: Some(conversation.slot_retry_count + 1),
            ..Default::default()
        },
        effects: vec![Effect::IssueSlotRequest { selected_location: location, order_ids, duration_minutes }],
    }
    .with_slot_request_sent_at(now)
}

fn decide_booking_confirmed(appointment: radsched_core::Appointment, conversation: &Conversation, now: DateTime<Utc>) -> Decision {
    if let Some(existing) = &conversation.order_data.appointment {
        if existing.appointment_id == appointment.appointment_id {
            // Idempotent replay : no new state change, no SMS.
            return Decision::unchanged();
        }
    }

    let mut updated = conversation.order_data.clone();
    updated.appointment = Some(appointment.clone());

    Decision {
        patch: ConversationPatch::transition_to(State::Confirmed)
            .with_order_data(updated)
            .with_completed_at(now),
        effects: vec![Effect::SendSms {
            message_type: MessageType::BookingConfirmed,
            body: messages::confirmation_message(&appointment),
        }],
    }
    .clearing_booking_request()
}

fn decide_booking_retry_or_cancel(
    conversation: &Conversation,
    config: &SessionConfig,
    retries_exhausted: bool,
    now: DateTime<Utc>,
) -> Decision {
    if conversation.order_data.selected_slot.is_none() || conversation.order_data.appointment.is_some() {
        return Decision::unchanged();
    }
    if retries_exhausted || conversation.booking_retry_count >= config.slot_max_retries {
        return Decision {
            patch: ConversationPatch::transition_to(State::Cancelled).with_completed_at(now),
            effects: vec![Effect::SendSms {
                message_type: MessageType::BookingFailed,
                body: messages::PATIENT_CALL_MESSAGE.to_string(),
            }],
        };
    }

    let slot = conversation.order_data.selected_slot.clone().expect("booking retry requires a selected slot");
    let (aggregate, _) = aggregate_for_booking(&conversation.order_data, config.default_aggregation_rule);

    Decision {
        patch: ConversationPatch {
            booking_retry_count: Some(conversation.booking_retry_count + 1),
            ..Default::default()
        },
        effects: vec![Effect::IssueBookingRequest { order_ids: aggregate.order_ids, selected_slot: slot }],
    }
    .with_booking_request_sent_at(now)
}

impl Decision {
    fn with_slot_request_sent_at(mut self, now: DateTime<Utc>) -> Self {
        self.patch.slot_request_sent_at = Some(Some(now));
        self
    }

    fn clearing_slot_request(mut self) -> Self {
        self.patch.slot_request_sent_at = Some(None);
        self
    }

    fn with_booking_request_sent_at(mut self, now: DateTime<Utc>) -> Self {
        self.patch.booking_request_sent_at = Some(Some(now));
        self
    }

    fn clearing_booking_request(mut self) -> Self {
        self.patch.booking_request_sent_at = Some(None);
        self
    }
}
