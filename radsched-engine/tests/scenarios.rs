//! End-to-end scenarios A-F, driving `decide`/`ingest` the way the inbound
//! edge would: build a conversation, apply one event, apply the returned
//! patch, assert on state/effects, repeat.

use chrono::Utc;
use radsched_core::config::{AggregationRule, SessionConfig};
use radsched_core::ids::{PhoneEncrypted, PhoneHash};
use radsched_core::{Appointment, Conversation, Location, MessageType, Order, OrderData, PatientIdentifiers, Slot, State};
use radsched_engine::{apply_patch, decide, ingest_new_order, ingest_order_for_existing, Effect, Event, NoopSafetyCheck};

fn session_config() -> SessionConfig {
    SessionConfig {
        ttl_hours: 24,
        slot_response_sla_seconds: 90,
        slot_max_retries: 1,
        booking_sla_seconds: 30,
        max_unrecognized_replies: 3,
        default_aggregation_rule: AggregationRule::Sum,
    }
}

fn patient() -> PatientIdentifiers {
    PatientIdentifiers { mrn: "MRN-1".into(), dob: None, gender: None, name: None }
}

fn order(id: &str, modality: &str, locations: Vec<Location>) -> Order {
    Order {
        order_id: id.into(),
        order_group_id: None,
        modality: modality.into(),
        priority: None,
        order_description: Some("X-ray chest".into()),
        procedures: vec![],
        estimated_duration_minutes: Some(30),
        ordering_practice: None,
        available_locations: locations,
        patient: patient(),
        patient_context: None,
    }
}

fn downtown_and_north() -> Vec<Location> {
    vec![
        Location { id: "L1".into(), name: "Downtown".into(), address: None, capabilities: None },
        Location { id: "L2".into(), name: "North".into(), address: None, capabilities: None },
    ]
}

fn new_conversation(state: State, order_data: OrderData) -> Conversation {
    Conversation::new(
        PhoneHash("hash-+15551234567".into()),
        PhoneEncrypted("enc-+15551234567".into()),
        "org1",
        state,
        order_data,
        Utc::now(),
        24,
    )
}

fn find_sms(effects: &[Effect]) -> Option<(&MessageType, &String)> {
    effects.iter().find_map(|e| match e {
        Effect::SendSms { message_type, body } => Some((message_type, body)),
        _ => None,
    })
}

#[test]
fn scenario_a_happy_path_single_order_first_time_consent() {
    let config = session_config();
    let safety = NoopSafetyCheck;

    // Step 1: order webhook, no existing conversation, no prior consent.
    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    assert_eq!(outcome.state, State::ConsentPending);
    let (msg_type, body) = find_sms(&outcome.effects).expect("consent prompt sent");
    assert_eq!(*msg_type, MessageType::ConsentPrompted);
    assert!(body.starts_with("Reply YES"));

    let mut convo = new_conversation(outcome.state, outcome.order_data);

    // Step 2: inbound YES.
    let decision = decide(Event::InboundSms { body: "YES".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::ChoosingLocation);
    let (msg_type, body) = find_sms(&decision.effects).unwrap();
    assert_eq!(*msg_type, MessageType::LocationPrompted);
    assert!(body.contains("1) Downtown"));
    assert!(body.contains("2) North"));

    // Step 3: inbound "1" (Downtown).
    let decision = decide(Event::InboundSms { body: "1".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::ChoosingTime);
    assert_eq!(convo.order_data.selected_location.as_ref().unwrap().id, "L1");
    assert!(convo.slot_request_sent_at.is_some());
    let issued = decision.effects.iter().find_map(|e| match e {
        Effect::IssueSlotRequest { selected_location, order_ids, duration_minutes } => {
            Some((selected_location, order_ids, duration_minutes))
        }
        _ => None,
    });
    let (location, order_ids, duration) = issued.expect("slot request issued");
    assert_eq!(location.id, "L1");
    assert_eq!(order_ids, &vec!["O1".to_string()]);
    assert_eq!(*duration, 30);

    // Step 4: IE schedule-response with two slots.
    let slots = vec![
        Slot { slot_id: "S1".into(), start_at: "2026-02-02T09:00".into(), duration_minutes: 30, resource_id: Some("R1".into()) },
        Slot { slot_id: "S2".into(), start_at: "2026-02-02T10:00".into(), duration_minutes: 30, resource_id: Some("R1".into()) },
    ];
    let decision = decide(Event::SlotsReturned { slots: slots.clone() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert!(convo.slot_request_sent_at.is_none());
    assert_eq!(convo.order_data.available_slots.len(), 2);
    let (msg_type, body) = find_sms(&decision.effects).unwrap();
    assert_eq!(*msg_type, MessageType::SlotsOffered);
    assert!(body.contains("2026-02-02T09:00"));

    // Step 5: inbound "2" selects the second slot.
    let decision = decide(Event::InboundSms { body: "2".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.order_data.selected_slot.as_ref().unwrap().slot_id, "S2");
    assert!(convo.booking_request_sent_at.is_some());
    // Booking in flight: state is unchanged until the appointment callback,
    // per the decided resolution recorded in DESIGN.md's booking-in-flight
    // note (not an optimistic CONFIRMED).
    assert_eq!(convo.state, State::ChoosingTime);
    let booking = decision.effects.iter().find_map(|e| match e {
        Effect::IssueBookingRequest { order_ids, selected_slot } => Some((order_ids, selected_slot)),
        _ => None,
    });
    let (order_ids, selected_slot) = booking.expect("booking request issued");
    assert_eq!(order_ids, &vec!["O1".to_string()]);
    assert_eq!(selected_slot.slot_id, "S2");

    // Step 6: IE appointment-notification confirms.
    let appointment = Appointment {
        appointment_id: "A1".into(),
        filler_appointment_id: Some("F1".into()),
        status: "booked".into(),
        date_time: "2026-02-02T10:00".into(),
        location_name: Some("Downtown".into()),
        service_description: None,
    };
    let decision = decide(
        Event::BookingConfirmed { appointment: appointment.clone(), order_ids: vec!["O1".into()] },
        &convo,
        &config,
        &safety,
        Utc::now(),
    );
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::Confirmed);
    assert!(convo.booking_request_sent_at.is_none());
    assert!(convo.completed_at.is_some());
    assert_eq!(convo.order_data.appointment.as_ref().unwrap().appointment_id, "A1");
    let (msg_type, body) = find_sms(&decision.effects).unwrap();
    assert_eq!(*msg_type, MessageType::BookingConfirmed);
    assert!(body.contains("F1"));
}

#[test]
fn scenario_b_consolidation_while_consent_pending() {
    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    let mut convo = new_conversation(outcome.state, outcome.order_data);

    let append = ingest_order_for_existing(order("O2", "CT", vec![]), convo.state, &convo.order_data);
    let (msg_type, body) = find_sms(&append.effects).unwrap();
    assert_eq!(*msg_type, MessageType::ConsentPrompted);
    assert!(body.contains("2 upcoming imaging appointments"));
    apply_patch(&mut convo, &append.patch);
    assert_eq!(convo.order_data.pending_orders.len(), 1);

    let config = session_config();
    let safety = NoopSafetyCheck;
    let decision = decide(Event::InboundSms { body: "YES".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::ChoosingLocation);
}

#[test]
fn scenario_c_order_arrives_mid_flow_and_is_aggregated_at_booking() {
    let config = session_config();
    let safety = NoopSafetyCheck;

    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    let mut convo = new_conversation(outcome.state, outcome.order_data);

    let decision = decide(Event::InboundSms { body: "YES".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    let decision = decide(Event::InboundSms { body: "1".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::ChoosingTime);

    // A third order for the same phone/modality arrives mid-flow.
    let append = ingest_order_for_existing(order("O3", "XR", vec![]), convo.state, &convo.order_data);
    assert!(append.effects.is_empty(), "mid-flow consolidation must not interrupt with SMS");
    apply_patch(&mut convo, &append.patch);
    assert_eq!(convo.order_data.pending_orders.len(), 1);

    let slots = vec![Slot { slot_id: "S1".into(), start_at: "2026-02-02T09:00".into(), duration_minutes: 30, resource_id: None }];
    let decision = decide(Event::SlotsReturned { slots }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);

    let decision = decide(Event::InboundSms { body: "1".into() }, &convo, &config, &safety, Utc::now());
    let booking = decision.effects.iter().find_map(|e| match e {
        Effect::IssueBookingRequest { order_ids, .. } => Some(order_ids.clone()),
        _ => None,
    });
    let mut order_ids = booking.expect("booking issued");
    order_ids.sort();
    assert_eq!(order_ids, vec!["O1".to_string(), "O3".to_string()]);
}

#[test]
fn scenario_d_slot_request_timeout_then_recovery() {
    let config = session_config();
    let safety = NoopSafetyCheck;

    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    let mut convo = new_conversation(outcome.state, outcome.order_data);
    let decision = decide(Event::InboundSms { body: "YES".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    let decision = decide(Event::InboundSms { body: "1".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.slot_retry_count, 0);

    // Timeout: no callback arrived within the SLA.
    let decision = decide(Event::SlotRequestTimeout { retries_exhausted: false }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.slot_retry_count, 1);
    assert!(matches!(decision.effects[0], Effect::IssueSlotRequest { .. }));

    // The IE now responds successfully.
    let slots = vec![Slot { slot_id: "S1".into(), start_at: "2026-02-02T09:00".into(), duration_minutes: 30, resource_id: None }];
    let decision = decide(Event::SlotsReturned { slots }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert!(convo.slot_request_sent_at.is_none());
    let offers: Vec<_> = decision
        .effects
        .iter()
        .filter(|e| matches!(e, Effect::SendSms { message_type: MessageType::SlotsOffered, .. }))
        .collect();
    assert_eq!(offers.len(), 1, "no duplicate slot-options SMS");
}

#[test]
fn scenario_e_no_slots_available_reopens_location_choice() {
    let config = session_config();
    let safety = NoopSafetyCheck;

    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    let mut convo = new_conversation(outcome.state, outcome.order_data);
    let decision = decide(Event::InboundSms { body: "YES".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    let decision = decide(Event::InboundSms { body: "1".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);

    let decision = decide(Event::SlotsEmpty, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::ChoosingLocation);
    let (msg_type, body) = find_sms(&decision.effects).unwrap();
    assert_eq!(*msg_type, MessageType::LocationPrompted);
    assert!(body.contains("No availability at Downtown"));
    assert!(body.contains("1) Downtown"));
}

#[test]
fn scenario_f_opt_out_at_any_non_terminal_state() {
    let config = session_config();
    let safety = NoopSafetyCheck;

    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    let mut convo = new_conversation(outcome.state, outcome.order_data);
    let decision = decide(Event::InboundSms { body: "YES".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    let decision = decide(Event::InboundSms { body: "1".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::ChoosingTime);

    let decision = decide(Event::InboundSms { body: "STOP".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::Cancelled);
    assert!(convo.completed_at.is_some());
    assert_eq!(decision.effects.len(), 2);
    assert!(decision.effects.iter().any(|e| matches!(e, Effect::RecordConsentRevoke)));
    let (msg_type, _) = find_sms(&decision.effects).unwrap();
    assert_eq!(*msg_type, MessageType::OptOut);
}

#[test]
fn invariant_unrecognized_replies_cancel_after_three_strikes() {
    let config = session_config();
    let safety = NoopSafetyCheck;
    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    let mut convo = new_conversation(outcome.state, outcome.order_data);
    let decision = decide(Event::InboundSms { body: "YES".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::ChoosingLocation);

    for expected_count in 1..=2 {
        let decision = decide(Event::InboundSms { body: "banana".into() }, &convo, &config, &safety, Utc::now());
        apply_patch(&mut convo, &decision.patch);
        assert_eq!(convo.unrecognized_replies, expected_count);
        assert_ne!(convo.state, State::Cancelled);
    }

    let decision = decide(Event::InboundSms { body: "banana".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::Cancelled);
    let (_, body) = find_sms(&decision.effects).unwrap();
    assert!(body.contains("please call"));
}

#[test]
fn invariant_booking_replay_with_same_appointment_id_is_a_no_op() {
    let config = session_config();
    let safety = NoopSafetyCheck;

    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    let mut convo = new_conversation(outcome.state, outcome.order_data);
    let decision = decide(Event::InboundSms { body: "YES".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    let decision = decide(Event::InboundSms { body: "1".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    let slots = vec![Slot { slot_id: "S1".into(), start_at: "2026-02-02T09:00".into(), duration_minutes: 30, resource_id: None }];
    let decision = decide(Event::SlotsReturned { slots }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    let decision = decide(Event::InboundSms { body: "1".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);

    let appointment = Appointment {
        appointment_id: "A1".into(),
        filler_appointment_id: Some("F1".into()),
        status: "booked".into(),
        date_time: "2026-02-02T09:00".into(),
        location_name: Some("Downtown".into()),
        service_description: None,
    };
    let decision = decide(
        Event::BookingConfirmed { appointment: appointment.clone(), order_ids: vec!["O1".into()] },
        &convo,
        &config,
        &safety,
        Utc::now(),
    );
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.state, State::Confirmed);

    // Replaying the same appointment-notification callback must be a no-op.
    let decision = decide(
        Event::BookingConfirmed { appointment, order_ids: vec!["O1".into()] },
        &convo,
        &config,
        &safety,
        Utc::now(),
    );
    assert!(decision.effects.is_empty());
    assert!(decision.patch.next_state.is_none());
}

#[test]
fn invariant_boundary_digit_out_of_range_increments_unrecognized_and_reprompts() {
    let config = session_config();
    let safety = NoopSafetyCheck;
    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    let mut convo = new_conversation(outcome.state, outcome.order_data);
    let decision = decide(Event::InboundSms { body: "YES".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);

    let decision = decide(Event::InboundSms { body: "9".into() }, &convo, &config, &safety, Utc::now());
    apply_patch(&mut convo, &decision.patch);
    assert_eq!(convo.unrecognized_replies, 1);
    assert_eq!(convo.state, State::ChoosingLocation);
    let (msg_type, body) = find_sms(&decision.effects).unwrap();
    assert_eq!(*msg_type, MessageType::LocationPrompted);
    assert!(body.starts_with("Sorry"));
}

#[test]
fn invariant_order_replay_does_not_duplicate_pending_orders() {
    let outcome = ingest_new_order(order("O1", "XR", downtown_and_north()), false);
    let convo = new_conversation(outcome.state, outcome.order_data);

    let first = ingest_order_for_existing(order("O2", "CT", vec![]), convo.state, &convo.order_data);
    let mut convo2 = convo;
    apply_patch(&mut convo2, &first.patch);

    let replay = ingest_order_for_existing(order("O2", "CT", vec![]), convo2.state, &convo2.order_data);
    assert!(replay.effects.is_empty());
    assert!(replay.patch.order_data.is_none());
    assert_eq!(convo2.order_data.pending_orders.len(), 1);
}
