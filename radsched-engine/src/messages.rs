use radsched_core::{Appointment, Location, Slot};

/// Patient-facing message templates, centralized so every call site that
/// needs to re-send a prompt (first send, re-prompt after consolidation,
/// re-prompt after an unrecognized reply) produces identical wording.
pub const PATIENT_CALL_MESSAGE: &str =
    "We're unable to complete this by text right now, please call our scheduling line.";

pub fn consent_prompt(order_count: usize) -> String {
    if order_count <= 1 {
        "Reply YES to schedule your upcoming imaging appointment by text, or STOP to opt out.".to_string()
    } else {
        format!(
            "Reply YES to schedule your {order_count} upcoming imaging appointments by text, or STOP to opt out."
        )
    }
}

pub fn opt_out_ack() -> String {
    "You've been unsubscribed and will not receive further texts about this order. Reply YES at any time to restart.".to_string()
}

pub fn location_prompt(locations: &[Location], error_preface: bool) -> String {
    let mut body = String::new();
    if error_preface {
        body.push_str("Sorry, that wasn't a valid choice. ");
    }
    body.push_str("Choose a location: ");
    body.push_str(&format_numbered(locations.iter().map(|l| l.name.as_str())));
    body
}

pub fn no_availability_prompt(location_name: &str, locations: &[Location]) -> String {
    format!(
        "No availability at {location_name}. Choose another: {}",
        format_numbered(locations.iter().map(|l| l.name.as_str()))
    )
}

pub fn searching_message(location_name: &str) -> String {
    format!("Searching for times at {location_name}...")
}

pub fn slot_prompt(slots: &[Slot]) -> String {
    format!("Choose a time: {}", format_numbered(slots.iter().map(|s| format_slot(s))))
}

fn format_slot(slot: &Slot) -> String {
    slot.start_at.clone()
}

pub fn confirmation_message(appointment: &Appointment) -> String {
    format!(
        "You're confirmed{}: {}{}. Confirmation #{}.",
        appointment
            .location_name
            .as_ref()
            .map(|n| format!(" at {n}"))
            .unwrap_or_default(),
        appointment.date_time,
        appointment
            .service_description
            .as_ref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default(),
        appointment
            .filler_appointment_id
            .as_deref()
            .unwrap_or(&appointment.appointment_id),
    )
}

pub fn unrecognized_reply_preface(current_prompt: &str) -> String {
    format!("Sorry, please reply with one of the options below.\n{current_prompt}")
}

fn format_numbered<'a>(items: impl Iterator<Item = impl AsRef<str> + 'a>) -> String {
    items
        .enumerate()
        .map(|(i, item)| format!("{}) {}", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: &str, name: &str) -> Location {
        Location { id: id.into(), name: name.into(), address: None, capabilities: None }
    }

    #[test]
    fn consent_prompt_mentions_order_count_when_plural() {
        assert!(consent_prompt(1).contains("appointment by text"));
        assert!(consent_prompt(2).contains("2 upcoming imaging appointments"));
    }

    #[test]
    fn location_prompt_numbers_each_option() {
        let locations = vec![location("L1", "Downtown"), location("L2", "North")];
        let body = location_prompt(&locations, false);
        assert!(body.contains("1) Downtown"));
        assert!(body.contains("2) North"));
        assert!(!body.starts_with("Sorry"));
    }

    #[test]
    fn location_prompt_prefaces_an_error_on_out_of_range_choice() {
        let locations = vec![location("L1", "Downtown")];
        let body = location_prompt(&locations, true);
        assert!(body.starts_with("Sorry"));
    }

    #[test]
    fn confirmation_message_includes_filler_appointment_id() {
        let appt = Appointment {
            appointment_id: "A1".into(),
            filler_appointment_id: Some("F1".into()),
            status: "booked".into(),
            date_time: "2026-02-02T10:00".into(),
            location_name: Some("Downtown".into()),
            service_description: None,
        };
        let msg = confirmation_message(&appt);
        assert!(msg.contains("F1"));
        assert!(msg.contains("2026-02-02T10:00"));
    }
}
