//! PHI-safe scrubbing for anything that might end up in a `tracing` event or
//! an error message.
//!
//! The domain's `AuditEntry` (see `radsched-core::audit`) is constructed with
//! no PHI-bearing fields to begin with, so it needs no scrubbing. This module
//! exists for the places where PHI *could* otherwise leak: a `tracing::error!`
//! logging a failed webhook body, a panic message, a debug print during
//! incident response. Every such call site should scrub first.

use serde_json::Value;

/// Replacement string used for all masked values.
pub const REDACTED: &str = "[REDACTED]";

/// Mask an E.164 phone number for diagnostic logging, keeping only the last
/// four digits — enough to correlate with a patient on the phone without
/// writing the full number to a log aggregator.
///
/// ```
/// use radsched_audit::pii_scrubber::scrub_phone;
/// assert_eq!(scrub_phone("+15551234567"), "***4567");
/// ```
pub fn scrub_phone(e164: &str) -> String {
    let digits: String = e164.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return REDACTED.to_string();
    }
    format!("***{}", &digits[digits.len() - 4..])
}

/// Inbound/outbound SMS bodies are free text and may echo back a patient
/// name, MRN, or other PHI a patient typed — always fully redacted in logs.
pub fn scrub_message_body(_body: &str) -> &'static str {
    REDACTED
}

/// `patient_context` (see `radsched_core::Order::patient_context`) is an
/// opaque JSON blob the engine never interprets. Logging it verbatim for
/// debugging would leak whatever the ordering system put there, so every
/// string leaf is replaced while the shape (keys, array lengths, number/bool
/// leaves) is preserved — useful for diagnosing a malformed payload without
/// exposing its contents.
pub fn scrub_patient_context(value: &Value) -> Value {
    match value {
        Value::String(_) => Value::String(REDACTED.to_string()),
        Value::Array(items) => Value::Array(items.iter().map(scrub_patient_context).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), scrub_patient_context(v))).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scrub_phone_keeps_last_four_digits() {
        assert_eq!(scrub_phone("+15551234567"), "***4567");
    }

    #[test]
    fn scrub_phone_redacts_too_short_input() {
        assert_eq!(scrub_phone("12"), REDACTED);
    }

    #[test]
    fn scrub_message_body_always_redacts() {
        assert_eq!(scrub_message_body("my name is John Smith, DOB 1/1/1980"), REDACTED);
    }

    #[test]
    fn scrub_patient_context_preserves_shape_but_redacts_strings() {
        let ctx = json!({
            "referring_physician": "Dr. Jane Doe",
            "risk_score": 3,
            "flags": ["pregnant", "contrast_allergy"],
            "cleared": true,
        });
        let scrubbed = scrub_patient_context(&ctx);
        assert_eq!(scrubbed["referring_physician"], REDACTED);
        assert_eq!(scrubbed["risk_score"], 3);
        assert_eq!(scrubbed["cleared"], true);
        assert_eq!(scrubbed["flags"][0], REDACTED);
        assert_eq!(scrubbed["flags"][1], REDACTED);
    }
}
