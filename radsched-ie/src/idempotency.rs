use sha2::{Digest, Sha256};

/// Idempotency key for `book-appointment`, derived from `(conversation_id,
/// selected_slot.id, sorted(order_ids))`. The IE either dedups on this key or
/// the core tolerates duplicate callbacks; either way repeated calls with
/// identical inputs must collide on the same key so a retried booking never
/// creates a second appointment.
pub fn booking_idempotency_key(conversation_id: &str, slot_id: &str, order_ids: &[String]) -> String {
    let mut sorted: Vec<&str> = order_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(conversation_id.as_bytes());
    hasher.update(b"|");
    hasher.update(slot_id.as_bytes());
    hasher.update(b"|");
    hasher.update(sorted.join(",").as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic_for_the_same_inputs() {
        let k1 = booking_idempotency_key("conv1", "S2", &["O1".into(), "O3".into()]);
        let k2 = booking_idempotency_key("conv1", "S2", &["O1".into(), "O3".into()]);
        assert_eq!(k1, k2);
    }

    #[test]
    fn order_id_ordering_does_not_change_the_key() {
        let k1 = booking_idempotency_key("conv1", "S2", &["O1".into(), "O3".into()]);
        let k2 = booking_idempotency_key("conv1", "S2", &["O3".into(), "O1".into()]);
        assert_eq!(k1, k2, "sorted order_ids must produce a stable key regardless of input order");
    }

    #[test]
    fn different_slots_produce_different_keys() {
        let k1 = booking_idempotency_key("conv1", "S2", &["O1".into()]);
        let k2 = booking_idempotency_key("conv1", "S9", &["O1".into()]);
        assert_ne!(k1, k2);
    }

    #[test]
    fn different_conversations_produce_different_keys() {
        let k1 = booking_idempotency_key("conv1", "S2", &["O1".into()]);
        let k2 = booking_idempotency_key("conv2", "S2", &["O1".into()]);
        assert_ne!(k1, k2);
    }
}
