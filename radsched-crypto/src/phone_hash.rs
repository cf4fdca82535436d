use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::key_material::KeyMaterial;

type HmacSha256 = Hmac<Sha256>;

/// Derive the deterministic, non-reversible lookup key for a phone number.
/// Same number + same key always yields the same hash, which is what lets
/// the store find "the active conversation for this phone number" without
/// ever storing the number itself in a queryable column.
///
/// `phone` must already be normalized to E.164 — this function does not
/// normalize, since normalization is locale-aware and belongs at the
/// inbound edge.
pub fn phone_hash(key: &KeyMaterial, phone_e164: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(phone_e164.as_bytes());
    let tag = mac.finalize().into_bytes();
    hex::encode(tag)
}

/// Constant-time equality check, for callers comparing a freshly-derived
/// hash against a stored one outside of a database `WHERE` clause (e.g. in
/// provider webhook signature cross-checks).
pub fn hashes_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> KeyMaterial {
        KeyMaterial::from_bytes(&[1u8; 32]).unwrap()
    }

    #[test]
    fn same_number_same_key_is_deterministic() {
        let h1 = phone_hash(&key(), "+15551234567");
        let h2 = phone_hash(&key(), "+15551234567");
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_numbers_hash_differently() {
        let h1 = phone_hash(&key(), "+15551234567");
        let h2 = phone_hash(&key(), "+15551234568");
        assert_ne!(h1, h2);
    }

    #[test]
    fn different_keys_hash_the_same_number_differently() {
        let other_key = KeyMaterial::from_bytes(&[2u8; 32]).unwrap();
        let h1 = phone_hash(&key(), "+15551234567");
        let h2 = phone_hash(&other_key, "+15551234567");
        assert_ne!(h1, h2);
    }

    #[test]
    fn hash_is_not_reversible_in_practice() {
        let h = phone_hash(&key(), "+15551234567");
        assert!(!h.contains('+'));
        assert_eq!(h.len(), 64); // hex-encoded SHA-256 digest
    }

    #[test]
    fn hashes_equal_matches_identical_strings() {
        let h = phone_hash(&key(), "+15551234567");
        assert!(hashes_equal(&h, &h));
        assert!(!hashes_equal(&h, "0".repeat(64).as_str()));
    }
}
