use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque conversation identifier. Wrapping `Uuid` in a newtype, rather than
/// passing bare `Uuid`s around, keeps a conversation id from being mixed up
/// with any other identifier at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic, non-reversible lookup key derived from a phone number.
/// Safe to log and to use as an audit/analytics join key. See
/// `radsched-crypto` for derivation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneHash(pub String);

impl fmt::Display for PhoneHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reversible ciphertext of an E.164 phone number. Never logged, never
/// serialized into an audit entry.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneEncrypted(pub String);

impl fmt::Debug for PhoneEncrypted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhoneEncrypted(<redacted>)")
    }
}
