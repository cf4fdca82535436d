use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PhoneHash;

/// How consent was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentMethod {
    /// Patient replied YES to the consent prompt.
    SmsReply,
    /// Consent was recorded out-of-band (e.g. at intake) and forwarded
    /// with the order.
    Prior,
}

/// A durable consent record keyed by phone hash, independent of any single
/// conversation — consent survives conversation expiry and is re-checked on
/// every subsequent order for the same number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
    pub phone_hash: PhoneHash,
    pub organization_id: String,
    pub granted: bool,
    pub method: ConsentMethod,
    pub granted_at: DateTime<Utc>,

    /// Set when the patient opts out (STOP). A revoked consent blocks all
    /// future sends until a fresh grant; treats STOP as
    /// permanent until the patient re-initiates.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Consent {
    pub fn granted(
        phone_hash: PhoneHash,
        organization_id: impl Into<String>,
        method: ConsentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            phone_hash,
            organization_id: organization_id.into(),
            granted: true,
            method,
            granted_at: now,
            revoked_at: None,
        }
    }

    /// Whether outbound sends are currently permitted for this recipient.
    pub fn is_active(&self) -> bool {
        self.granted && self.revoked_at.is_none()
    }

    pub fn revoke(&mut self, now: DateTime<Utc>) {
        self.granted = false;
        self.revoked_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_consent_is_active() {
        let c = Consent::granted(
            PhoneHash("h1".into()),
            "org1",
            ConsentMethod::SmsReply,
            Utc::now(),
        );
        assert!(c.is_active());
    }

    #[test]
    fn revoked_consent_is_not_active() {
        let mut c = Consent::granted(
            PhoneHash("h1".into()),
            "org1",
            ConsentMethod::Prior,
            Utc::now(),
        );
        c.revoke(Utc::now());
        assert!(!c.is_active());
        assert!(!c.granted);
        assert!(c.revoked_at.is_some());
    }
}
