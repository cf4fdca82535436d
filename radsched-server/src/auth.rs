use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Verifies `POST /orders/webhook` : either a bearer token
/// equal to `secret`, or an `X-Webhook-Signature` header holding
/// `hex(hmac_sha256(raw_body, secret))`.
pub fn verify_order_webhook(bearer: Option<&str>, signature_header: Option<&str>, raw_body: &[u8], secret: &str) -> bool {
    if let Some(token) = bearer {
        return constant_time_str_eq(token, secret);
    }

    if let Some(sig) = signature_header {
        return verify_hmac_sha256_hex(raw_body, secret.as_bytes(), sig);
    }

    false
}

/// Verifies both HL7 callback webhooks, which describes as
/// bearer-token-only.
pub fn verify_bearer(bearer: Option<&str>, expected: &str) -> bool {
    match bearer {
        Some(token) => constant_time_str_eq(token, expected),
        None => false,
    }
}

/// Verifies a Twilio-style inbound SMS webhook: `base64(hmac_sha1(url +
/// sorted_form_params_concatenated, auth_token))`, compared against the
/// provider's signature header. Other providers sign similarly over their
/// own canonical string; callers pass in whatever `signed_payload` their
/// provider's scheme dictates.
pub fn verify_sms_signature(signed_payload: &[u8], secret: &str, signature_b64: &str) -> bool {
    let mut mac = match Hmac::<Sha1>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(signed_payload);
    let computed = mac.finalize().into_bytes();

    let Ok(provided) = base64_decode(signature_b64) else {
        return false;
    };

    computed.len() == provided.len() && bool::from(computed.as_slice().ct_eq(&provided))
}

fn verify_hmac_sha256_hex(body: &[u8], secret: &[u8], signature_hex: &str) -> bool {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();
    let computed_hex = hex::encode(computed);
    constant_time_str_eq(&computed_hex, signature_hex)
}

fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

fn base64_decode(s: &str) -> Result<Vec<u8>, ()> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.decode(s).map_err(|_| ())
}

/// Builds the canonical string Twilio signs: request URL followed by each
/// POST parameter's key and value, sorted and concatenated with no
/// separator (Twilio's `X-Twilio-Signature` algorithm).
pub fn twilio_signed_payload(full_url: &str, params: &[(String, String)]) -> Vec<u8> {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let mut payload = full_url.to_string();
    for (k, v) in sorted {
        payload.push_str(&k);
        payload.push_str(&v);
    }
    payload.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_webhook_bearer_matches_secret() {
        assert!(verify_order_webhook(Some("abc123"), None, b"{}", "abc123"));
        assert!(!verify_order_webhook(Some("wrong"), None, b"{}", "abc123"));
    }

    #[test]
    fn order_webhook_hmac_signature_round_trips() {
        let secret = "order-secret";
        let body = br#"{"orderId":"o1"}"#;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(verify_order_webhook(None, Some(&sig), body, secret));
        assert!(!verify_order_webhook(None, Some("deadbeef"), body, secret));
    }

    #[test]
    fn bearer_rejects_missing_header() {
        assert!(!verify_bearer(None, "token"));
    }

    #[test]
    fn twilio_payload_sorts_params() {
        let payload = twilio_signed_payload(
            "https://example.com/sms/webhook/org1",
            &[("Body".to_string(), "YES".to_string()), ("From".to_string(), "+15551234567".to_string())],
        );
        assert_eq!(payload, b"https://example.com/sms/webhook/org1BodyYESFrom+15551234567");
    }
}
