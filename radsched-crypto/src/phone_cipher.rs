use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;

use crate::error::CryptoError;
use crate::key_material::KeyMaterial;

const NONCE_LEN: usize = 12;

/// Encrypt an E.164 phone number for storage, returning base64(nonce ||
/// ciphertext). The nonce is random per call and travels with the
/// ciphertext, the standard AES-GCM envelope shape.
pub fn encrypt_phone(key: &KeyMaterial, phone_e164: &str) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, phone_e164.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);

    Ok(base64::engine::general_purpose::STANDARD.encode(envelope))
}

/// Reverse [`encrypt_phone`], recovering the original E.164 number. Used
/// only where the plaintext number must be sent onward (SMS dispatch, the
/// IE), never for anything written to an audit record or log line.
pub fn decrypt_phone(key: &KeyMaterial, envelope_b64: &str) -> Result<String, CryptoError> {
    let envelope = base64::engine::general_purpose::STANDARD
        .decode(envelope_b64)
        .map_err(|e| CryptoError::InvalidCiphertextEncoding(e.to_string()))?;

    if envelope.len() < NONCE_LEN {
        return Err(CryptoError::DecryptionFailed);
    }
    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> KeyMaterial {
        KeyMaterial::from_bytes(&[3u8; 32]).unwrap()
    }

    #[test]
    fn round_trips() {
        let enc = encrypt_phone(&key(), "+15551234567").unwrap();
        let dec = decrypt_phone(&key(), &enc).unwrap();
        assert_eq!(dec, "+15551234567");
    }

    #[test]
    fn two_encryptions_of_the_same_number_differ() {
        let e1 = encrypt_phone(&key(), "+15551234567").unwrap();
        let e2 = encrypt_phone(&key(), "+15551234567").unwrap();
        assert_ne!(e1, e2, "random nonce must prevent ciphertext reuse");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let enc = encrypt_phone(&key(), "+15551234567").unwrap();
        let wrong_key = KeyMaterial::from_bytes(&[4u8; 32]).unwrap();
        assert!(decrypt_phone(&wrong_key, &enc).is_err());
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        let key = key();
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 4]);
        assert!(decrypt_phone(&key, &short).is_err());
    }

    #[test]
    fn garbage_base64_is_rejected() {
        assert!(decrypt_phone(&key(), "not base64!!!").is_err());
    }
}
