use base64::Engine;

use crate::error::CryptoError;

/// Raw 256-bit key material, loaded once from the environment at process
/// start and held for the process lifetime. There is no rotation or
/// persistence of key material in this crate; key rotation is an
/// operational procedure (re-deploy with a new key).
#[derive(Clone)]
pub struct KeyMaterial(pub(crate) [u8; 32]);

impl KeyMaterial {
    /// Decode a base64-encoded 32-byte key, e.g. from `PHONE_HASH_KEY` or
    /// `PHONE_ENCRYPTION_KEY`.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_keys() {
        let err = KeyMaterial::from_bytes(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyLength(16)));
    }

    #[test]
    fn round_trips_through_base64() {
        let raw = [7u8; 32];
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        let km = KeyMaterial::from_base64(&encoded).unwrap();
        assert_eq!(km.as_bytes(), &raw);
    }

    #[test]
    fn debug_never_prints_key_bytes() {
        let km = KeyMaterial::from_bytes(&[9u8; 32]).unwrap();
        assert_eq!(format!("{:?}", km), "KeyMaterial(<redacted>)");
    }
}
