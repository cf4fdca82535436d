use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("key material must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("key material is not valid base64: {0}")]
    InvalidKeyEncoding(String),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: ciphertext invalid, truncated, or key mismatch")]
    DecryptionFailed,

    #[error("ciphertext is not valid base64: {0}")]
    InvalidCiphertextEncoding(String),
}
