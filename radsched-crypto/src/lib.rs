pub mod error;
pub mod key_material;
pub mod phone_cipher;
pub mod phone_hash;

pub use error::CryptoError;
pub use key_material::KeyMaterial;
pub use phone_cipher::{decrypt_phone, encrypt_phone};
pub use phone_hash::{hashes_equal, phone_hash};
