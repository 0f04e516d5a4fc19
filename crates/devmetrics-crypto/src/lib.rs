//! HMAC signing of metric payloads and chunked RSA-OAEP encryption of the wire envelope,
//! used by the agent/server pair when a shared key or RSA keypair is configured.

mod envelope;
mod error;
mod keys;
mod signature;

pub use envelope::{decrypt, encrypt};
pub use error::CryptoError;
pub use keys::{generate_keys, read_private_key, read_public_key, KEY_BITS};
pub use signature::{HmacSigner, Hasher, Sha256Hasher, Signer};

pub use rsa::{RsaPrivateKey, RsaPublicKey};
