//! Courier Cryptography
//!
//! Authenticated encryption for single-shot relay messages. A message is
//! padded to a 64-byte boundary, sealed with a NaCl box (X25519 key
//! agreement + XSalsa20-Poly1305) under a fresh ephemeral keypair, and
//! carried as base64 fields in an [`EncryptedEnvelope`]. Also provides the
//! URL-safe random-string generator used for unguessable relay tokens.

mod envelope;
mod error;
mod keys;
mod random;

pub use envelope::*;
pub use error::*;
pub use keys::*;
pub use random::*;

pub use crypto_box::{PublicKey, SecretKey};
