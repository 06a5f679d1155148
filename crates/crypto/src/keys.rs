use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::{CryptoError, Result};

/// Keypair for NaCl box encryption (X25519)
#[derive(Clone)]
pub struct EncryptionKeypair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl EncryptionKeypair {
    /// Generate a new random encryption keypair
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generate a keypair from the given randomness source
    pub fn generate_with_rng(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        let secret = SecretKey::generate(rng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Create from raw secret key bytes
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        let secret = SecretKey::from(*secret);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Get the public key as bytes
    pub fn public_key_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Get the public key as a base64 string, the form exchanged with peers
    pub fn public_key_base64(&self) -> String {
        encode_public_key(&self.public)
    }

    /// Get the secret key as bytes
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

/// Encode a public key as standard base64
pub fn encode_public_key(public: &PublicKey) -> String {
    STANDARD.encode(public.as_bytes())
}

/// Decode a standard-base64 public key as exchanged with peers
pub fn decode_public_key(encoded: &str) -> Result<PublicKey> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::InvalidEncoding("public key"))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(PublicKey::from(bytes))
}
