//! Envelope encryption for relay messages
//!
//! A message is padded to a 64-byte boundary, then sealed with a NaCl box
//! (X25519 + XSalsa20-Poly1305) under a one-time ephemeral keypair and a
//! one-time nonce. The resulting [`EncryptedEnvelope`] carries everything
//! the recipient needs to decrypt, each binary field as standard base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::{
    aead::{Aead, AeadCore},
    Nonce, PublicKey, SalsaBox, SecretKey,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{CryptoError, Result};

/// The one supported algorithm suite tag
pub const ASYNC_ENC_ALGORITHM: &str = "x25519-xsalsa20-poly1305";

/// Messages are padded to a multiple of this many bytes before encryption
pub const BLOCK_SIZE: usize = 64;

/// Padding byte appended to messages; NUL cannot terminate legitimate text
pub const PAD_BYTE: u8 = 0;

const NONCE_LENGTH: usize = 24;
const KEY_LENGTH: usize = 32;

/// An encrypted message as exchanged over the relay.
///
/// Immutable once constructed. Every envelope carries a fresh nonce and a
/// fresh ephemeral public key; two encryptions of the same plaintext are
/// unlinkable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Algorithm suite tag, always [`ASYNC_ENC_ALGORITHM`]
    pub version: String,
    /// One-time nonce, base64
    pub nonce: String,
    /// Sender's one-time public key, base64
    #[serde(rename = "ephemPublicKey", alias = "ephemeralPublicKey")]
    pub ephem_public_key: String,
    /// Encrypted, authenticated payload, base64
    pub ciphertext: String,
}

/// A relay payload that may or may not be encrypted.
///
/// Responders are free to post either an [`EncryptedEnvelope`] or a bare
/// string; a JSON object deserializes as `Encrypted`, a string as `Plain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaybeEncrypted {
    Encrypted(EncryptedEnvelope),
    Plain(String),
}

/// Pad a message with [`PAD_BYTE`] up to the next [`BLOCK_SIZE`] boundary.
///
/// A message whose length is already a multiple of the block size gains no
/// padding, so its exact length survives encryption. That length leak is a
/// property of the wire format and is preserved as-is.
pub fn pad(message: &str) -> Vec<u8> {
    let mut padded = message.as_bytes().to_vec();
    padded.resize(message.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, PAD_BYTE);
    padded
}

/// Strip trailing [`PAD_BYTE`]s from a decrypted message.
///
/// Lossy for plaintext that genuinely ends in NUL: those bytes are
/// indistinguishable from padding and are stripped with it.
pub fn unpad(padded: &[u8]) -> &[u8] {
    let end = padded
        .iter()
        .rposition(|&b| b != PAD_BYTE)
        .map_or(0, |i| i + 1);
    &padded[..end]
}

/// Encrypt a message for a recipient.
///
/// Generates a one-time keypair and nonce, pads the message to a 64-byte
/// boundary, and seals it with a NaCl box (sender ephemeral secret +
/// recipient public key).
pub fn encrypt_message(message: &str, recipient_public: &PublicKey) -> Result<EncryptedEnvelope> {
    encrypt_message_with_rng(&mut OsRng, message, recipient_public)
}

/// Encrypt with an injected randomness source, for deterministic tests
pub fn encrypt_message_with_rng(
    rng: &mut (impl CryptoRng + RngCore),
    message: &str,
    recipient_public: &PublicKey,
) -> Result<EncryptedEnvelope> {
    let ephemeral_secret = SecretKey::generate(rng);
    let ephemeral_public = ephemeral_secret.public_key();
    let nonce = SalsaBox::generate_nonce(rng);

    let padded = pad(message);
    let ciphertext = SalsaBox::new(recipient_public, &ephemeral_secret)
        .encrypt(&nonce, padded.as_slice())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok(EncryptedEnvelope {
        version: ASYNC_ENC_ALGORITHM.to_string(),
        nonce: STANDARD.encode(nonce),
        ephem_public_key: STANDARD.encode(ephemeral_public.as_bytes()),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Decrypt an envelope with the recipient's secret key.
///
/// The secret key is optional state on the caller's side; passing `None`
/// fails with [`CryptoError::MissingSecretKey`]. An authentication failure
/// (wrong key, tampered ciphertext, wrong nonce) is always surfaced as
/// [`CryptoError::DecryptionFailed`], never as garbled plaintext.
pub fn decrypt_message(
    envelope: &EncryptedEnvelope,
    secret_key: Option<&SecretKey>,
) -> Result<String> {
    let secret_key = secret_key.ok_or(CryptoError::MissingSecretKey)?;

    if envelope.version != ASYNC_ENC_ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(envelope.version.clone()));
    }
    if envelope.ciphertext.is_empty() {
        return Err(CryptoError::MalformedEnvelope("ciphertext"));
    }
    if envelope.nonce.is_empty() {
        return Err(CryptoError::MalformedEnvelope("nonce"));
    }
    if envelope.ephem_public_key.is_empty() {
        return Err(CryptoError::MalformedEnvelope("ephemPublicKey"));
    }

    let ciphertext = STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|_| CryptoError::InvalidEncoding("ciphertext"))?;
    let nonce_bytes = STANDARD
        .decode(&envelope.nonce)
        .map_err(|_| CryptoError::InvalidEncoding("nonce"))?;
    let ephem_bytes = STANDARD
        .decode(&envelope.ephem_public_key)
        .map_err(|_| CryptoError::InvalidEncoding("ephemPublicKey"))?;

    if nonce_bytes.len() != NONCE_LENGTH {
        return Err(CryptoError::MalformedEnvelope("nonce"));
    }
    let ephem_bytes: [u8; KEY_LENGTH] = ephem_bytes
        .try_into()
        .map_err(|_| CryptoError::MalformedEnvelope("ephemPublicKey"))?;

    let nonce = Nonce::clone_from_slice(&nonce_bytes);
    let ephem_public = PublicKey::from(ephem_bytes);

    let padded = SalsaBox::new(&ephem_public, secret_key)
        .decrypt(&nonce, ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(unpad(&padded).to_vec()).map_err(|_| CryptoError::InvalidUtf8)
}

/// Decrypt a relay payload that may or may not be encrypted.
///
/// Envelopes are decrypted; plain strings pass through untouched. Intended
/// for callers consuming relay responses without knowing the responder's
/// choice in advance.
pub fn decrypt_response(value: MaybeEncrypted, secret_key: Option<&SecretKey>) -> Result<String> {
    match value {
        MaybeEncrypted::Encrypted(envelope) => decrypt_message(&envelope, secret_key),
        MaybeEncrypted::Plain(text) => Ok(text),
    }
}
