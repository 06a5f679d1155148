//! Courier Relay Transport
//!
//! Single-shot request/response exchange through an untrusted relay.
//!
//! ## Lifecycle
//!
//! 1. Build an unguessable callback location on the relay
//! 2. Hand the caller's URI handler the request, augmented with a `post`
//!    delivery marker
//! 3. Poll the callback location until a payload, a relay-reported error,
//!    or a cancellation
//! 4. Scrub the relay entry once the response is consumed
//!
//! The relay only ever sees ciphertext; encryption lives in
//! `courier-crypto`. How the request URI reaches the responding party (QR
//! code, deep link) is the URI handler's business, not this crate's.

mod callback;
mod error;
mod poll;
mod send;

pub use callback::{gen_callback, ExtractCallback, DEFAULT_RELAY_URL};
pub use error::{Result, TransportError};
pub use poll::{clear_response, poll, CancelHandle, PollOutcome};
pub use send::{
    PollHandle, RelayConfig, RelayTransport, UriHandler, DEFAULT_POLLING_INTERVAL,
};
