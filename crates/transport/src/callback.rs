//! Callback locations on the relay
//!
//! A callback location is the relay base address plus a high-entropy random
//! token. It is created once per outstanding request, never reused, and
//! deleted from the relay once the response is consumed.

use courier_crypto::random_string;

/// Default relay base address
pub const DEFAULT_RELAY_URL: &str = "https://chasqui.uport.me/api/v1/topic/";

/// Bytes of randomness in a callback token
const CALLBACK_TOKEN_BYTES: usize = 16;

/// Build a fresh, unguessable callback location on the given relay
pub fn gen_callback(relay_url: &str) -> String {
    format!("{relay_url}{}", random_string(CALLBACK_TOKEN_BYTES))
}

/// Extracts the callback location embedded in a request URI.
///
/// Request URIs carry their callback inside a signed token; decoding that
/// token is the business of whichever codec produced it, so the transport
/// takes the extraction as an injected capability. Returns `None` when the
/// URI carries no callback.
pub trait ExtractCallback: Send + Sync {
    fn extract(&self, request_uri: &str) -> Option<String>;
}

impl<F> ExtractCallback for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn extract(&self, request_uri: &str) -> Option<String> {
        self(request_uri)
    }
}
