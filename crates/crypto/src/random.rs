use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;

/// Produce a URL-safe string encoding `length` bytes of OS randomness.
///
/// Used for relay callback tokens, which must be unguessable; no two calls
/// may be assumed related.
pub fn random_string(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_string_is_url_safe() {
        let token = random_string(16);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_random_string_encodes_requested_byte_count() {
        // 16 bytes -> 22 base64 characters without padding
        assert_eq!(random_string(16).len(), 22);
        assert_eq!(random_string(0).len(), 0);
    }

    #[test]
    fn test_random_string_does_not_repeat() {
        // Statistical sanity, not a proof
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(random_string(16)));
        }
    }
}
