//! Short opaque identifiers for conversations and turns.
//!
//! Conversation identifiers are 10 base62 characters derived from UUID v4
//! random bytes — short enough for URLs, random enough that a client-proposed
//! identifier colliding with an existing record is not a practical concern.

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of a generated conversation identifier.
pub const SHORT_ID_LEN: usize = 10;

/// Generate a short base62 identifier.
pub fn short_id() -> String {
    let bytes = *uuid::Uuid::new_v4().as_bytes();
    bytes
        .iter()
        .take(SHORT_ID_LEN)
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect()
}

/// Generate a full-length opaque identifier (used for turn rows).
pub fn long_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
