//! Content-derived document identity used as the cache key.

/// Stable fingerprint of a document's cleaned text.
///
/// Same text, same fingerprint, regardless of where the bytes came from.
pub fn of(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}
