//! Content-derived artifact keys.

use md5::{Digest, Md5};

/// Number of hex characters kept from the digest.
pub const KEY_HEX_LEN: usize = 12;

/// Prefix used for tutor audio assets (`tutor_<hash>.mp3`).
pub const DEFAULT_KEY_PREFIX: &str = "tutor_";

/// Derive the artifact key for a concrete text.
///
/// The key is `prefix` followed by the first [`KEY_HEX_LEN`] hex characters of
/// the MD5 digest of the text's UTF-8 bytes. Identical text always yields the
/// identical key.
pub fn derive_key(text: &str, prefix: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    let mut key = String::with_capacity(prefix.len() + KEY_HEX_LEN);
    key.push_str(prefix);
    for byte in digest.iter().take(KEY_HEX_LEN / 2) {
        key.push_str(&format!("{byte:02x}"));
    }
    key
}

/// Derive the key using [`DEFAULT_KEY_PREFIX`].
pub fn derive(text: &str) -> String {
    derive_key(text, DEFAULT_KEY_PREFIX)
}
