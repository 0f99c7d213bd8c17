//! Cache-key derivation for stage descriptors.
//!
//! Short descriptors (order keys, limit windows) are embedded literally in the
//! working-file name after normalization. Unbounded descriptors (aggregate
//! mappings) are reduced to a fixed-width content digest.

use crate::constants::cache_key::{DIGEST_HEX_LEN, KEY_JOINER};
use crate::hash::stable_hash_str;
use crate::types::CacheToken;

/// Normalize literal descriptor parts into one filesystem-safe token.
///
/// Parts are joined with `_`; whitespace becomes `_`, commas are stripped, and
/// anything outside `[A-Za-z0-9_]` is dropped so the token stays a valid path
/// component on every platform.
pub fn literal_token<I, S>(parts: I) -> CacheToken
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut token = String::new();
    for (idx, part) in parts.into_iter().enumerate() {
        if idx > 0 {
            token.push(KEY_JOINER);
        }
        for ch in part.as_ref().chars() {
            if ch.is_whitespace() {
                token.push(KEY_JOINER);
            } else if ch.is_ascii_alphanumeric() || ch == KEY_JOINER {
                token.push(ch);
            }
        }
    }
    token
}

/// Digest a canonical serialization into a fixed-width hex token.
pub fn digest_token(canonical: &str) -> CacheToken {
    let digest = format!("{:016x}", stable_hash_str(canonical));
    digest[..DIGEST_HEX_LEN].to_string()
}
