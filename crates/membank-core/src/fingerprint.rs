//! Content fingerprint (ETag) used for optimistic-concurrency preconditions.
//!
//! The teacher never hashes pad content for concurrency control (padz has no
//! multi-writer story); this is enriched from `liamw1-oxibooru`'s use of the
//! `sha2` crate for content fingerprints.

use sha2::{Digest, Sha256};

/// Computes `W/"<sha256-hex>"` over `bytes`. Weak (`W/`) because the ETag is
/// a content hash, not a strong byte-for-byte identity guarantee beyond that
/// hash's collision resistance — callers must treat it as opaque.
pub fn etag(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    format!("W/\"{}\"", hex_lower(&digest))
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_deterministic() {
        assert_eq!(etag(b"hello"), etag(b"hello"));
    }

    #[test]
    fn etag_differs_for_different_content() {
        assert_ne!(etag(b"hello"), etag(b"world"));
    }

    #[test]
    fn etag_has_weak_prefix_and_quoted_hex() {
        let tag = etag(b"");
        assert!(tag.starts_with("W/\""));
        assert!(tag.ends_with('"'));
        // sha256 of empty input, 64 lowercase hex chars
        assert_eq!(
            tag,
            "W/\"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\""
        );
    }

    #[test]
    fn etag_is_lowercase_hex_no_truncation() {
        let tag = etag(b"some content");
        let hex_part = tag.trim_start_matches("W/\"").trim_end_matches('"');
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
