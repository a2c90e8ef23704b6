// src/key.rs
// =============================================================================
// Content-address keys for pages.
//
// Every page is identified by a PageKey: the SHA-256 digest of its normalized
// URL, hex encoded. The same key names the record file on disk and is the
// token we check before fetching, so listing the data directory is enough to
// know which pages a previous run already stored.
//
// Normalization only strips the fragment and lets the `url` crate canonicalize
// scheme/host casing, so `/wiki/Rust#History` and `/wiki/Rust` are one page.
// =============================================================================

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Hex-encoded SHA-256 of a normalized URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(String);

// Length of a hex-encoded SHA-256 digest
const KEY_LEN: usize = 64;

impl PageKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Rebuilds a key from a record's file stem.
    // Anything that is not 64 lowercase hex characters is rejected, which keeps
    // temp files and foreign files out of the registry.
    pub fn from_hex(s: &str) -> Option<PageKey> {
        let valid = s.len() == KEY_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| PageKey(s.to_string()))
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Normalizes a URL for Visited membership and key derivation
//
// Returns None for anything that is not an absolute http(s) URL.
pub fn normalize_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    parsed.set_fragment(None);
    Some(parsed.to_string())
}

// Derives the PageKey for a URL
//
// Pure and stable across runs. Strings that are not valid URLs are hashed
// verbatim so the function is total.
pub fn key_of(url: &str) -> PageKey {
    let normalized = normalize_url(url).unwrap_or_else(|| url.to_string());
    let digest = Sha256::digest(normalized.as_bytes());
    PageKey(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable() {
        // SHA-256("abc"), fixed forever so stored records stay addressable
        assert_eq!(
            key_of("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            key_of("https://mr.wikipedia.org/wiki/Rust"),
            key_of("https://mr.wikipedia.org/wiki/Rust")
        );
    }

    #[test]
    fn test_fragment_does_not_change_key() {
        assert_eq!(
            key_of("https://example.org/wiki/Rust#History"),
            key_of("https://example.org/wiki/Rust")
        );
    }

    #[test]
    fn test_distinct_urls_get_distinct_keys() {
        assert_ne!(
            key_of("https://example.org/wiki/A"),
            key_of("https://example.org/wiki/B")
        );
    }

    #[test]
    fn test_normalize_rejects_non_http() {
        assert_eq!(normalize_url("mailto:someone@example.org"), None);
        assert_eq!(normalize_url("/wiki/relative"), None);
        assert_eq!(
            normalize_url("HTTPS://Example.org/wiki/A#top"),
            Some("https://example.org/wiki/A".to_string())
        );
    }

    #[test]
    fn test_from_hex_round_trips_only_real_keys() {
        let key = key_of("https://example.org/wiki/A");
        assert_eq!(PageKey::from_hex(key.as_str()), Some(key));
        assert_eq!(PageKey::from_hex("not-a-key"), None);
        assert_eq!(PageKey::from_hex(&"A".repeat(64)), None);
    }
}
