//! Deterministic short code derivation.
//!
//! A code is the URL-safe, unpadded base64 encoding of a fixed-size prefix of
//! the SHA-256 digest of the target URL. No randomness or process state is
//! involved, so every instance derives the same code for the same URL.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::{CodeDeriver, ShortCode};

/// Number of digest bytes encoded into a code. 6 bytes encode to 8 characters.
pub const DEFAULT_PREFIX_BYTES: usize = 6;

const DIGEST_BYTES: usize = 32;

/// SHA-256 prefix deriver.
#[derive(Clone, Copy, Debug)]
pub struct Sha256CodeDeriver {
    prefix_bytes: usize,
}

impl Sha256CodeDeriver {
    /// `prefix_bytes` is clamped to `1..=32`.
    pub fn new(prefix_bytes: usize) -> Self {
        Self {
            prefix_bytes: prefix_bytes.clamp(1, DIGEST_BYTES),
        }
    }

    pub fn prefix_bytes(&self) -> usize {
        self.prefix_bytes
    }
}

impl Default for Sha256CodeDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX_BYTES)
    }
}

impl CodeDeriver for Sha256CodeDeriver {
    fn derive(&self, url: &str) -> ShortCode {
        let digest = Sha256::digest(url.as_bytes());
        let encoded = URL_SAFE_NO_PAD.encode(&digest[..self.prefix_bytes]);
        // The URL-safe alphabet is a subset of the ShortCode alphabet and the
        // prefix is never empty, so this always succeeds.
        ShortCode::new(encoded).unwrap_or_else(|_| ShortCode("A".into()))
    }
}

/// Derive the code for `url` with the default prefix length.
pub fn derive_code(url: &str) -> ShortCode {
    Sha256CodeDeriver::default().derive(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(derive_code("https://example.com").as_str(), "EAaArVRs");
        assert_eq!(derive_code("https://same.example").as_str(), "-ri17Yzx");
        assert_eq!(derive_code("https://www.rust-lang.org/").as_str(), "Cm5swgya");
    }

    #[test]
    fn empty_input_still_yields_code() {
        assert_eq!(derive_code("").as_str(), "47DEQpj8");
    }

    #[test]
    fn deterministic_across_instances() {
        let a = Sha256CodeDeriver::default();
        let b = Sha256CodeDeriver::new(DEFAULT_PREFIX_BYTES);
        for url in ["https://example.com/a?b=c", "ünïcødé", "x"] {
            assert_eq!(a.derive(url), b.derive(url));
            assert_eq!(a.derive(url), a.derive(url));
        }
    }

    #[test]
    fn output_alphabet_and_length() {
        for i in 0..200 {
            let code = derive_code(&format!("https://example.com/{i}"));
            assert_eq!(code.as_str().len(), 8);
            assert!(code
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn prefix_length_is_configurable_and_clamped() {
        let long = Sha256CodeDeriver::new(9);
        assert_eq!(long.derive("https://example.com").as_str(), "EAaArVRs5qV3");
        assert_eq!(Sha256CodeDeriver::new(0).prefix_bytes(), 1);
        assert_eq!(Sha256CodeDeriver::new(64).prefix_bytes(), 32);
    }
}
