//! Content-addressed cache keys for (category, text) pairs.
//!
//! A fingerprint is the SHA-256 digest of the UTF-8 bytes of
//! `category + ":" + text`, rendered as 64 lowercase hex characters. The
//! encoding is fixed so that a cache directory written by one process (or by
//! another implementation of the same scheme) stays valid for the next.

use std::fmt;
use std::str::FromStr;

use ring::digest::{SHA256, digest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Separator between category and text in the hashed payload.
pub const SEPARATOR: char = ':';

/// Length of a fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// Stable identifier derived from a (category, text) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

#[derive(Debug, Error, PartialEq)]
pub enum FingerprintParseError {
    #[error("expected {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Derive the fingerprint for a category and a snippet of text.
///
/// Pure and total: every input, including empty strings, has a fingerprint.
pub fn fingerprint(category: &str, text: &str) -> Fingerprint {
    let mut payload = String::with_capacity(category.len() + 1 + text.len());
    payload.push_str(category);
    payload.push(SEPARATOR);
    payload.push_str(text);

    let hash = digest(&SHA256, payload.as_bytes());
    let mut bytes = [0u8; FINGERPRINT_LEN];
    bytes.copy_from_slice(hash.as_ref());
    Fingerprint(bytes)
}

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex rendering, used as the storage key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != FINGERPRINT_LEN * 2 {
            return Err(FingerprintParseError::Length {
                expected: FINGERPRINT_LEN * 2,
                actual: s.len(),
            });
        }
        let mut bytes = [0u8; FINGERPRINT_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_fingerprint() {
        let a = fingerprint("Electrical", "Amendment 2 issued.");
        let b = fingerprint("Electrical", "Amendment 2 issued.");
        assert_eq!(a, b);
    }

    #[test]
    fn different_category_differs() {
        let a = fingerprint("Electrical", "RFP posted for work.");
        let b = fingerprint("HVAC", "RFP posted for work.");
        assert_ne!(a, b);
    }

    #[test]
    fn different_text_differs() {
        let a = fingerprint("Plumbing", "Change order executed.");
        let b = fingerprint("Plumbing", "Change order executed");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_inputs_are_valid() {
        let fp = fingerprint("", "");
        // SHA-256 of ":".
        assert_eq!(
            fp.to_hex(),
            "e7ac0786668e0ff0f02b62bd04f45ff636fd82db63b1104601c975dc005f3a67"
        );
    }

    #[test]
    fn matches_known_digest() {
        // SHA-256 of "Electrical:Amendment 2 issued. See updated Attachment B."
        let fp = fingerprint("Electrical", "Amendment 2 issued. See updated Attachment B.");
        assert_eq!(
            fp.to_hex(),
            "35e778b56967d7b0e2e351a870031c6240bba858ee0b408e66afbd37c55445a5"
        );
    }

    #[test]
    fn hex_parse_roundtrip() {
        let fp = fingerprint("HVAC", "Agency evaluating additional mechanical work.");
        let parsed: Fingerprint = fp.to_hex().parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = "abcd".parse::<Fingerprint>().unwrap_err();
        assert_eq!(
            err,
            FingerprintParseError::Length {
                expected: 64,
                actual: 4
            }
        );
    }

    #[test]
    fn parse_rejects_non_hex() {
        let bad = "z".repeat(64);
        assert!(matches!(
            bad.parse::<Fingerprint>(),
            Err(FingerprintParseError::Hex(_))
        ));
    }

    #[test]
    fn serde_uses_hex_string() {
        let fp = fingerprint("Electrical", "x");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.to_hex()));
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }
}
