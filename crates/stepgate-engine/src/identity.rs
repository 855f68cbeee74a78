//! Subject identity fingerprinting and cross-step consistency.
//!
//! A declared identity (name + resident id number) is reduced to a one-way
//! SHA-256 fingerprint at step 1. The fingerprint is the only identity
//! artifact that is ever compared or persisted past that point; the raw
//! fields stay inside the session and are never returned to the client.
//!
//! # Normalization
//!
//! The id number is normalized before hashing: the first segment is kept as
//! is, and only the first character of the second segment survives, with the
//! remainder zero-filled (`900101-1234567` → `900101-1000000`). The verifying
//! party is not entitled to distinguish subjects on the full second segment
//! at this trust level.

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// Required id-number length, e.g. `900101-1234567`.
const ID_NUMBER_LEN: usize = 14;

/// Byte offset of the segment separator.
const SEPARATOR_OFFSET: usize = 6;

/// Validates the shape of a declared id number.
///
/// Format-only validation: fixed length, `-` separator at a fixed offset,
/// digits everywhere else. A real registry lookup is out of scope.
///
/// # Errors
///
/// Returns `VerifyError::Validation` if the shape does not match.
pub fn validate_id_number(id_number: &str) -> Result<(), VerifyError> {
    let bytes = id_number.as_bytes();
    if bytes.len() != ID_NUMBER_LEN {
        return Err(VerifyError::validation("idNumber has invalid length"));
    }
    if bytes[SEPARATOR_OFFSET] != b'-' {
        return Err(VerifyError::validation("idNumber has invalid format"));
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == SEPARATOR_OFFSET || b.is_ascii_digit());
    if !digits_ok {
        return Err(VerifyError::validation("idNumber has invalid format"));
    }
    Ok(())
}

/// Normalizes an id number for fingerprinting.
///
/// Keeps the first segment and the first character of the second segment,
/// zero-filling the rest of the second segment. Inputs without a separator
/// are returned unchanged (they only occur before shape validation).
#[must_use]
pub fn normalize_id_number(id_number: &str) -> String {
    match id_number.split_once('-') {
        Some((front, back)) if !back.is_empty() => {
            let mut chars = back.chars();
            let first = chars.next().unwrap_or('0');
            format!("{front}-{first}{}", "0".repeat(chars.count()))
        }
        _ => id_number.to_string(),
    }
}

/// One-way fingerprint binding a declared identity to a comparable value.
///
/// The fingerprint is the hex-encoded SHA-256 digest of
/// `name + ":" + normalized_id_number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectFingerprint(String);

impl SubjectFingerprint {
    /// Computes the fingerprint for a declared identity.
    ///
    /// The id number is normalized before hashing.
    #[must_use]
    pub fn compute(name: &str, id_number: &str) -> Self {
        let normalized = normalize_id_number(id_number);
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(normalized.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Compares two fingerprints in constant time.
    ///
    /// Always use this instead of `==` when the outcome gates a trust
    /// decision.
    #[must_use]
    pub fn matches(&self, other: &SubjectFingerprint) -> bool {
        constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
    }

    /// Returns the fingerprint as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the fingerprint and returns the inner hex string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for SubjectFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Constant-time comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}
