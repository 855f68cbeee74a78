//! Token claim types.

use serde::{Deserialize, Serialize};

/// Authentication-level claim value stamped into the final credential once
/// both verification steps have completed.
pub const AUTH_LEVEL_STEP_UP: &str = "2fa_completed";

/// Claims envelope shared by every token the engine issues or verifies.
///
/// The registered claims (`iss`, `iat`, `exp`, `jti`) are stamped by
/// [`TokenService::issue`](crate::token::TokenService::issue); the payload is
/// flattened into the same JSON object, so the wire form is a single flat
/// claim set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims<T> {
    /// Issuer.
    pub iss: String,

    /// Issued-at (Unix seconds).
    pub iat: i64,

    /// Expiration (Unix seconds). Comparison is strict: a token is rejected
    /// once `now > exp`.
    pub exp: i64,

    /// Unique token identifier, fresh per issuance.
    pub jti: String,

    /// Token-specific claims.
    #[serde(flatten)]
    pub payload: T,
}

/// Identity assertion minted by the external identity provider.
///
/// Assertions cross a trust boundary, so their `jti` is consumed by the
/// replay guard exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    /// Asserted subject name.
    pub name: String,

    /// Asserted subject id number.
    #[serde(rename = "idNumber")]
    pub id_number: String,

    /// Nonce relayed from the session that requested the assertion.
    pub nonce: String,

    /// Intended audience.
    pub aud: String,
}

/// Final credential issued when a flow finalizes.
///
/// Carries the step-1 (bound) identity with the normalized id number; the
/// raw declared id number never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialClaims {
    /// Session the credential was issued from.
    pub sid: String,

    /// Bound subject name.
    pub name: String,

    /// Bound subject id number, normalized.
    #[serde(rename = "idNumber")]
    pub id_number: String,

    /// Whether the subject completed identity verification.
    pub verified: bool,

    /// Authentication level, [`AUTH_LEVEL_STEP_UP`] for completed flows.
    pub auth_level: String,
}
