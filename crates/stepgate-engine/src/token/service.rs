//! HS256 token signing and verification service.
//!
//! The service owns a symmetric signing secret with an explicit lifecycle:
//! it is created at startup (randomly generated or loaded from hex
//! configuration) and injected into the engine at construction. There are no
//! ambient process-wide keys.
//!
//! # Verification semantics
//!
//! Verification is deliberately uniform about failure: an expired token is
//! reported as [`VerifyError::TokenExpired`], and every other failure (bad
//! signature, malformed base64, wrong segment count, unexpected algorithm,
//! missing claim) collapses to [`VerifyError::SignatureInvalid`].
//! The caller learns that the token is unusable, not why.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::VerifyError;
use crate::token::claims::Claims;
use crate::VerifyResult;

/// Length of a generated signing secret in bytes.
const SECRET_LEN: usize = 32;

/// Symmetric signing secret for HS256 tokens.
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    /// Generates a fresh 256-bit secret from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; SECRET_LEN] = rand::thread_rng().r#gen();
        Self(bytes.to_vec())
    }

    /// Loads a secret from a hex string.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::Configuration` if the string is not valid hex
    /// or decodes to fewer than 32 bytes.
    pub fn from_hex(hex_str: &str) -> VerifyResult<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|_| VerifyError::configuration("signing secret is not valid hex"))?;
        if bytes.len() < SECRET_LEN {
            return Err(VerifyError::configuration(
                "signing secret must be at least 32 bytes",
            ));
        }
        Ok(Self(bytes))
    }

    /// Returns the raw secret bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Service for issuing and verifying signed, time-bounded tokens.
///
/// Thread-safe (`Send + Sync`); share it behind an `Arc`.
pub struct TokenService {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    /// Creates a new token service for the given secret and issuer.
    #[must_use]
    pub fn new(secret: &SigningSecret, issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Returns the issuer stamped into issued tokens.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issues a signed token carrying `payload`.
    ///
    /// Stamps `iss`, `iat = now`, `exp = now + ttl` (integer Unix seconds)
    /// and a fresh `jti`, so the same payload issued twice yields two
    /// different tokens.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::Internal` if serialization or signing fails.
    pub fn issue<T: Serialize>(&self, payload: T, ttl: Duration) -> VerifyResult<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            jti: Uuid::new_v4().to_string(),
            payload,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| VerifyError::internal(format!("token encoding failed: {e}")))
    }

    /// Verifies a token and returns its decoded claims.
    ///
    /// Checks, in order: exactly three dot-segments and well-formed base64,
    /// the HMAC-SHA-256 signature (constant-time comparison), the issuer,
    /// and strict expiry with zero leeway.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::TokenExpired` for a valid-but-expired token and
    /// `VerifyError::SignatureInvalid` for every other failure.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> VerifyResult<Claims<T>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        decode::<Claims<T>>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::TokenExpired,
                _ => VerifyError::SignatureInvalid,
            })
    }
}
