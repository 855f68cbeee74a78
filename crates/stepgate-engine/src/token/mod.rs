//! Token issuance and verification.
//!
//! Tokens are compact JWTs (`base64url(header).base64url(claims).base64url(signature)`,
//! no padding) signed with HMAC-SHA-256. Every issued token carries `iss`,
//! `iat`, `exp`, and a fresh `jti` alongside its payload claims.

pub mod claims;
pub mod service;

pub use claims::{AUTH_LEVEL_STEP_UP, AssertionClaims, Claims, CredentialClaims};
pub use service::{SigningSecret, TokenService};
