//! Engine configuration.
//!
//! All knobs for the verification engine, loaded from the server's TOML
//! configuration or environment. Secrets and stores are created from this
//! configuration at startup and injected into the engine at construction;
//! nothing is process-global.
//!
//! # Example (TOML)
//!
//! ```toml
//! [engine]
//! issuer = "stepgate"
//! public_base_url = "http://localhost:8080"
//! session_ttl = "10m"
//! assertion_ttl = "5m"
//! credential_ttl = "1h"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::VerifyResult;
use crate::error::VerifyError;

/// Verification-engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Issuer stamped into credentials (`iss` claim).
    pub issuer: String,

    /// Public base URL of the service, used to build the provider
    /// authorization URL returned at step-2 initiation.
    pub public_base_url: String,

    /// Hex-encoded HS256 secret for final credentials.
    /// Generated at startup when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_secret: Option<String>,

    /// Hex-encoded HS256 secret for provider assertions.
    /// Generated at startup when unset. Kept separate from
    /// `credential_secret` so a credential can never pass as an assertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_secret: Option<String>,

    /// Lifetime of a verification-flow session.
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,

    /// Lifetime of a provider assertion token.
    #[serde(with = "humantime_serde")]
    pub assertion_ttl: Duration,

    /// Lifetime of the final issued credential.
    #[serde(with = "humantime_serde")]
    pub credential_ttl: Duration,

    /// Require the provider-asserted identity to match the step-1 identity
    /// before a flow may complete.
    ///
    /// On by default. Turning this off reproduces a known
    /// parameter-tampering vulnerability and exists solely for security
    /// exercises against a deliberately weakened deployment.
    pub enforce_identity_binding: bool,

    /// Mount the in-process mock identity provider (development harness).
    pub mock_idp_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            issuer: "stepgate".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            credential_secret: None,
            provider_secret: None,
            session_ttl: Duration::from_secs(600),      // 10 minutes
            assertion_ttl: Duration::from_secs(300),    // 5 minutes
            credential_ttl: Duration::from_secs(3600),  // 1 hour
            enforce_identity_binding: true,
            mock_idp_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::Configuration` for empty identifiers or
    /// zero TTLs.
    pub fn validate(&self) -> VerifyResult<()> {
        if self.issuer.trim().is_empty() {
            return Err(VerifyError::configuration("issuer must not be empty"));
        }
        if self.public_base_url.trim().is_empty() {
            return Err(VerifyError::configuration(
                "public_base_url must not be empty",
            ));
        }
        for (name, ttl) in [
            ("session_ttl", self.session_ttl),
            ("assertion_ttl", self.assertion_ttl),
            ("credential_ttl", self.credential_ttl),
        ] {
            if ttl.is_zero() {
                return Err(VerifyError::configuration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}
