//! In-process mock identity provider.
//!
//! Development harness standing in for a real external provider (PASS,
//! Kakao, Naver, ...). It mints the signed identity assertion a real
//! provider would return from its authentication ceremony, and it refuses to
//! assert a subject other than the one who started the flow, mirroring the
//! fact that a real provider asserts whoever actually authenticated.
//!
//! Mounted only when `mock_idp_enabled` is set; never deploy it on a public
//! surface.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::VerifyResult;
use crate::error::VerifyError;
use crate::identity::{SubjectFingerprint, constant_time_eq};
use crate::storage::SessionStore;
use crate::token::{AssertionClaims, TokenService};

/// Issuer name the mock provider signs assertions under.
pub const PROVIDER_ISSUER: &str = "mock-idp";

/// Builds the provider authorization URL for a flow.
///
/// Opaque to the caller; parameterized by the flow's `request_id` and
/// `state` so the provider can correlate the round trip.
#[must_use]
pub fn authorize_url(public_base_url: &str, request_id: &str, state: &str) -> String {
    format!(
        "{}/mock-idp/authorize?request_id={request_id}&state={state}",
        public_base_url.trim_end_matches('/')
    )
}

/// Assertion-minting request (development harness only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintAssertionRequest {
    /// Subject name the provider should assert.
    pub name: String,
    /// Subject id number the provider should assert.
    pub id_number: String,
    /// Nonce to embed in the assertion.
    pub nonce: String,
    /// Correlator from step-2 initiation.
    pub request_id: String,
    /// Anti-forgery state from step-2 initiation.
    pub state: String,
}

/// Assertion-minting response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintAssertionResponse {
    /// The signed assertion token.
    pub idp_token: String,
}

/// Mock identity provider.
pub struct MockIdentityProvider {
    sessions: Arc<dyn SessionStore>,
    assertions: Arc<TokenService>,
    assertion_ttl: Duration,
    audience: String,
}

impl MockIdentityProvider {
    /// Creates a mock provider minting assertions for `audience`.
    ///
    /// `assertions` must be the same service the flow engine verifies
    /// assertions with (provider issuer and secret).
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        assertions: Arc<TokenService>,
        assertion_ttl: Duration,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            assertions,
            assertion_ttl,
            audience: audience.into(),
        }
    }

    /// Mints a signed identity assertion for a pending flow.
    ///
    /// Locates the session by `request_id`, checks the `state`, and runs the
    /// identity-consistency check against the session's step-1 fingerprint
    /// before signing anything: a real provider would only ever assert the
    /// subject who authenticated, and the mock refuses to impersonate
    /// anyone else.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for missing fields, `SessionNotFound` when no
    /// pending flow holds `request_id`, `StateMismatch` for a wrong state,
    /// and `IdentityMismatch` when the requested subject is not the step-1
    /// subject.
    pub async fn mint_assertion(
        &self,
        request: MintAssertionRequest,
    ) -> VerifyResult<MintAssertionResponse> {
        let name = request.name.trim();
        let id_number = request.id_number.trim();
        let nonce = request.nonce.trim();
        let request_id = request.request_id.trim();
        let state = request.state.trim();

        if name.is_empty()
            || id_number.is_empty()
            || nonce.is_empty()
            || request_id.is_empty()
            || state.is_empty()
        {
            return Err(VerifyError::validation(
                "name, idNumber, nonce, requestId and state are required",
            ));
        }

        let session = self
            .sessions
            .find_by_request_id(request_id)
            .await?
            .ok_or_else(|| VerifyError::session_not_found("no session for requestId"))?;

        if !constant_time_eq(state.as_bytes(), session.state.as_bytes()) {
            warn!(sid = %session.sid, "mint request state mismatch");
            return Err(VerifyError::StateMismatch);
        }

        let requested = SubjectFingerprint::compute(name, id_number);
        if !session.fingerprint.matches(&requested) {
            warn!(sid = %session.sid, "refusing to assert a different subject");
            return Err(VerifyError::IdentityMismatch);
        }

        let claims = AssertionClaims {
            name: name.to_string(),
            id_number: id_number.to_string(),
            nonce: nonce.to_string(),
            aud: self.audience.clone(),
        };
        let idp_token = self.assertions.issue(claims, self.assertion_ttl)?;

        info!(sid = %session.sid, request_id = %request_id, "assertion minted");
        Ok(MintAssertionResponse { idp_token })
    }
}
