//! The verification-flow state machine.
//!
//! [`FlowEngine`] orchestrates the ordered protocol steps:
//!
//! 1. [`submit_real_name`](FlowEngine::submit_real_name): real-name check,
//!    creates the session
//! 2. [`initiate_step2`](FlowEngine::initiate_step2): provider handoff
//! 3. [`handle_callback`](FlowEngine::handle_callback): binds the provider
//!    assertion back to the step-1 subject
//! 4. [`finalize`](FlowEngine::finalize): issues the credential and deletes
//!    the session
//!
//! Every operation requires the exact preceding step; any precondition
//! failure returns a typed error and leaves the session untouched, so a
//! failed attempt never partially advances a flow.

pub mod session;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::VerifyResult;
use crate::config::EngineConfig;
use crate::error::VerifyError;
use crate::identity::{SubjectFingerprint, constant_time_eq, validate_id_number};
use crate::idp;
use crate::storage::{JtiStore, SessionStore};
use crate::token::{AUTH_LEVEL_STEP_UP, AssertionClaims, CredentialClaims, TokenService};

use session::{BoundIdentity, DeclaredIdentity, FlowStep, VerificationSession};

// =============================================================================
// Wire contracts
// =============================================================================

/// Step-1 request: the declared identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealNameRequest {
    /// Declared subject name.
    pub name: String,
    /// Declared subject id number.
    pub id_number: String,
}

/// Step-1 response. Only the session id; identity fields never echo back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealNameResponse {
    /// The new session id.
    pub sid: String,
}

/// Step-2 initiation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateStep2Request {
    /// Session to initiate the handoff for.
    pub sid: String,
}

/// Step-2 initiation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateStep2Response {
    /// Provider authorization URL for the caller to follow.
    pub auth_url: String,
    /// Correlator for the provider round trip.
    pub request_id: String,
    /// Nonce the provider must echo inside its assertion.
    pub nonce: String,
}

/// Provider callback request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    /// Correlator issued at step-2 initiation.
    pub request_id: String,
    /// Anti-forgery state relayed through the provider.
    pub state: String,
    /// The provider's signed identity assertion.
    pub idp_token: String,
}

/// Provider callback response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResponse {
    /// Always `true` on success.
    pub success: bool,
    /// Session id for the finalize call.
    pub sid: String,
}

/// Finalize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    /// Session to finalize.
    pub sid: String,
}

/// Finalize response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResponse {
    /// Always `true` on success.
    pub success: bool,
    /// The signed credential for the bound identity.
    pub token: String,
}

// =============================================================================
// Flow engine
// =============================================================================

/// Orchestrates verification flows over the injected stores and token
/// services.
///
/// Shared mutable state is confined to the session store and the replay
/// store; the engine itself is immutable after construction and safe to
/// share behind an `Arc`.
pub struct FlowEngine {
    config: EngineConfig,
    sessions: Arc<dyn SessionStore>,
    jtis: Arc<dyn JtiStore>,
    /// Signs final credentials as the configured issuer.
    credentials: Arc<TokenService>,
    /// Verifies provider assertions (provider issuer and secret).
    assertions: Arc<TokenService>,
}

impl FlowEngine {
    /// Creates a new flow engine.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        sessions: Arc<dyn SessionStore>,
        jtis: Arc<dyn JtiStore>,
        credentials: Arc<TokenService>,
        assertions: Arc<TokenService>,
    ) -> Self {
        Self {
            config,
            sessions,
            jtis,
            credentials,
            assertions,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Step 1: validates the declared identity and opens a flow session.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::Validation` for empty or malformed input.
    pub async fn submit_real_name(
        &self,
        request: RealNameRequest,
    ) -> VerifyResult<RealNameResponse> {
        let name = request.name.trim();
        let id_number = request.id_number.trim();

        if name.is_empty() {
            return Err(VerifyError::validation("name is required"));
        }
        if id_number.is_empty() {
            return Err(VerifyError::validation("idNumber is required"));
        }
        validate_id_number(id_number)?;

        let subject = DeclaredIdentity {
            name: name.to_string(),
            id_number: id_number.to_string(),
        };
        let session = VerificationSession::begin(subject, self.config.session_ttl);
        self.sessions.put(&session).await?;

        info!(sid = %session.sid, "real-name check passed");
        Ok(RealNameResponse { sid: session.sid })
    }

    /// Step 2 initiation: stamps a `request_id` and hands off to the
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::SessionNotFound` if the session is absent,
    /// expired, or not at [`FlowStep::Step1Done`].
    pub async fn initiate_step2(
        &self,
        request: InitiateStep2Request,
    ) -> VerifyResult<InitiateStep2Response> {
        let mut session = self
            .sessions
            .get(request.sid.trim())
            .await?
            .ok_or_else(|| VerifyError::session_not_found("no active session for sid"))?;

        if session.step != FlowStep::Step1Done {
            return Err(VerifyError::session_not_found(
                "session is not awaiting step-2 initiation",
            ));
        }

        let request_id = Uuid::new_v4().to_string();
        session.request_id = Some(request_id.clone());
        session.step = FlowStep::Step2Initiated;
        session.refresh(self.config.session_ttl);
        self.sessions.put(&session).await?;

        let auth_url =
            idp::authorize_url(&self.config.public_base_url, &request_id, &session.state);

        info!(sid = %session.sid, request_id = %request_id, "provider handoff initiated");
        Ok(InitiateStep2Response {
            auth_url,
            request_id,
            nonce: session.nonce,
        })
    }

    /// Provider callback: verifies the assertion and binds it to the
    /// step-1 subject.
    ///
    /// Checks run in a fixed order (state, token signature and expiry,
    /// replay, nonce, identity consistency) and the first failure is
    /// terminal for the attempt. The session is only written after every
    /// check has passed.
    ///
    /// # Errors
    ///
    /// Returns the typed error for whichever check failed; the session is
    /// left unchanged.
    pub async fn handle_callback(
        &self,
        request: CallbackRequest,
    ) -> VerifyResult<CallbackResponse> {
        let request_id = request.request_id.trim();
        let state = request.state.trim();
        let idp_token = request.idp_token.trim();

        if request_id.is_empty() || state.is_empty() || idp_token.is_empty() {
            return Err(VerifyError::validation(
                "requestId, state and idpToken are required",
            ));
        }

        let mut session = self
            .sessions
            .find_by_request_id(request_id)
            .await?
            .ok_or_else(|| VerifyError::session_not_found("no session for requestId"))?;

        if session.step != FlowStep::Step2Initiated {
            return Err(VerifyError::session_not_found(
                "session is not awaiting a provider callback",
            ));
        }

        if !constant_time_eq(state.as_bytes(), session.state.as_bytes()) {
            warn!(sid = %session.sid, "callback state mismatch");
            return Err(VerifyError::StateMismatch);
        }

        let claims = self.assertions.verify::<AssertionClaims>(idp_token)?;

        // Consume the assertion id before trusting any of its claims.
        let token_expiry = OffsetDateTime::from_unix_timestamp(claims.exp)
            .map_err(|_| VerifyError::SignatureInvalid)?;
        if !self.jtis.mark_used(&claims.jti, token_expiry).await? {
            warn!(sid = %session.sid, jti = %claims.jti, "assertion replay detected");
            return Err(VerifyError::ReplayDetected);
        }

        if !constant_time_eq(
            claims.payload.nonce.as_bytes(),
            session.nonce.as_bytes(),
        ) {
            warn!(sid = %session.sid, "assertion nonce mismatch");
            return Err(VerifyError::NonceMismatch);
        }

        let idp_fingerprint =
            SubjectFingerprint::compute(&claims.payload.name, &claims.payload.id_number);
        if self.config.enforce_identity_binding
            && !session.fingerprint.matches(&idp_fingerprint)
        {
            warn!(sid = %session.sid, "asserted identity does not match step-1 subject");
            return Err(VerifyError::IdentityMismatch);
        }

        // The credential is always issued for the step-1 subject; the
        // provider-asserted identity is recorded alongside for audit.
        session.final_identity = Some(BoundIdentity {
            name: session.subject.name.clone(),
            id_number: session.subject.id_number.clone(),
            fingerprint: session.fingerprint.clone(),
        });
        session.idp_identity = Some(BoundIdentity {
            name: claims.payload.name,
            id_number: claims.payload.id_number,
            fingerprint: idp_fingerprint,
        });
        session.step = FlowStep::Step2Ok;
        session.refresh(self.config.session_ttl);
        self.sessions.put(&session).await?;

        info!(sid = %session.sid, "provider assertion accepted");
        Ok(CallbackResponse {
            success: true,
            sid: session.sid,
        })
    }

    /// Finalize: issues the credential for the bound identity and deletes
    /// the session.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::SessionNotFound` if the session is absent,
    /// expired, or not at [`FlowStep::Step2Ok`], including a session that
    /// was already finalized.
    pub async fn finalize(&self, request: FinalizeRequest) -> VerifyResult<FinalizeResponse> {
        let session = self
            .sessions
            .get(request.sid.trim())
            .await?
            .ok_or_else(|| VerifyError::session_not_found("no active session for sid"))?;

        if session.step != FlowStep::Step2Ok {
            return Err(VerifyError::session_not_found(
                "session has not completed verification",
            ));
        }

        let bound = session.final_identity.as_ref().ok_or_else(|| {
            VerifyError::internal("verified session is missing its bound identity")
        })?;

        let claims = CredentialClaims {
            sid: session.sid.clone(),
            name: bound.name.clone(),
            id_number: crate::identity::normalize_id_number(&bound.id_number),
            verified: true,
            auth_level: AUTH_LEVEL_STEP_UP.to_string(),
        };
        let token = self
            .credentials
            .issue(claims, self.config.credential_ttl)?;

        self.sessions.delete(&session.sid).await?;

        info!(sid = %session.sid, "flow finalized, credential issued");
        Ok(FinalizeResponse {
            success: true,
            token,
        })
    }
}
