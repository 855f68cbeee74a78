//! # stepgate-engine
//!
//! Protocol engine for stepgate's step-up identity verification.
//!
//! A flow walks a subject through a real-name check, a handoff to an
//! external identity provider, a callback that is bound back to the original
//! subject, and the issuance of a signed credential. The engine guarantees
//! that the party who finishes step 2 is the party who completed step 1.
//!
//! ## Modules
//!
//! - [`config`] - Engine configuration
//! - [`error`] - Typed verification errors
//! - [`flow`] - The flow state machine and wire contracts
//! - [`identity`] - Subject fingerprinting and consistency checks
//! - [`idp`] - In-process mock identity provider (development harness)
//! - [`storage`] - Session and replay storage traits with in-memory backends
//! - [`token`] - HS256 token issuance and verification
//! - [`http`] - Axum handlers over the engine
//!
//! ## Security properties
//!
//! - sessions, `state`, and `nonce` carry 256 bits of entropy each
//! - assertion token ids (`jti`) are consumed at most once
//! - the step-1 and provider-asserted identities must fingerprint
//!   identically before a flow can complete
//! - all trust-gating string comparisons are constant-time

pub mod config;
pub mod error;
pub mod flow;
pub mod http;
pub mod identity;
pub mod idp;
pub mod storage;
pub mod token;

pub use config::EngineConfig;
pub use error::{ErrorCategory, VerifyError};
pub use flow::{
    CallbackRequest, CallbackResponse, FinalizeRequest, FinalizeResponse, FlowEngine,
    InitiateStep2Request, InitiateStep2Response, RealNameRequest, RealNameResponse,
    session::{BoundIdentity, DeclaredIdentity, FlowStep, VerificationSession},
};
pub use http::{FlowState, router};
pub use identity::{SubjectFingerprint, normalize_id_number, validate_id_number};
pub use idp::{
    MintAssertionRequest, MintAssertionResponse, MockIdentityProvider, PROVIDER_ISSUER,
    authorize_url,
};
pub use storage::{InMemoryJtiStore, InMemorySessionStore, JtiStore, SessionStore};
pub use token::{
    AUTH_LEVEL_STEP_UP, AssertionClaims, Claims, CredentialClaims, SigningSecret, TokenService,
};

/// Type alias for verification results.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use stepgate_engine::prelude::*;
/// ```
pub mod prelude {
    pub use crate::VerifyResult;
    pub use crate::config::EngineConfig;
    pub use crate::error::{ErrorCategory, VerifyError};
    pub use crate::flow::{
        CallbackRequest, CallbackResponse, FinalizeRequest, FinalizeResponse, FlowEngine,
        InitiateStep2Request, InitiateStep2Response, RealNameRequest, RealNameResponse,
        session::{BoundIdentity, DeclaredIdentity, FlowStep, VerificationSession},
    };
    pub use crate::http::{FlowState, router};
    pub use crate::identity::SubjectFingerprint;
    pub use crate::idp::{MintAssertionRequest, MintAssertionResponse, MockIdentityProvider};
    pub use crate::storage::{InMemoryJtiStore, InMemorySessionStore, JtiStore, SessionStore};
    pub use crate::token::{
        AUTH_LEVEL_STEP_UP, AssertionClaims, Claims, CredentialClaims, SigningSecret,
        TokenService,
    };
}
