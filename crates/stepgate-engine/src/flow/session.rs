//! Verification session state.
//!
//! A session tracks one end-to-end attempt at the step-up protocol, from the
//! real-name check through provider callback to credential issuance.
//!
//! # Lifecycle
//!
//! 1. Session created at `Step1Done` when the real-name check passes
//! 2. Step-2 initiation stamps a `request_id` and advances to `Step2Initiated`
//! 3. Provider callback passes all binding checks and advances to `Step2Ok`
//! 4. Finalize issues the credential and deletes the session
//!
//! The step only ever moves forward; every handler requires the exact
//! preceding step and otherwise rejects without touching the session.
//!
//! # Security
//!
//! - `state` and `nonce` are 256-bit random values, base64url-encoded
//! - the declared identity is held only for the session's lifetime and is
//!   never echoed to the client
//! - sessions expire after a short TTL and are lazily evicted on access

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::identity::SubjectFingerprint;

/// Protocol step a session has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    /// Flow created, nothing verified yet.
    Initiated,
    /// Real-name check passed.
    Step1Done,
    /// Provider handoff started, waiting for the callback.
    Step2Initiated,
    /// Provider assertion accepted, identity binding verified.
    Step2Ok,
}

impl FlowStep {
    /// Returns the step name as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Step1Done => "step1_done",
            Self::Step2Initiated => "step2_initiated",
            Self::Step2Ok => "step2_ok",
        }
    }
}

impl std::fmt::Display for FlowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity declared at step 1. Server-internal only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredIdentity {
    /// Subject name.
    pub name: String,
    /// Subject id number, as declared.
    pub id_number: String,
}

/// An identity recorded at `Step2Ok`, with its fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundIdentity {
    /// Subject name.
    pub name: String,
    /// Subject id number.
    pub id_number: String,
    /// Fingerprint of the identity.
    pub fingerprint: SubjectFingerprint,
}

/// State of one verification flow, owned by the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSession {
    /// Random session identifier, the client's only handle on the flow.
    pub sid: String,

    /// Current protocol step. Advances forward only.
    pub step: FlowStep,

    /// Fingerprint of the step-1 identity.
    pub fingerprint: SubjectFingerprint,

    /// Step-1 declared identity. Never returned to the client.
    pub subject: DeclaredIdentity,

    /// Per-session anti-forgery token, relayed through the provider round
    /// trip and checked on callback.
    pub state: String,

    /// Per-session nonce the provider must echo inside its assertion.
    pub nonce: String,

    /// Correlator for the provider round trip; callback lookup key.
    /// Unique per session, set at step-2 initiation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Identity the credential will be issued for (the step-1 subject).
    /// Populated at `Step2Ok`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_identity: Option<BoundIdentity>,

    /// Identity the provider actually asserted. Kept separate from
    /// `final_identity` so a downstream audit can still see a mismatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idp_identity: Option<BoundIdentity>,

    /// Timestamp when the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Timestamp when the session expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl VerificationSession {
    /// Creates a session for a subject that just passed the real-name check.
    ///
    /// The session starts at [`FlowStep::Step1Done`] with fresh `state` and
    /// `nonce` values and a random `sid`.
    #[must_use]
    pub fn begin(subject: DeclaredIdentity, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        let fingerprint = SubjectFingerprint::compute(&subject.name, &subject.id_number);
        Self {
            sid: Uuid::new_v4().to_string(),
            step: FlowStep::Step1Done,
            fingerprint,
            subject,
            state: generate_secure_token(),
            nonce: generate_secure_token(),
            request_id: None,
            final_identity: None,
            idp_identity: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns `true` if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Extends the session's expiry to `ttl` from now.
    ///
    /// Called on each successful step transition so a flow gets the full
    /// window for its next step.
    pub fn refresh(&mut self, ttl: Duration) {
        self.expires_at = OffsetDateTime::now_utc() + ttl;
    }
}

/// Generates a cryptographically random URL-safe token.
///
/// 32 bytes (256 bits) of entropy, base64url-encoded without padding
/// (43 characters).
#[must_use]
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
