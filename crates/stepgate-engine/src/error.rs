//! Verification error types.
//!
//! This module defines all error kinds that can occur while driving a
//! verification flow. Every externally reachable operation returns one of
//! these kinds rather than an unstructured fault; callers can rely on the
//! kind to distinguish validation failures from security failures.

use std::fmt;

/// Errors that can occur during verification-flow operations.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The request input is missing or malformed.
    #[error("Invalid input: {message}")]
    Validation {
        /// Description of what was wrong with the input.
        message: String,
    },

    /// The referenced session is absent, expired, or not at the required step.
    #[error("Session not found: {message}")]
    SessionNotFound {
        /// Description of why the session could not be used.
        message: String,
    },

    /// The token signature did not verify, or the token was malformed.
    ///
    /// Malformed tokens and bad signatures are reported uniformly so the
    /// error gives no oracle about which check failed.
    #[error("Invalid token signature")]
    SignatureInvalid,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The token's `jti` was already consumed.
    #[error("Token replay detected")]
    ReplayDetected,

    /// The callback `state` does not match the session's `state`.
    #[error("State mismatch")]
    StateMismatch,

    /// The asserted `nonce` does not match the session's `nonce`.
    #[error("Nonce mismatch")]
    NonceMismatch,

    /// The identity asserted by the provider is not the identity that
    /// completed the real-name step.
    #[error("Identity mismatch between verification steps")]
    IdentityMismatch,

    /// An error occurred while reading or writing flow state.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The engine configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl VerifyError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `SessionNotFound` error.
    #[must_use]
    pub fn session_not_found(message: impl Into<String>) -> Self {
        Self::SessionNotFound {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is caused by the caller (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if this is a security failure rather than a plain
    /// input problem.
    #[must_use]
    pub fn is_security_failure(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid
                | Self::TokenExpired
                | Self::ReplayDetected
                | Self::StateMismatch
                | Self::NonceMismatch
                | Self::IdentityMismatch
        )
    }

    /// Returns `true` if the current flow attempt cannot continue and the
    /// caller must restart from step 1.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_security_failure()
    }

    /// Returns the error category for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::SessionNotFound { .. } => ErrorCategory::Session,
            Self::SignatureInvalid | Self::TokenExpired => ErrorCategory::Token,
            Self::ReplayDetected => ErrorCategory::Replay,
            Self::StateMismatch | Self::NonceMismatch | Self::IdentityMismatch => {
                ErrorCategory::Binding
            }
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the stable wire error code for this error.
    ///
    /// Infrastructure and internal faults all collapse to `server_error`;
    /// their detail is logged server-side and never surfaced to the caller.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::SignatureInvalid => "signature_invalid",
            Self::TokenExpired => "token_expired",
            Self::ReplayDetected => "replay_detected",
            Self::StateMismatch => "state_mismatch",
            Self::NonceMismatch => "nonce_mismatch",
            Self::IdentityMismatch => "identity_mismatch",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }
}

/// Categories of verification errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Request validation errors.
    Validation,
    /// Session lookup/step errors.
    Session,
    /// Token signature and expiry errors.
    Token,
    /// Token replay errors.
    Replay,
    /// Cross-step binding errors (state, nonce, identity).
    Binding,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Session => write!(f, "session"),
            Self::Token => write!(f, "token"),
            Self::Replay => write!(f, "replay"),
            Self::Binding => write!(f, "binding"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
