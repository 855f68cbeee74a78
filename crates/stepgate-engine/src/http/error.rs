//! Error response handling for the HTTP surface.
//!
//! Implements `IntoResponse` for [`VerifyError`] with stable machine-readable
//! error codes. Infrastructure and internal faults are logged server-side
//! with full detail and surfaced to the caller only as a generic
//! `server_error`; error text must never leak internals.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::VerifyError;

impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        let (status, message) = error_details(&self);

        let body = json!({
            "error": self.error_code(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Maps an error to its HTTP status and client-visible message.
fn error_details(error: &VerifyError) -> (StatusCode, String) {
    match error {
        VerifyError::Validation { .. } => (StatusCode::BAD_REQUEST, error.to_string()),
        // A uniform 400 for unknown and known-but-wrong-step sessions avoids
        // an existence oracle on session ids.
        VerifyError::SessionNotFound { .. } => (StatusCode::BAD_REQUEST, error.to_string()),
        VerifyError::SignatureInvalid
        | VerifyError::TokenExpired
        | VerifyError::ReplayDetected
        | VerifyError::StateMismatch
        | VerifyError::NonceMismatch => (StatusCode::UNAUTHORIZED, error.to_string()),
        VerifyError::IdentityMismatch => (StatusCode::FORBIDDEN, error.to_string()),
        VerifyError::Storage { .. }
        | VerifyError::Configuration { .. }
        | VerifyError::Internal { .. } => {
            tracing::error!(category = %error.category(), error = %error, "internal fault");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}
