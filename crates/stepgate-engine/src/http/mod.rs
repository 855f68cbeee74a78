//! HTTP surface for the verification flow.
//!
//! Thin axum handlers over [`FlowEngine`]; all protocol logic lives in the
//! engine. The mock-provider endpoint is mounted only when the state carries
//! a provider.

pub mod error;

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};

use crate::error::VerifyError;
use crate::flow::{
    CallbackRequest, CallbackResponse, FinalizeRequest, FinalizeResponse, FlowEngine,
    InitiateStep2Request, InitiateStep2Response, RealNameRequest, RealNameResponse,
};
use crate::idp::{MintAssertionRequest, MintAssertionResponse, MockIdentityProvider};

/// Shared state for the flow routes.
#[derive(Clone)]
pub struct FlowState {
    /// The protocol engine.
    pub engine: Arc<FlowEngine>,
    /// The mock provider, when the development harness is enabled.
    pub idp: Option<Arc<MockIdentityProvider>>,
}

impl FlowState {
    /// Creates state without the mock provider.
    #[must_use]
    pub fn new(engine: Arc<FlowEngine>) -> Self {
        Self { engine, idp: None }
    }

    /// Attaches the mock provider (development harness).
    #[must_use]
    pub fn with_mock_idp(mut self, idp: Arc<MockIdentityProvider>) -> Self {
        self.idp = Some(idp);
        self
    }
}

/// Builds the flow router.
///
/// `POST /mock-idp/token` is mounted only when the state carries a provider.
#[must_use]
pub fn router(state: FlowState) -> Router {
    let mut router = Router::new()
        .route("/step1/realname", post(submit_real_name_handler))
        .route("/step2/init", post(initiate_step2_handler))
        .route("/step2/callback", post(callback_handler))
        .route("/finalize", post(finalize_handler));

    if state.idp.is_some() {
        router = router.route("/mock-idp/token", post(mint_assertion_handler));
    }

    router.with_state(state)
}

/// `POST /step1/realname`
async fn submit_real_name_handler(
    State(state): State<FlowState>,
    Json(request): Json<RealNameRequest>,
) -> Result<Json<RealNameResponse>, VerifyError> {
    state.engine.submit_real_name(request).await.map(Json)
}

/// `POST /step2/init`
async fn initiate_step2_handler(
    State(state): State<FlowState>,
    Json(request): Json<InitiateStep2Request>,
) -> Result<Json<InitiateStep2Response>, VerifyError> {
    state.engine.initiate_step2(request).await.map(Json)
}

/// `POST /step2/callback`
async fn callback_handler(
    State(state): State<FlowState>,
    Json(request): Json<CallbackRequest>,
) -> Result<Json<CallbackResponse>, VerifyError> {
    state.engine.handle_callback(request).await.map(Json)
}

/// `POST /finalize`
async fn finalize_handler(
    State(state): State<FlowState>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, VerifyError> {
    state.engine.finalize(request).await.map(Json)
}

/// `POST /mock-idp/token` (development harness)
async fn mint_assertion_handler(
    State(state): State<FlowState>,
    Json(request): Json<MintAssertionRequest>,
) -> Result<Json<MintAssertionResponse>, VerifyError> {
    let Some(idp) = &state.idp else {
        return Err(VerifyError::internal("mock provider is not enabled"));
    };
    idp.mint_assertion(request).await.map(Json)
}
