//! End-to-end flow tests against the engine with in-memory backends.

use std::sync::Arc;
use std::time::Duration;

use stepgate_engine::prelude::*;
use stepgate_engine::PROVIDER_ISSUER;

struct Harness {
    engine: FlowEngine,
    idp: MockIdentityProvider,
    /// Provider-side token service, for forging assertions in tests.
    assertions: Arc<TokenService>,
    /// Credential-side token service, for inspecting issued credentials.
    credentials: Arc<TokenService>,
    config: EngineConfig,
}

fn harness_with_config(config: EngineConfig) -> Harness {
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let jtis: Arc<dyn JtiStore> = Arc::new(InMemoryJtiStore::new());
    let credentials = Arc::new(TokenService::new(
        &SigningSecret::generate(),
        config.issuer.clone(),
    ));
    let assertions = Arc::new(TokenService::new(
        &SigningSecret::generate(),
        PROVIDER_ISSUER,
    ));

    let engine = FlowEngine::new(
        config.clone(),
        Arc::clone(&sessions),
        jtis,
        Arc::clone(&credentials),
        Arc::clone(&assertions),
    );
    let idp = MockIdentityProvider::new(
        sessions,
        Arc::clone(&assertions),
        config.assertion_ttl,
        config.issuer.clone(),
    );

    Harness {
        engine,
        idp,
        assertions,
        credentials,
        config,
    }
}

fn harness() -> Harness {
    harness_with_config(EngineConfig::default())
}

fn kim() -> RealNameRequest {
    RealNameRequest {
        name: "Kim".to_string(),
        id_number: "900101-1234567".to_string(),
    }
}

/// Pulls the `state` query parameter out of an authorization URL, the way a
/// relying client would before contacting the provider.
fn state_from_auth_url(auth_url: &str) -> String {
    auth_url
        .split("state=")
        .nth(1)
        .expect("authUrl carries state")
        .split('&')
        .next()
        .unwrap()
        .to_string()
}

/// Drives a flow through step 1 and step 2 initiation.
async fn initiated_flow(harness: &Harness) -> (String, InitiateStep2Response, String) {
    let sid = harness
        .engine
        .submit_real_name(kim())
        .await
        .expect("step 1 should pass")
        .sid;

    let init = harness
        .engine
        .initiate_step2(InitiateStep2Request { sid: sid.clone() })
        .await
        .expect("step 2 initiation should pass");

    let state = state_from_auth_url(&init.auth_url);
    (sid, init, state)
}

#[tokio::test]
async fn scenario_a_happy_path_issues_credential_for_step1_subject() {
    let harness = harness();
    let (sid, init, state) = initiated_flow(&harness).await;

    let minted = harness
        .idp
        .mint_assertion(MintAssertionRequest {
            name: "Kim".to_string(),
            id_number: "900101-1234567".to_string(),
            nonce: init.nonce.clone(),
            request_id: init.request_id.clone(),
            state: state.clone(),
        })
        .await
        .expect("provider should assert the step-1 subject");

    let callback = harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id.clone(),
            state,
            idp_token: minted.idp_token,
        })
        .await
        .expect("callback should pass every check");
    assert!(callback.success);
    assert_eq!(callback.sid, sid);

    let finalized = harness
        .engine
        .finalize(FinalizeRequest { sid: sid.clone() })
        .await
        .expect("finalize should issue the credential");
    assert!(finalized.success);

    let claims = harness
        .credentials
        .verify::<CredentialClaims>(&finalized.token)
        .expect("credential should verify");
    assert_eq!(claims.payload.sid, sid);
    assert_eq!(claims.payload.name, "Kim");
    assert_eq!(claims.payload.id_number, "900101-1000000");
    assert!(claims.payload.verified);
    assert_eq!(claims.payload.auth_level, AUTH_LEVEL_STEP_UP);
    assert_eq!(claims.exp, claims.iat + 3600);
}

#[tokio::test]
async fn scenario_b_mismatched_identity_is_rejected_and_session_unchanged() {
    let harness = harness();
    let (sid, init, state) = initiated_flow(&harness).await;

    // A forged assertion for a different subject; the mock provider itself
    // would refuse to mint this.
    let forged = harness
        .assertions
        .issue(
            AssertionClaims {
                name: "Lee".to_string(),
                id_number: "900101-1234567".to_string(),
                nonce: init.nonce.clone(),
                aud: harness.config.issuer.clone(),
            },
            harness.config.assertion_ttl,
        )
        .unwrap();

    let result = harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id.clone(),
            state: state.clone(),
            idp_token: forged,
        })
        .await;
    assert!(matches!(result, Err(VerifyError::IdentityMismatch)));

    // The session must not have advanced: finalize refuses it.
    let result = harness
        .engine
        .finalize(FinalizeRequest { sid: sid.clone() })
        .await;
    assert!(matches!(result, Err(VerifyError::SessionNotFound { .. })));

    // It is still waiting at step-2, so a correct assertion can complete it.
    let minted = harness
        .idp
        .mint_assertion(MintAssertionRequest {
            name: "Kim".to_string(),
            id_number: "900101-1234567".to_string(),
            nonce: init.nonce.clone(),
            request_id: init.request_id.clone(),
            state: state.clone(),
        })
        .await
        .unwrap();
    harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id,
            state,
            idp_token: minted.idp_token,
        })
        .await
        .expect("a correct assertion should still complete the flow");
}

#[tokio::test]
async fn scenario_c_replayed_assertion_is_rejected() {
    let harness = harness();
    let (_sid, init, state) = initiated_flow(&harness).await;

    // An assertion carrying the wrong nonce: its jti is consumed during the
    // failed first attempt, so presenting it again is a replay.
    let stale_nonce = harness
        .assertions
        .issue(
            AssertionClaims {
                name: "Kim".to_string(),
                id_number: "900101-1234567".to_string(),
                nonce: "not-the-session-nonce".to_string(),
                aud: harness.config.issuer.clone(),
            },
            harness.config.assertion_ttl,
        )
        .unwrap();

    let first = harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id.clone(),
            state: state.clone(),
            idp_token: stale_nonce.clone(),
        })
        .await;
    assert!(matches!(first, Err(VerifyError::NonceMismatch)));

    let second = harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id,
            state,
            idp_token: stale_nonce,
        })
        .await;
    assert!(matches!(second, Err(VerifyError::ReplayDetected)));
}

#[tokio::test]
async fn callback_after_success_cannot_rerun() {
    let harness = harness();
    let (_sid, init, state) = initiated_flow(&harness).await;

    let minted = harness
        .idp
        .mint_assertion(MintAssertionRequest {
            name: "Kim".to_string(),
            id_number: "900101-1234567".to_string(),
            nonce: init.nonce.clone(),
            request_id: init.request_id.clone(),
            state: state.clone(),
        })
        .await
        .unwrap();

    harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id.clone(),
            state: state.clone(),
            idp_token: minted.idp_token.clone(),
        })
        .await
        .unwrap();

    // The session has advanced past step 2, so the step guard fires before
    // any token inspection.
    let replay = harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id,
            state,
            idp_token: minted.idp_token,
        })
        .await;
    assert!(matches!(replay, Err(VerifyError::SessionNotFound { .. })));
}

#[tokio::test]
async fn scenario_d_finalize_twice_fails() {
    let harness = harness();
    let (sid, init, state) = initiated_flow(&harness).await;

    let minted = harness
        .idp
        .mint_assertion(MintAssertionRequest {
            name: "Kim".to_string(),
            id_number: "900101-1234567".to_string(),
            nonce: init.nonce.clone(),
            request_id: init.request_id.clone(),
            state: state.clone(),
        })
        .await
        .unwrap();
    harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id,
            state,
            idp_token: minted.idp_token,
        })
        .await
        .unwrap();

    harness
        .engine
        .finalize(FinalizeRequest { sid: sid.clone() })
        .await
        .unwrap();

    // The session was deleted on the first finalize.
    let again = harness.engine.finalize(FinalizeRequest { sid }).await;
    assert!(matches!(again, Err(VerifyError::SessionNotFound { .. })));
}

#[tokio::test]
async fn step1_rejects_malformed_input() {
    let harness = harness();

    for (name, id_number) in [
        ("", "900101-1234567"),
        ("Kim", ""),
        ("Kim", "900101-123456"),
        ("Kim", "9001011234567"),
        ("Kim", "900101-12345ab"),
    ] {
        let result = harness
            .engine
            .submit_real_name(RealNameRequest {
                name: name.to_string(),
                id_number: id_number.to_string(),
            })
            .await;
        assert!(
            matches!(result, Err(VerifyError::Validation { .. })),
            "{name:?}/{id_number:?} should fail validation"
        );
    }
}

#[tokio::test]
async fn step2_requires_step1() {
    let harness = harness();

    let result = harness
        .engine
        .initiate_step2(InitiateStep2Request {
            sid: "no-such-session".to_string(),
        })
        .await;
    assert!(matches!(result, Err(VerifyError::SessionNotFound { .. })));

    // Initiating twice moves past Step1Done, so the second call refuses.
    let (sid, _init, _state) = initiated_flow(&harness).await;
    let again = harness
        .engine
        .initiate_step2(InitiateStep2Request { sid })
        .await;
    assert!(matches!(again, Err(VerifyError::SessionNotFound { .. })));
}

#[tokio::test]
async fn callback_rejects_wrong_state() {
    let harness = harness();
    let (_sid, init, state) = initiated_flow(&harness).await;

    let minted = harness
        .idp
        .mint_assertion(MintAssertionRequest {
            name: "Kim".to_string(),
            id_number: "900101-1234567".to_string(),
            nonce: init.nonce.clone(),
            request_id: init.request_id.clone(),
            state,
        })
        .await
        .unwrap();

    let result = harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id,
            state: "wrong-state".to_string(),
            idp_token: minted.idp_token,
        })
        .await;
    assert!(matches!(result, Err(VerifyError::StateMismatch)));
}

#[tokio::test]
async fn callback_rejects_tampered_assertion() {
    let harness = harness();
    let (_sid, init, state) = initiated_flow(&harness).await;

    let minted = harness
        .idp
        .mint_assertion(MintAssertionRequest {
            name: "Kim".to_string(),
            id_number: "900101-1234567".to_string(),
            nonce: init.nonce.clone(),
            request_id: init.request_id.clone(),
            state: state.clone(),
        })
        .await
        .unwrap();

    // Flip a character in the signature segment.
    let mut tampered = minted.idp_token.clone();
    let flipped = if tampered.ends_with('A') { 'B' } else { 'A' };
    tampered.pop();
    tampered.push(flipped);

    let result = harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id,
            state,
            idp_token: tampered,
        })
        .await;
    assert!(matches!(result, Err(VerifyError::SignatureInvalid)));
}

#[tokio::test]
async fn mock_provider_refuses_to_assert_another_subject() {
    let harness = harness();
    let (_sid, init, state) = initiated_flow(&harness).await;

    let result = harness
        .idp
        .mint_assertion(MintAssertionRequest {
            name: "Lee".to_string(),
            id_number: "900101-1234567".to_string(),
            nonce: init.nonce,
            request_id: init.request_id,
            state,
        })
        .await;
    assert!(matches!(result, Err(VerifyError::IdentityMismatch)));
}

#[tokio::test]
async fn expired_session_is_unreachable() {
    let config = EngineConfig {
        session_ttl: Duration::from_millis(1),
        ..EngineConfig::default()
    };
    let harness = harness_with_config(config);

    let sid = harness.engine.submit_real_name(kim()).await.unwrap().sid;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = harness
        .engine
        .initiate_step2(InitiateStep2Request { sid })
        .await;
    assert!(matches!(result, Err(VerifyError::SessionNotFound { .. })));
}

#[tokio::test]
async fn binding_toggle_off_reproduces_vulnerable_acceptance() {
    // Deliberately weakened configuration for security exercises: the
    // callback accepts a mismatched subject, and the credential still goes
    // to the step-1 identity.
    let config = EngineConfig {
        enforce_identity_binding: false,
        ..EngineConfig::default()
    };
    let harness = harness_with_config(config);
    let (sid, init, state) = initiated_flow(&harness).await;

    let forged = harness
        .assertions
        .issue(
            AssertionClaims {
                name: "Lee".to_string(),
                id_number: "851230-2987654".to_string(),
                nonce: init.nonce.clone(),
                aud: harness.config.issuer.clone(),
            },
            harness.config.assertion_ttl,
        )
        .unwrap();

    let callback = harness
        .engine
        .handle_callback(CallbackRequest {
            request_id: init.request_id,
            state,
            idp_token: forged,
        })
        .await
        .expect("weakened engine accepts the mismatch");
    assert!(callback.success);

    let finalized = harness
        .engine
        .finalize(FinalizeRequest { sid })
        .await
        .unwrap();
    let claims = harness
        .credentials
        .verify::<CredentialClaims>(&finalized.token)
        .unwrap();
    // Even the weakened engine credentials the step-1 subject.
    assert_eq!(claims.payload.name, "Kim");
}
