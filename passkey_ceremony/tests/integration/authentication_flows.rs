use std::sync::Arc;

use tracing::Level;

use passkey_ceremony::{
    AuthenticationOptionsRequest, CeremonyConfig, CeremonyEngine, CeremonyError, CredentialId,
    RegistrationOptionsRequest,
};

use crate::common::{
    CounterFailingStore, LogCapture, Outcome, RP_ID, ScriptedVerifier, authentication_request,
    engine, engine_with_store, identity, registration_request,
};

/// Registers `email` with a single credential and returns its user handle.
async fn register(engine: &CeremonyEngine, email: &str, credential_id: &str) -> String {
    let options = engine
        .generate_registration_options(RegistrationOptionsRequest {
            email: identity(email),
        })
        .await
        .expect("registration options");
    engine
        .verify_registration(registration_request(
            email,
            credential_id,
            &options.challenge,
            "unused",
            &["usb", "nfc"],
        ))
        .await
        .expect("registration verified");
    options.user.id
}

async fn options_for(engine: &CeremonyEngine, email: Option<&str>) -> (String, Option<String>) {
    let options = engine
        .generate_authentication_options(AuthenticationOptionsRequest {
            email: email.map(identity),
        })
        .await
        .expect("authentication options");
    (options.challenge, options.auth_id)
}

/// Assertion body with the scripted verifier's challenge echo.
fn assertion(
    email: Option<&str>,
    auth_id: Option<&str>,
    credential_id: &str,
    challenge: &str,
    user_handle: Option<&str>,
) -> passkey_ceremony::AuthenticationVerifyRequest {
    authentication_request(
        email,
        auth_id,
        credential_id,
        challenge,
        "unused",
        "unused",
        user_handle,
    )
}

/// Test identity-bound authentication
///
/// This test verifies that options for a registered identity list its
/// credentials with their transports, and that answering the challenge with
/// an advancing counter yields a token and persists the new counter.
#[tokio::test]
async fn test_identity_bound_authentication() {
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine(verifier.clone());
    register(&engine, "alice@example.com", "AQIDBA").await;

    // Given authentication options for alice
    let options = engine
        .generate_authentication_options(AuthenticationOptionsRequest {
            email: Some(identity("alice@example.com")),
        })
        .await
        .unwrap();

    assert_eq!(options.rp_id, RP_ID);
    assert_eq!(options.user_verification, "preferred");
    assert_eq!(options.timeout, 60_000);
    assert!(options.auth_id.is_none());
    assert_eq!(options.allow_credentials.len(), 1);
    assert_eq!(
        options.allow_credentials[0].id,
        CredentialId::new(vec![1, 2, 3, 4])
    );
    assert_eq!(options.allow_credentials[0].transports, vec!["usb", "nfc"]);

    // When the authenticator answers with counter 1
    verifier.set_assertion_counter(1);
    let response = engine
        .verify_authentication(assertion(
            Some("alice@example.com"),
            None,
            "AQIDBA",
            &options.challenge,
            None,
        ))
        .await
        .expect("authentication verified");

    // Then a token is issued and the counter is stored
    let claims = engine.token_issuer().verify(&response.token).unwrap();
    assert_eq!(claims.email, "alice@example.com");

    let user = engine
        .credential_store()
        .get_user(&identity("alice@example.com"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.authenticators[0].sign_count, 1);
}

#[tokio::test]
async fn test_options_serialize_allow_credentials_in_browser_shape() {
    let engine = engine(Arc::new(ScriptedVerifier::new()));
    register(&engine, "alice@example.com", "AQIDBA").await;

    let options = engine
        .generate_authentication_options(AuthenticationOptionsRequest {
            email: Some(identity("alice@example.com")),
        })
        .await
        .unwrap();
    let json = serde_json::to_value(&options).unwrap();

    assert_eq!(json["rpId"], RP_ID);
    assert_eq!(json["userVerification"], "preferred");
    assert_eq!(json["allowCredentials"][0]["type"], "public-key");
    assert_eq!(json["allowCredentials"][0]["id"], "AQIDBA");
    assert!(json.get("authId").is_none());
}

/// Test discoverable-credential authentication
///
/// This test verifies that options without an identity carry an opaque
/// authId and an empty allow list, and that the credential's owner is found
/// from the credential id once the returned user handle matches.
#[tokio::test]
async fn test_identity_less_authentication_with_user_handle() {
    let engine = engine(Arc::new(ScriptedVerifier::new()));
    let user_handle = register(&engine, "bob@example.com", "Ym9i").await;

    let options = engine
        .generate_authentication_options(AuthenticationOptionsRequest::default())
        .await
        .unwrap();
    assert!(options.allow_credentials.is_empty());
    let auth_id = options.auth_id.clone().expect("auth id for identity-less options");

    let response = engine
        .verify_authentication(assertion(
            None,
            Some(&auth_id),
            "Ym9i",
            &options.challenge,
            Some(&user_handle),
        ))
        .await
        .expect("authentication verified");

    let claims = engine.token_issuer().verify(&response.token).unwrap();
    assert_eq!(claims.email, "bob@example.com");
}

#[tokio::test]
async fn test_identity_less_authentication_requires_user_handle() {
    let engine = engine(Arc::new(ScriptedVerifier::new()));
    register(&engine, "bob@example.com", "Ym9i").await;
    let (challenge, auth_id) = options_for(&engine, None).await;
    let auth_id = auth_id.unwrap();

    let result = engine
        .verify_authentication(assertion(None, Some(&auth_id), "Ym9i", &challenge, None))
        .await;

    assert_eq!(result.unwrap_err(), CeremonyError::VerificationFailed);
}

#[tokio::test]
async fn test_mismatched_user_handle_is_rejected() {
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine(verifier.clone());
    register(&engine, "bob@example.com", "Ym9i").await;
    let (challenge, auth_id) = options_for(&engine, None).await;

    let result = engine
        .verify_authentication(assertion(
            None,
            auth_id.as_deref(),
            "Ym9i",
            &challenge,
            Some("c29tZW9uZS1lbHNl"),
        ))
        .await;

    assert_eq!(result.unwrap_err(), CeremonyError::VerificationFailed);
    // Rejected before the verifier is asked
    assert_eq!(verifier.calls(), 1);
}

#[tokio::test]
async fn test_neither_email_nor_auth_id() {
    let engine = engine(Arc::new(ScriptedVerifier::new()));
    register(&engine, "alice@example.com", "AQIDBA").await;

    let result = engine
        .verify_authentication(assertion(None, None, "AQIDBA", "whatever", None))
        .await;

    assert!(matches!(result, Err(CeremonyError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_options_for_unknown_identity() {
    let engine = engine(Arc::new(ScriptedVerifier::new()));

    let result = engine
        .generate_authentication_options(AuthenticationOptionsRequest {
            email: Some(identity("nobody@example.com")),
        })
        .await;

    assert_eq!(result.unwrap_err(), CeremonyError::UnknownCredential);
}

#[tokio::test]
async fn test_assertion_for_unregistered_credential() {
    let engine = engine(Arc::new(ScriptedVerifier::new()));
    register(&engine, "alice@example.com", "AQIDBA").await;
    let (challenge, auth_id) = options_for(&engine, None).await;

    let result = engine
        .verify_authentication(assertion(
            None,
            auth_id.as_deref(),
            "bm90LXJlZ2lzdGVyZWQ",
            &challenge,
            Some("AAAA"),
        ))
        .await;

    assert_eq!(result.unwrap_err(), CeremonyError::UnknownCredential);
}

/// Test that a credential cannot be used for another identity
///
/// This test verifies that bob's credential presented in a ceremony started
/// for alice is treated as unknown to alice.
#[tokio::test]
async fn test_credential_of_another_identity() {
    let engine = engine(Arc::new(ScriptedVerifier::new()));
    register(&engine, "alice@example.com", "YWxpY2U").await;
    register(&engine, "bob@example.com", "Ym9i").await;
    let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;

    let result = engine
        .verify_authentication(assertion(
            Some("alice@example.com"),
            None,
            "Ym9i",
            &challenge,
            None,
        ))
        .await;

    assert_eq!(result.unwrap_err(), CeremonyError::UnknownCredential);
}

#[tokio::test]
async fn test_authentication_challenge_is_single_use() {
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine(verifier.clone());
    register(&engine, "alice@example.com", "AQIDBA").await;
    let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;
    let request = assertion(
        Some("alice@example.com"),
        None,
        "AQIDBA",
        &challenge,
        None,
    );

    verifier.set_assertion_counter(1);
    engine.verify_authentication(request.clone()).await.unwrap();
    verifier.set_assertion_counter(2);
    let replay = engine.verify_authentication(request).await;

    assert_eq!(replay.unwrap_err(), CeremonyError::InvalidOrExpiredChallenge);
}

/// Test signature counter enforcement
///
/// This test verifies that a counter equal to or below the stored value is
/// reported as a possible clone and leaves the stored counter untouched.
#[tokio::test]
async fn test_counter_regression_flags_possible_clone() {
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine(verifier.clone());
    register(&engine, "alice@example.com", "AQIDBA").await;

    // Given a stored counter of 5
    verifier.set_assertion_counter(5);
    let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;
    engine
        .verify_authentication(assertion(
            Some("alice@example.com"),
            None,
            "AQIDBA",
            &challenge,
            None,
        ))
        .await
        .unwrap();

    for counter in [5, 3] {
        // When an assertion reports the same or a lower counter
        verifier.set_assertion_counter(counter);
        let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;
        let result = engine
            .verify_authentication(assertion(
                Some("alice@example.com"),
                None,
                "AQIDBA",
                &challenge,
                None,
            ))
            .await;

        // Then it is rejected as a possible clone
        assert_eq!(
            result.unwrap_err(),
            CeremonyError::PossibleClonedAuthenticator {
                stored: 5,
                received: counter
            }
        );
    }

    let user = engine
        .credential_store()
        .get_user(&identity("alice@example.com"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.authenticators[0].sign_count, 5);
}

#[tokio::test]
async fn test_zero_counter_authenticator_is_accepted_repeatedly() {
    let capture = LogCapture::new();
    let _guard = capture.install();
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine(verifier.clone());
    register(&engine, "alice@example.com", "AQIDBA").await;

    for _ in 0..3 {
        let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;
        engine
            .verify_authentication(assertion(
                Some("alice@example.com"),
                None,
                "AQIDBA",
                &challenge,
                None,
            ))
            .await
            .expect("zero counter accepted");
    }

    // Each acceptance without a counter leaves a tagged warning behind.
    let warnings = capture.security_events("counterless_authenticator");
    assert_eq!(warnings.len(), 3);
    assert!(warnings.iter().all(|event| event.level == Level::WARN));
}

#[tokio::test]
async fn test_zero_counter_after_nonzero_is_rejected() {
    let capture = LogCapture::new();
    let _guard = capture.install();
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine(verifier.clone());
    register(&engine, "alice@example.com", "AQIDBA").await;

    verifier.set_assertion_counter(2);
    let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;
    engine
        .verify_authentication(assertion(
            Some("alice@example.com"),
            None,
            "AQIDBA",
            &challenge,
            None,
        ))
        .await
        .unwrap();

    verifier.set_assertion_counter(0);
    let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;
    let result = engine
        .verify_authentication(assertion(
            Some("alice@example.com"),
            None,
            "AQIDBA",
            &challenge,
            None,
        ))
        .await;

    assert!(matches!(
        result,
        Err(CeremonyError::PossibleClonedAuthenticator { stored: 2, received: 0 })
    ));
    assert!(capture.security_events("counterless_authenticator").is_empty());
    let clones = capture.security_events("possible_cloned_authenticator");
    assert_eq!(clones.len(), 1);
    assert_eq!(clones[0].level, Level::WARN);
}

#[tokio::test]
async fn test_unverified_assertion() {
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine(verifier.clone());
    register(&engine, "alice@example.com", "AQIDBA").await;
    verifier.set_outcome(Outcome::NotVerified);
    let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;

    let result = engine
        .verify_authentication(assertion(
            Some("alice@example.com"),
            None,
            "AQIDBA",
            &challenge,
            None,
        ))
        .await;

    assert_eq!(result.unwrap_err(), CeremonyError::VerificationFailed);
}

/// Test a store failure while recording the new signature counter
///
/// This test verifies that no token is issued, the error is retryable, and
/// the challenge stays spent so the same assertion cannot be replayed.
#[tokio::test]
async fn test_counter_update_failure_is_store_unavailable() {
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine_with_store(
        verifier.clone(),
        CeremonyConfig::default(),
        Arc::new(CounterFailingStore::new()),
    );
    register(&engine, "alice@example.com", "AQIDBA").await;
    verifier.set_assertion_counter(1);
    let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;
    let request = || {
        assertion(
            Some("alice@example.com"),
            None,
            "AQIDBA",
            &challenge,
            None,
        )
    };

    let error = engine
        .verify_authentication(request())
        .await
        .expect_err("no token without a stored counter");
    assert!(matches!(error, CeremonyError::StoreUnavailable(_)));
    assert!(error.is_retryable());

    let retry = engine.verify_authentication(request()).await;
    assert_eq!(retry.unwrap_err(), CeremonyError::InvalidOrExpiredChallenge);

    let user = engine
        .credential_store()
        .get_user(&identity("alice@example.com"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.authenticators[0].sign_count, 0);
}

/// Test the log left behind when the verifier rejects an assertion
///
/// This test verifies that the rejection is logged at `warn` with the
/// identity and credential id, so the event can be attributed.
#[tokio::test]
async fn test_verifier_rejection_log_names_identity_and_credential() {
    let capture = LogCapture::new();
    let _guard = capture.install();
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine(verifier.clone());
    register(&engine, "alice@example.com", "AQIDBA").await;
    verifier.set_outcome(Outcome::Error);
    let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;

    let result = engine
        .verify_authentication(assertion(
            Some("alice@example.com"),
            None,
            "AQIDBA",
            &challenge,
            None,
        ))
        .await;
    assert_eq!(result.unwrap_err(), CeremonyError::VerificationFailed);

    let rejections = capture.with_message("Verifier rejected response");
    assert_eq!(rejections.len(), 1);
    let event = &rejections[0];
    assert_eq!(event.level, Level::WARN);
    assert_eq!(event.field("identity"), Some("alice@example.com"));
    assert_eq!(event.field("credential_id"), Some("AQIDBA"));
    assert_eq!(
        event.field("error"),
        Some("Signature error: scripted failure")
    );
}

/// Test concurrent submissions of one assertion
///
/// This test verifies that when the same response is submitted twice at
/// once, exactly one submission succeeds and the other finds the challenge
/// already consumed.
#[tokio::test]
async fn test_concurrent_verification_has_single_winner() {
    let verifier = Arc::new(ScriptedVerifier::new());
    let engine = engine(verifier.clone());
    register(&engine, "alice@example.com", "AQIDBA").await;
    verifier.set_assertion_counter(1);
    let (challenge, _) = options_for(&engine, Some("alice@example.com")).await;
    let request = assertion(
        Some("alice@example.com"),
        None,
        "AQIDBA",
        &challenge,
        None,
    );

    let (first, second) = tokio::join!(
        engine.verify_authentication(request.clone()),
        engine.verify_authentication(request)
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| r == &Err(CeremonyError::InvalidOrExpiredChallenge))
    );
}

#[tokio::test]
async fn test_identity_and_auth_id_challenges_are_separate() {
    let engine = engine(Arc::new(ScriptedVerifier::new()));
    let user_handle = register(&engine, "alice@example.com", "AQIDBA").await;

    // Challenge issued for an identity-less ceremony
    let (challenge, auth_id) = options_for(&engine, None).await;

    // Answered as if it were the identity-bound ceremony
    let result = engine
        .verify_authentication(assertion(
            Some("alice@example.com"),
            None,
            "AQIDBA",
            &challenge,
            Some(&user_handle),
        ))
        .await;
    assert_eq!(result.unwrap_err(), CeremonyError::InvalidOrExpiredChallenge);

    // The session-bound challenge is still pending
    let result = engine
        .verify_authentication(assertion(
            None,
            auth_id.as_deref(),
            "AQIDBA",
            &challenge,
            Some(&user_handle),
        ))
        .await;
    assert!(result.is_ok());
}
