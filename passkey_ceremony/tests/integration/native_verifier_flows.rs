use std::sync::Arc;

use passkey_ceremony::{
    AuthenticationOptionsRequest, CeremonyEngine, CeremonyError, NativeVerifier,
    RegistrationOptionsRequest,
};

use crate::common::{
    ANDROID_ORIGIN, AttestationFormat, ClientContext, ORIGIN, RP_ID, SoftAuthenticator, engine,
    identity,
};

fn native_engine() -> CeremonyEngine {
    engine(Arc::new(NativeVerifier::new()))
}

fn browser() -> ClientContext {
    ClientContext::new(ORIGIN, RP_ID)
}

/// Runs registration for `email` and returns the user handle.
async fn register(
    engine: &CeremonyEngine,
    authenticator: &SoftAuthenticator,
    email: &str,
    format: AttestationFormat,
) -> Result<String, CeremonyError> {
    let options = engine
        .generate_registration_options(RegistrationOptionsRequest {
            email: identity(email),
        })
        .await?;
    let request = authenticator.register(email, &options.challenge, &browser(), format);
    engine.verify_registration(request).await?;
    Ok(options.user.id)
}

async fn authenticate_as(
    engine: &CeremonyEngine,
    authenticator: &mut SoftAuthenticator,
    email: &str,
    ctx: &ClientContext,
) -> Result<String, CeremonyError> {
    let options = engine
        .generate_authentication_options(AuthenticationOptionsRequest {
            email: Some(identity(email)),
        })
        .await?;
    let request = authenticator.assert(Some(email), None, &options.challenge, None, ctx);
    Ok(engine.verify_authentication(request).await?.token)
}

/// Test a complete passkey lifecycle with real signatures
///
/// This test verifies that a P-256 credential registered with `none`
/// attestation can then authenticate, and that the issued token validates
/// and names the registered identity.
#[tokio::test]
async fn test_register_then_authenticate_with_es256() {
    let engine = native_engine();
    let mut authenticator = SoftAuthenticator::new(1);

    register(
        &engine,
        &authenticator,
        "alice@example.com",
        AttestationFormat::None,
    )
    .await
    .expect("registration verified");

    let token = authenticate_as(&engine, &mut authenticator, "alice@example.com", &browser())
        .await
        .expect("authentication verified");

    let claims = engine.token_issuer().verify(&token).unwrap();
    assert_eq!(claims.email, "alice@example.com");
    assert!(claims.exp > claims.iat);

    let user = engine
        .credential_store()
        .get_user(&identity("alice@example.com"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.authenticators[0].sign_count, 1);
    assert_eq!(
        user.authenticators[0].credential_id.to_base64url(),
        authenticator.credential_id()
    );
}

#[tokio::test]
async fn test_packed_self_attestation() {
    let engine = native_engine();
    let mut authenticator = SoftAuthenticator::new(1);

    register(
        &engine,
        &authenticator,
        "alice@example.com",
        AttestationFormat::PackedSelf,
    )
    .await
    .expect("packed self attestation accepted");

    authenticate_as(&engine, &mut authenticator, "alice@example.com", &browser())
        .await
        .expect("authentication verified");
}

/// Test discoverable-credential sign in with the native verifier
///
/// This test verifies that an identity-less ceremony finds the credential's
/// owner and signs them in when the authenticator returns the user handle
/// minted at registration.
#[tokio::test]
async fn test_discoverable_credential_sign_in() {
    let engine = native_engine();
    let mut authenticator = SoftAuthenticator::new(1);
    let user_handle = register(
        &engine,
        &authenticator,
        "bob@example.com",
        AttestationFormat::None,
    )
    .await
    .unwrap();

    let options = engine
        .generate_authentication_options(AuthenticationOptionsRequest::default())
        .await
        .unwrap();
    let request = authenticator.assert(
        None,
        options.auth_id.as_deref(),
        &options.challenge,
        Some(&user_handle),
        &browser(),
    );
    let response = engine.verify_authentication(request).await.unwrap();

    let claims = engine.token_issuer().verify(&response.token).unwrap();
    assert_eq!(claims.email, "bob@example.com");
}

#[tokio::test]
async fn test_registration_from_wrong_origin() {
    let engine = native_engine();
    let authenticator = SoftAuthenticator::new(1);
    let options = engine
        .generate_registration_options(RegistrationOptionsRequest {
            email: identity("alice@example.com"),
        })
        .await
        .unwrap();

    let ctx = ClientContext::new("https://evil.example.net", RP_ID);
    let request = authenticator.register(
        "alice@example.com",
        &options.challenge,
        &ctx,
        AttestationFormat::None,
    );
    let result = engine.verify_registration(request).await;

    assert_eq!(result.unwrap_err(), CeremonyError::VerificationFailed);
}

#[tokio::test]
async fn test_registration_for_wrong_rp_id() {
    let engine = native_engine();
    let authenticator = SoftAuthenticator::new(1);
    let options = engine
        .generate_registration_options(RegistrationOptionsRequest {
            email: identity("alice@example.com"),
        })
        .await
        .unwrap();

    let ctx = ClientContext::new(ORIGIN, "other.example.org");
    let request = authenticator.register(
        "alice@example.com",
        &options.challenge,
        &ctx,
        AttestationFormat::None,
    );

    assert_eq!(
        engine.verify_registration(request).await.unwrap_err(),
        CeremonyError::VerificationFailed
    );
}

#[tokio::test]
async fn test_registration_without_user_verification() {
    let engine = native_engine();
    let authenticator = SoftAuthenticator::new(1);
    let options = engine
        .generate_registration_options(RegistrationOptionsRequest {
            email: identity("alice@example.com"),
        })
        .await
        .unwrap();

    let mut ctx = browser();
    ctx.user_verified = false;
    let request = authenticator.register(
        "alice@example.com",
        &options.challenge,
        &ctx,
        AttestationFormat::None,
    );

    assert_eq!(
        engine.verify_registration(request).await.unwrap_err(),
        CeremonyError::VerificationFailed
    );
}

#[tokio::test]
async fn test_android_app_origin_is_accepted() {
    let engine = native_engine();
    let mut authenticator = SoftAuthenticator::new(1);
    register(
        &engine,
        &authenticator,
        "alice@example.com",
        AttestationFormat::None,
    )
    .await
    .unwrap();

    let ctx = ClientContext::new(ANDROID_ORIGIN, RP_ID);
    authenticate_as(&engine, &mut authenticator, "alice@example.com", &ctx)
        .await
        .expect("android origin accepted");
}

#[tokio::test]
async fn test_assertion_with_tampered_signature() {
    let engine = native_engine();
    let mut authenticator = SoftAuthenticator::new(1);
    register(
        &engine,
        &authenticator,
        "alice@example.com",
        AttestationFormat::None,
    )
    .await
    .unwrap();

    let options = engine
        .generate_authentication_options(AuthenticationOptionsRequest {
            email: Some(identity("alice@example.com")),
        })
        .await
        .unwrap();
    let mut request = authenticator.assert(
        Some("alice@example.com"),
        None,
        &options.challenge,
        None,
        &browser(),
    );
    // Signature of a different challenge
    let other = authenticator.assert(
        Some("alice@example.com"),
        None,
        "c29tZS1vdGhlci1jaGFsbGVuZ2U",
        None,
        &browser(),
    );
    request.credential.response.signature = other.credential.response.signature;

    assert_eq!(
        engine.verify_authentication(request).await.unwrap_err(),
        CeremonyError::VerificationFailed
    );
}

#[tokio::test]
async fn test_assertion_signed_by_a_different_key() {
    let engine = native_engine();
    let alice_key = SoftAuthenticator::new(1);
    let mut impostor = SoftAuthenticator::new(1);
    register(&engine, &alice_key, "alice@example.com", AttestationFormat::None)
        .await
        .unwrap();

    let options = engine
        .generate_authentication_options(AuthenticationOptionsRequest {
            email: Some(identity("alice@example.com")),
        })
        .await
        .unwrap();
    let mut request = impostor.assert(
        Some("alice@example.com"),
        None,
        &options.challenge,
        None,
        &browser(),
    );
    // Claim alice's credential id
    let alice_id = alice_key.credential_id();
    request.credential.id = alice_id.clone();
    request.credential.raw_id = passkey_ceremony::CredentialId::from_base64url(&alice_id).unwrap();

    assert_eq!(
        engine.verify_authentication(request).await.unwrap_err(),
        CeremonyError::VerificationFailed
    );
}

/// Test cloned authenticator detection with real signatures
///
/// This test verifies that a validly signed assertion whose counter does not
/// advance past the stored value is refused as a possible clone.
#[tokio::test]
async fn test_rewound_counter_is_flagged() {
    let engine = native_engine();
    let mut authenticator = SoftAuthenticator::new(1);
    register(
        &engine,
        &authenticator,
        "alice@example.com",
        AttestationFormat::None,
    )
    .await
    .unwrap();

    for _ in 0..3 {
        authenticate_as(&engine, &mut authenticator, "alice@example.com", &browser())
            .await
            .unwrap();
    }

    // A copy of the key that has only seen the first sign in
    authenticator.set_counter(0);
    let result =
        authenticate_as(&engine, &mut authenticator, "alice@example.com", &browser()).await;

    assert_eq!(
        result.unwrap_err(),
        CeremonyError::PossibleClonedAuthenticator {
            stored: 3,
            received: 1
        }
    );
}

#[tokio::test]
async fn test_counterless_authenticator() {
    let engine = native_engine();
    let mut authenticator = SoftAuthenticator::new(0);
    register(
        &engine,
        &authenticator,
        "alice@example.com",
        AttestationFormat::None,
    )
    .await
    .unwrap();

    for _ in 0..2 {
        authenticate_as(&engine, &mut authenticator, "alice@example.com", &browser())
            .await
            .expect("zero counter accepted");
    }
}
