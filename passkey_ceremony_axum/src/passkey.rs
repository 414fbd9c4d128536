use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Json, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    routing::post,
};

use passkey_ceremony::{
    AuthenticationOptions, AuthenticationOptionsRequest, AuthenticationVerifyRequest,
    CeremonyEngine, CeremonyError, RegistrationOptions, RegistrationOptionsRequest,
    RegistrationVerifyRequest, TokenResponse,
};

use crate::error::{ErrorResponse, IntoResponseError};

pub(crate) type EngineState = Arc<CeremonyEngine>;

pub(crate) fn router() -> Router<EngineState> {
    Router::new()
        .nest("/register", router_register())
        .nest("/authenticate", router_authenticate())
}

fn router_register() -> Router<EngineState> {
    Router::new()
        .route("/generate-options", post(handle_registration_options))
        .route("/verify", post(handle_verify_registration))
}

fn router_authenticate() -> Router<EngineState> {
    Router::new()
        .route(
            "/generate-options",
            post(handle_authentication_options_post).get(handle_authentication_options_get),
        )
        .route("/verify", post(handle_verify_authentication))
}

pub(crate) async fn handle_registration_options(
    State(engine): State<EngineState>,
    request: Result<Json<RegistrationOptionsRequest>, JsonRejection>,
) -> Result<Json<RegistrationOptions>, ErrorResponse> {
    let Json(request) = request.into_response_error()?;
    let options = engine
        .generate_registration_options(request)
        .await
        .into_response_error()?;
    Ok(Json(options))
}

pub(crate) async fn handle_verify_registration(
    State(engine): State<EngineState>,
    request: Result<Json<RegistrationVerifyRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ErrorResponse> {
    let Json(request) = request.into_response_error()?;
    let token = engine
        .verify_registration(request)
        .await
        .into_response_error()?;
    Ok(Json(token))
}

pub(crate) async fn handle_authentication_options_get(
    State(engine): State<EngineState>,
    query: Result<Query<AuthenticationOptionsRequest>, QueryRejection>,
) -> Result<Json<AuthenticationOptions>, ErrorResponse> {
    let Query(request) = query.into_response_error()?;
    authentication_options(&engine, request).await
}

/// The body is optional here: an empty POST starts an identity-less ceremony.
pub(crate) async fn handle_authentication_options_post(
    State(engine): State<EngineState>,
    body: Bytes,
) -> Result<Json<AuthenticationOptions>, ErrorResponse> {
    let request = parse_optional_body(&body).into_response_error()?;
    authentication_options(&engine, request).await
}

async fn authentication_options(
    engine: &CeremonyEngine,
    request: AuthenticationOptionsRequest,
) -> Result<Json<AuthenticationOptions>, ErrorResponse> {
    let options = engine
        .generate_authentication_options(request)
        .await
        .into_response_error()?;
    Ok(Json(options))
}

pub(crate) async fn handle_verify_authentication(
    State(engine): State<EngineState>,
    request: Result<Json<AuthenticationVerifyRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ErrorResponse> {
    let Json(request) = request.into_response_error()?;
    let token = engine
        .verify_authentication(request)
        .await
        .into_response_error()?;
    Ok(Json(token))
}

fn parse_optional_body(body: &[u8]) -> Result<AuthenticationOptionsRequest, CeremonyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AuthenticationOptionsRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| CeremonyError::InvalidRequest(e.to_string()))
}
