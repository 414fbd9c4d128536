//! Router for the WebAuthn ceremony endpoints

use std::sync::Arc;

use axum::Router;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use passkey_ceremony::CeremonyEngine;

/// Create a router for the ceremony endpoints
///
/// The endpoints will be available at:
/// - /webauthn/register/generate-options
/// - /webauthn/register/verify
/// - /webauthn/authenticate/generate-options (GET or POST)
/// - /webauthn/authenticate/verify
pub fn passkey_ceremony_router(engine: Arc<CeremonyEngine>) -> Router {
    passkey_ceremony_router_no_trace(engine).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
    )
}

/// Same as `passkey_ceremony_router()` but without the HTTP tracing middleware.
/// Use this if you want to add your own tracing middleware.
pub fn passkey_ceremony_router_no_trace(engine: Arc<CeremonyEngine>) -> Router {
    Router::new()
        .nest("/webauthn", super::passkey::router())
        .with_state(engine)
}
