use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use passkey_ceremony::CeremonyError;

/// JSON body of every error response. The message names the error kind only,
/// never the check that failed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
}

pub type ErrorResponse = (StatusCode, Json<ErrorBody>);

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, ErrorResponse>;
}

fn status_and_message(error: &CeremonyError) -> (StatusCode, &'static str) {
    match error {
        CeremonyError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        CeremonyError::IdentityAlreadyRegistered => (StatusCode::CONFLICT, "User already exists"),
        CeremonyError::CredentialIdCollision => {
            (StatusCode::CONFLICT, "Credential already registered")
        }
        CeremonyError::UnknownCredential => (StatusCode::NOT_FOUND, "Unknown credential"),
        CeremonyError::InvalidOrExpiredChallenge
        | CeremonyError::VerificationFailed
        | CeremonyError::PossibleClonedAuthenticator { .. } => {
            (StatusCode::UNAUTHORIZED, "Verification failed")
        }
        CeremonyError::StoreUnavailable(_) | CeremonyError::VerifierTimeout => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
        ),
        CeremonyError::Token(_) | CeremonyError::Config(_) | CeremonyError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> ErrorResponse {
    (
        status,
        Json(ErrorBody {
            message: message.to_string(),
        }),
    )
}

/// Implementation for CeremonyError to map variants to appropriate status codes
impl<T> IntoResponseError<T> for Result<T, CeremonyError> {
    fn into_response_error(self) -> Result<T, ErrorResponse> {
        self.map_err(|e| {
            let (status, message) = status_and_message(&e);
            tracing::debug!(error = %e, %status, "Ceremony request failed");
            error_response(status, message)
        })
    }
}

/// Malformed JSON bodies are plain client errors
impl<T> IntoResponseError<T> for Result<T, JsonRejection> {
    fn into_response_error(self) -> Result<T, ErrorResponse> {
        self.map_err(|rejection| {
            tracing::debug!(reason = %rejection.body_text(), "Rejected JSON body");
            error_response(StatusCode::BAD_REQUEST, "Invalid request")
        })
    }
}

impl<T> IntoResponseError<T> for Result<T, QueryRejection> {
    fn into_response_error(self) -> Result<T, ErrorResponse> {
        self.map_err(|rejection| {
            tracing::debug!(reason = %rejection.body_text(), "Rejected query string");
            error_response(StatusCode::BAD_REQUEST, "Invalid request")
        })
    }
}
