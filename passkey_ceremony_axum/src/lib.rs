//! passkey-ceremony-axum - HTTP surface of the passkey ceremony engine for axum

mod error;
mod passkey;
mod router;

pub use error::{ErrorBody, ErrorResponse, IntoResponseError};
pub use router::{passkey_ceremony_router, passkey_ceremony_router_no_trace};

// Re-export the initialization function from passkey_ceremony crate
pub use passkey_ceremony::init;
