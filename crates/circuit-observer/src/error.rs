//! Error types for the observer API.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use circuit_core::InjectionError;
use circuit_core::history::ExportError;

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// No live simulation has the requested id.
    #[error("simulation not found: {0}")]
    NotFound(String),

    /// The request was well-formed HTTP but its content was rejected.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An injected record failed validation.
    #[error("invalid injection: {0}")]
    Injection(#[from] InjectionError),

    /// The history could not be exported.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(id) => (StatusCode::NOT_FOUND, format!("simulation {id} not found")),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Injection(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Export(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
