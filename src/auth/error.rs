use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures of the registration and login flows.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User already exists")]
    DuplicateUser,

    /// Shared by "unknown email" and "wrong password".
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidInput(String),

    #[error("credential store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DuplicateUser | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::InvalidCredentials => json!({ "message": self.to_string() }),
            Self::DuplicateUser | Self::InvalidInput(_) => {
                json!({ "success": false, "message": self.to_string() })
            }
            // Collaborator details stay in the logs.
            Self::StoreUnavailable(_) => {
                json!({ "success": false, "message": "Service unavailable" })
            }
            Self::Internal(_) => {
                json!({ "success": false, "message": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Failures of session token issuance and verification.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing bearer token")]
    Missing,

    #[error("token expired")]
    Expired,

    #[error("token signature mismatch")]
    Tampered,

    #[error("malformed token")]
    Malformed,

    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("token ttl out of range")]
    TtlOutOfRange,
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Signing(_) | Self::TtlOutOfRange => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
