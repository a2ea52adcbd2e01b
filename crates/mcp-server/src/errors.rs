//! Authorization error types.
//!
//! Every failure the authorization gate can produce maps to an HTTP status,
//! an OAuth-style error code and a JSON body via the `IntoResponse` impl.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Description returned when the gate runs before discovery succeeded.
pub const METADATA_UNAVAILABLE: &str = "Cannot validate token. AS metadata unavailable.";

/// Description returned by readiness-only routes before discovery succeeded.
pub const METADATA_NOT_INITIALIZED: &str = "Critical Auth metadata dependency not initialized. Check server logs for failed fetch from AS.";

/// Description returned when the bearer credential is absent.
pub const MISSING_CREDENTIAL: &str =
    "Authorization header is missing or invalid. Initiate OAuth flow.";

/// Authorization gate error type.
///
/// Maps to HTTP status codes:
/// - ServiceUnavailable: 503 (identity provider metadata not loaded)
/// - MissingCredential: 401 with a `WWW-Authenticate` challenge
/// - InvalidToken: 401
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unauthorized: {description}")]
    MissingCredential {
        description: String,
        challenge: String,
    },

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl AuthError {
    /// HTTP status code for this error (also used as a metrics label).
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::ServiceUnavailable(_) => 503,
            AuthError::MissingCredential { .. } | AuthError::InvalidToken(_) => 401,
        }
    }

    /// OAuth-style machine readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::ServiceUnavailable(_) => "service_unavailable",
            AuthError::MissingCredential { .. } => "unauthorized",
            AuthError::InvalidToken(_) => "invalid_token",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            AuthError::ServiceUnavailable(description)
            | AuthError::MissingCredential { description, .. }
            | AuthError::InvalidToken(description) => description,
        }
    }

    /// Value of the `WWW-Authenticate` header, if this error carries one.
    pub fn challenge(&self) -> Option<&str> {
        match self {
            AuthError::MissingCredential { challenge, .. } => Some(challenge),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
    error_description: &'a str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = ErrorResponse {
            error: self.error_code(),
            error_description: self.description(),
        };

        let mut response = (status, Json(body)).into_response();

        if let Some(challenge) = self.challenge() {
            match HeaderValue::from_str(challenge) {
                Ok(value) => {
                    response
                        .headers_mut()
                        .insert(header::WWW_AUTHENTICATE, value);
                }
                Err(e) => {
                    tracing::error!(
                        target: "mcp.errors",
                        error = %e,
                        "Challenge header contains invalid characters"
                    );
                }
            }
        }

        response
    }
}
