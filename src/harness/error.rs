//! Harness API errors
//!
//! Every client call returns [`ApiError`] so the resource layer can branch on
//! "not found" without string matching.

use reqwest::StatusCode;
use thiserror::Error;

/// Error codes the next-gen API uses for missing entities. Some endpoints
/// answer these with a 400 instead of a 404.
pub const NOT_FOUND_CODES: &[&str] = &[
    "RESOURCE_NOT_FOUND",
    "ENTITY_NOT_FOUND",
    "RESOURCE_NOT_FOUND_EXCEPTION",
];

/// Error codes reported for duplicate identifiers
pub const CONFLICT_CODES: &[&str] = &["DUPLICATE_FIELD", "DUPLICATE_FILE_IMPORT"];

/// Errors raised while talking to Harness
#[derive(Debug, Error)]
pub enum ApiError {
    /// The remote entity does not exist (or was soft deleted)
    #[error("resource not found: {0}")]
    NotFound(String),

    /// An entity with the same identifier already exists
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("permission denied: {0}")]
    Forbidden(String),

    /// Any other non-success response
    #[error("API request failed with status {status}: {message}")]
    Http {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// GraphQL responded 200 but carried an `errors` array
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The call needs a key the provider was not configured with
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success response from its status and error envelope
    pub fn from_response(status: StatusCode, code: Option<String>, message: String) -> Self {
        let code_matches =
            |codes: &[&str]| code.as_deref().map(|c| codes.contains(&c)).unwrap_or(false);

        if status == StatusCode::NOT_FOUND || code_matches(NOT_FOUND_CODES) {
            return Self::NotFound(message);
        }
        if status == StatusCode::CONFLICT || code_matches(CONFLICT_CODES) {
            return Self::Conflict(message);
        }
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            _ => Self::Http {
                status: status.as_u16(),
                code,
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
