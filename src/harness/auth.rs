//! Harness Authentication
//!
//! Harness authenticates API calls with an `x-api-key` header. Next-gen REST
//! endpoints take a platform API key, the first-generation GraphQL endpoint
//! takes a classic API key. Both can be set at once.

use super::error::ApiError;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header naming the account on the v1 (OpenAPI) endpoints
pub const ACCOUNT_HEADER: &str = "Harness-Account";

pub const ENV_ENDPOINT: &str = "HARNESS_ENDPOINT";
pub const ENV_ACCOUNT_ID: &str = "HARNESS_ACCOUNT_ID";
pub const ENV_API_KEY: &str = "HARNESS_API_KEY";
pub const ENV_PLATFORM_API_KEY: &str = "HARNESS_PLATFORM_API_KEY";

/// Which key family a request authenticates with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// First-generation GraphQL API key
    Classic,
    /// Next-gen platform API key
    Platform,
}

/// Harness credentials holder
#[derive(Clone, Default)]
pub struct Credentials {
    api_key: Option<String>,
    platform_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys never reach logs
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("platform_api_key", &self.platform_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: Option<String>, platform_api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            platform_api_key: platform_api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Key for the given API family
    pub fn key_for(&self, kind: KeyKind) -> Result<&str, ApiError> {
        match kind {
            KeyKind::Classic => self
                .api_key
                .as_deref()
                .ok_or(ApiError::MissingCredentials(ENV_API_KEY)),
            KeyKind::Platform => self
                .platform_api_key
                .as_deref()
                .ok_or(ApiError::MissingCredentials(ENV_PLATFORM_API_KEY)),
        }
    }

    pub fn has_any(&self) -> bool {
        self.api_key.is_some() || self.platform_api_key.is_some()
    }
}

/// Validate a Harness account identifier
/// Account ids are 22 url-safe base64 characters, but older accounts use
/// other lengths, so only the alphabet is enforced
pub fn validate_account_id(account_id: &str) -> bool {
    !account_id.is_empty()
        && account_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
