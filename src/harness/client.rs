//! Harness Client
//!
//! Main client for interacting with Harness APIs, combining credentials,
//! account scoping and HTTP functionality. The client is created once from
//! the provider configuration and passed explicitly to every resource call.

use super::auth::{Credentials, KeyKind, ACCOUNT_HEADER, API_KEY_HEADER};
use super::error::ApiError;
use super::http::HarnessHttpClient;
use super::query::QueryParams;
use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// API family a request belongs to. Decides the key, extra headers and
/// whether the `{status, data}` envelope is unwrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    /// `/ng/api` next-gen platform endpoints
    NextGen,
    /// `/cf/admin` feature flag endpoints
    FeatureFlags,
    /// `/v1` OpenAPI endpoints (pipelines, input sets)
    OpenApi,
    /// `/api/graphql` first-generation endpoint
    GraphQl,
    /// `/gitops/api/v1` GitOps service, bodies come back bare
    GitOps,
}

impl Api {
    fn key_kind(self) -> KeyKind {
        match self {
            Api::GraphQl => KeyKind::Classic,
            _ => KeyKind::Platform,
        }
    }
}

/// Main Harness client
#[derive(Clone)]
pub struct HarnessClient {
    pub account_id: String,
    pub endpoint: String,
    http: HarnessHttpClient,
    credentials: Credentials,
}

impl std::fmt::Debug for HarnessClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessClient")
            .field("account_id", &self.account_id)
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl HarnessClient {
    /// Create a new Harness client from the resolved provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let account_id = config
            .account_id
            .clone()
            .context("No Harness account configured. Set HARNESS_ACCOUNT_ID or use --account-id")?;

        let credentials = Credentials::new(config.api_key.clone(), config.platform_api_key.clone());
        if !credentials.has_any() {
            tracing::warn!("No Harness API key configured, every call will fail");
        }

        Self::with_credentials(&config.endpoint, &account_id, credentials)
    }

    /// Create a client for an explicit endpoint, used by tests against mock servers
    pub fn with_credentials(endpoint: &str, account_id: &str, credentials: Credentials) -> Result<Self> {
        let http = HarnessHttpClient::new()?;

        Ok(Self {
            account_id: account_id.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
            credentials,
        })
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Build next-gen platform API URL
    pub fn ng_url(&self, path: &str) -> String {
        format!("{}/ng/api/{}", self.endpoint, path)
    }

    /// Build feature flag admin API URL
    pub fn cf_url(&self, path: &str) -> String {
        format!("{}/cf/admin/{}", self.endpoint, path)
    }

    /// Build v1 OpenAPI URL
    pub fn v1_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint, path)
    }

    /// Build GitOps service URL
    pub fn gitops_url(&self, path: &str) -> String {
        format!("{}/gitops/api/v1/{}", self.endpoint, path)
    }

    /// Build the GraphQL endpoint URL
    pub fn graphql_url(&self) -> String {
        QueryParams::new()
            .with("accountId", &self.account_id)
            .append_to(&format!("{}/api/graphql", self.endpoint))
    }

    /// Query parameters every next-gen and feature flag call carries
    pub fn account_query(&self) -> QueryParams {
        QueryParams::new().with("accountIdentifier", &self.account_id)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Make a request to a Harness API
    pub async fn request(
        &self,
        api: Api,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.request_with_status(api, method, url, body)
            .await
            .map(|(_, value)| value)
    }

    /// Make a request, also returning the success status code
    pub async fn request_with_status(
        &self,
        api: Api,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(u16, Value), ApiError> {
        let key = self.credentials.key_for(api.key_kind())?;

        let mut headers = vec![(API_KEY_HEADER, key)];
        if api == Api::OpenApi {
            headers.push((ACCOUNT_HEADER, self.account_id.as_str()));
        }

        let (status, response) = self.http.send_with_status(method, url, &headers, body).await?;

        if api == Api::NextGen {
            return Ok((status.as_u16(), unwrap_ng_envelope(response)));
        }
        Ok((status.as_u16(), response))
    }

    /// Make a GET request to a Harness API
    pub async fn get(&self, api: Api, url: &str) -> Result<Value, ApiError> {
        self.request(api, Method::GET, url, None).await
    }

    /// Make a POST request to a Harness API
    pub async fn post(&self, api: Api, url: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(api, Method::POST, url, Some(body)).await
    }

    /// Make a PUT request to a Harness API
    pub async fn put(&self, api: Api, url: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(api, Method::PUT, url, Some(body)).await
    }

    /// Make a PATCH request to a Harness API
    pub async fn patch(&self, api: Api, url: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(api, Method::PATCH, url, Some(body)).await
    }

    /// Make a DELETE request to a Harness API
    pub async fn delete(&self, api: Api, url: &str) -> Result<Value, ApiError> {
        self.request(api, Method::DELETE, url, None).await
    }
}

/// Strip the next-gen `{status, data}` envelope, leaving other bodies alone
fn unwrap_ng_envelope(response: Value) -> Value {
    match response {
        Value::Object(mut map) if map.contains_key("status") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Decode a response payload; `null` (a soft-deleted entity) becomes `None`
pub fn decode_data<T: DeserializeOwned>(value: Value) -> Result<Option<T>, ApiError> {
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}

/// Decode a field of a response payload; missing or `null` becomes `None`
pub fn decode_field<T: DeserializeOwned>(value: &Value, field: &str) -> Result<Option<T>, ApiError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
    }
}
