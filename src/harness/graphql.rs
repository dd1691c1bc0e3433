//! GraphQL access for first-generation entities (applications, users)

use super::client::{Api, HarnessClient};
use super::error::ApiError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A GraphQL query or mutation with its variables
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
}

impl GraphQlQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
        }
    }

    pub fn variable(mut self, name: &str, value: impl Serialize) -> Result<Self, ApiError> {
        self.variables
            .insert(name.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// Messages the GraphQL API uses for entities that do not exist
fn is_not_found_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("does not exist") || lower.contains("not found")
}

impl HarnessClient {
    /// Execute a GraphQL query and decode its `data` member
    pub async fn execute_graphql<T: DeserializeOwned>(&self, query: &GraphQlQuery) -> Result<T, ApiError> {
        let body = serde_json::to_value(query)?;
        let raw = self.post(Api::GraphQl, &self.graphql_url(), &body).await?;
        let response: GraphQlResponse = serde_json::from_value(raw)?;

        if !response.errors.is_empty() {
            let message = response
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            tracing::debug!("GraphQL errors: {}", message);
            if response.errors.iter().all(|e| is_not_found_message(&e.message)) {
                return Err(ApiError::NotFound(message));
            }
            return Err(ApiError::GraphQl(message));
        }

        let data = response.data.unwrap_or(Value::Null);
        Ok(serde_json::from_value(data)?)
    }
}
