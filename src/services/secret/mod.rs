//! Secret resources
//!
//! Every secret kind shares the `v2/secrets` endpoints and the same envelope;
//! only the `type` discriminator and the `spec` body differ.

mod text;
mod winrm;

pub use text::SecretTextResource;
pub use winrm::SecretWinRmResource;

use super::{mark_gone, scoped_query, segment, to_body};
use crate::harness::client::decode_field;
use crate::harness::{Api, ApiError, HarnessClient};
use crate::resource::diag::handle_read_error;
use crate::resource::tags::{expand_tags, flatten_tags};
use crate::resource::{Diagnostic, Diagnostics, ResourceData};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Attributes every secret kind carries
#[derive(Debug, Deserialize)]
struct SecretConfig {
    identifier: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
}

impl SecretConfig {
    fn into_secret<S>(self, secret_type: &str, spec: S) -> Secret<S> {
        Secret {
            secret_type: secret_type.to_string(),
            name: self.name,
            identifier: self.identifier,
            org_identifier: self.org_id.filter(|s| !s.is_empty()),
            project_identifier: self.project_id.filter(|s| !s.is_empty()),
            description: self.description,
            tags: Some(expand_tags(&self.tags)),
            spec,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Secret<S> {
    #[serde(rename = "type")]
    secret_type: String,
    name: String,
    identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    spec: S,
}

#[derive(Debug, Serialize)]
struct SecretState {
    identifier: String,
    name: String,
    description: String,
    tags: Vec<String>,
    org_id: Option<String>,
    project_id: Option<String>,
}

/// Write the shared attributes, handing back the kind specific spec
fn flatten_common<S>(d: &mut ResourceData, secret: Secret<S>) -> Result<S, Diagnostics> {
    d.set_id(secret.identifier.clone());
    d.apply(&SecretState {
        identifier: secret.identifier,
        name: secret.name,
        description: secret.description.unwrap_or_default(),
        tags: flatten_tags(&secret.tags.unwrap_or_default()),
        org_id: secret.org_identifier.filter(|s| !s.is_empty()),
        project_id: secret.project_identifier.filter(|s| !s.is_empty()),
    })?;
    Ok(secret.spec)
}

/// Decode a secret payload after checking it is of the `expected` kind
fn decode_secret<S: DeserializeOwned>(value: Value, expected: &str) -> Result<Secret<S>, Diagnostics> {
    let found = value.get("type").and_then(Value::as_str).unwrap_or_default();
    if found != expected {
        let identifier = value.get("identifier").and_then(Value::as_str).unwrap_or_default();
        return Err(Diagnostics::error(format!(
            "Secret {} is of type {}, expected {}",
            identifier, found, expected
        )));
    }
    serde_json::from_value(value).map_err(|e| {
        Diagnostics::from(Diagnostic::error("Harness returned a malformed secret").with_detail(e.to_string()))
    })
}

async fn get_secret(
    client: &HarnessClient,
    identifier: &str,
    org_id: Option<&str>,
    project_id: Option<&str>,
) -> Result<Option<Value>, ApiError> {
    let url = scoped_query(client, org_id, project_id)
        .append_to(&client.ng_url(&format!("v2/secrets/{}", segment(identifier))));
    let response = client.get(Api::NextGen, &url).await?;
    decode_field(&response, "secret")
}

/// Fetch the secret behind `d`. `None` once the id has been cleared
async fn read_secret(client: &HarnessClient, d: &mut ResourceData) -> Result<Option<Value>, Diagnostics> {
    let id = d.id().to_string();
    let org_id = d.get_str("org_id").map(str::to_string);
    let project_id = d.get_str("project_id").map(str::to_string);

    match get_secret(client, &id, org_id.as_deref(), project_id.as_deref()).await {
        Ok(Some(secret)) => Ok(Some(secret)),
        Ok(None) => {
            mark_gone(d, "Secret");
            Ok(None)
        }
        Err(err) => handle_read_error(err, d).map(|()| None),
    }
}

/// POST a new secret or PUT over the existing one, returning Harness' copy
async fn save_secret<S: Serialize>(
    client: &HarnessClient,
    d: &ResourceData,
    secret: &Secret<S>,
) -> Result<Value, Diagnostics> {
    let query = scoped_query(
        client,
        secret.org_identifier.as_deref(),
        secret.project_identifier.as_deref(),
    );
    let body = json!({ "secret": to_body(secret)? });

    let response = if d.is_new() {
        let url = query.append_to(&client.ng_url("v2/secrets"));
        client.post(Api::NextGen, &url, &body).await?
    } else {
        let url = query.append_to(&client.ng_url(&format!("v2/secrets/{}", segment(d.id()))));
        client.put(Api::NextGen, &url, &body).await?
    };

    decode_field::<Value>(&response, "secret")?.ok_or_else(|| Diagnostics::error("Harness returned no secret"))
}

async fn delete_secret(client: &HarnessClient, d: &ResourceData) -> Result<(), Diagnostics> {
    let url = scoped_query(client, d.get_str("org_id"), d.get_str("project_id"))
        .append_to(&client.ng_url(&format!("v2/secrets/{}", segment(d.id()))));
    client.delete(Api::NextGen, &url).await?;
    Ok(())
}
