//! `harness_platform_apikey` resource

use super::{mark_gone, scoped_query, segment, to_body};
use crate::harness::client::{decode_data, decode_field};
use crate::harness::{Api, ApiError, HarnessClient};
use crate::resource::diag::handle_read_error;
use crate::resource::tags::{expand_tags, flatten_tags};
use crate::resource::{Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TYPE_NAME: &str = "harness_platform_apikey";

#[derive(Debug, Deserialize)]
struct ApiKeyConfig {
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
    apikey_type: String,
    parent_id: String,
    #[serde(default)]
    default_time_to_expire_token: Option<i64>,
    account_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiKey {
    identifier: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    api_key_type: String,
    parent_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_time_to_expire_token: Option<i64>,
    account_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_identifier: Option<String>,
}

impl From<ApiKeyConfig> for ApiKey {
    fn from(c: ApiKeyConfig) -> Self {
        Self {
            identifier: c.identifier,
            name: c.name,
            description: c.description,
            tags: Some(expand_tags(&c.tags)),
            api_key_type: c.apikey_type,
            parent_identifier: c.parent_id,
            default_time_to_expire_token: c.default_time_to_expire_token,
            account_identifier: c.account_id,
            org_identifier: c.org_id.filter(|s| !s.is_empty()),
            project_identifier: c.project_id.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiKeyState {
    identifier: String,
    name: String,
    description: String,
    tags: Vec<String>,
    apikey_type: String,
    parent_id: String,
    default_time_to_expire_token: Option<i64>,
    account_id: String,
    org_id: Option<String>,
    project_id: Option<String>,
}

fn flatten(d: &mut ResourceData, key: ApiKey) -> Result<(), Diagnostics> {
    d.set_id(key.identifier.clone());
    d.apply(&ApiKeyState {
        identifier: key.identifier,
        name: key.name,
        description: key.description.unwrap_or_default(),
        tags: flatten_tags(&key.tags.unwrap_or_default()),
        apikey_type: key.api_key_type,
        parent_id: key.parent_identifier,
        default_time_to_expire_token: key.default_time_to_expire_token,
        account_id: key.account_identifier,
        org_id: key.org_identifier.filter(|s| !s.is_empty()),
        project_id: key.project_identifier.filter(|s| !s.is_empty()),
    })
}

/// Query shared by the aggregate read and the delete call
fn key_query(client: &HarnessClient, d: &ResourceData) -> crate::harness::QueryParams {
    scoped_query(client, d.get_str("org_id"), d.get_str("project_id"))
        .with("apiKeyType", d.get_str("apikey_type").unwrap_or_default())
        .with("parentIdentifier", d.get_str("parent_id").unwrap_or_default())
}

async fn get_api_key(client: &HarnessClient, d: &ResourceData) -> Result<Option<ApiKey>, ApiError> {
    let url = key_query(client, d)
        .append_to(&client.ng_url(&format!("apikey/aggregate/{}", segment(d.id()))));
    let response = client.get(Api::NextGen, &url).await?;
    decode_field(&response, "apiKey")
}

async fn create_or_update(client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
    let config: ApiKeyConfig = d.decode()?;
    let body = to_body(&ApiKey::from(config))?;

    let response = if d.is_new() {
        let url = client.account_query().append_to(&client.ng_url("apikey"));
        client.post(Api::NextGen, &url, &body).await?
    } else {
        let url = client
            .account_query()
            .append_to(&client.ng_url(&format!("apikey/{}", segment(d.id()))));
        client.put(Api::NextGen, &url, &body).await?
    };

    match decode_data::<ApiKey>(response)? {
        Some(key) => flatten(d, key),
        None => Err(Diagnostics::error("Harness returned no API key")),
    }
}

pub struct ApiKeyResource;

#[async_trait]
impl Resource for ApiKeyResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::ApiKey
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        create_or_update(client, d).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        match get_api_key(client, d).await {
            Ok(Some(key)) => flatten(d, key),
            Ok(None) => {
                mark_gone(d, "API key");
                Ok(())
            }
            Err(err) => handle_read_error(err, d),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        create_or_update(client, d).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let url = key_query(client, d)
            .append_to(&client.ng_url(&format!("apikey/{}", segment(d.id()))));
        client.delete(Api::NextGen, &url).await?;
        Ok(())
    }
}
