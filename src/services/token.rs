//! `harness_platform_token` resource
//!
//! Tokens belong to an API key. The create call answers with nothing but the
//! token value, which is only ever shown once; the rest of the state comes
//! from the aggregated token list filtered down to this identifier.

use super::{mark_gone, scoped_query, segment, to_body};
use crate::harness::client::decode_data;
use crate::harness::{Api, ApiError, HarnessClient, QueryParams};
use crate::resource::diag::handle_read_error;
use crate::resource::tags::{expand_tags, flatten_tags};
use crate::resource::{Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TYPE_NAME: &str = "harness_platform_token";

#[derive(Debug, Deserialize)]
struct TokenConfig {
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
    apikey_id: String,
    apikey_type: String,
    parent_id: String,
    account_id: String,
    #[serde(default)]
    valid_from: Option<i64>,
    #[serde(default)]
    valid_to: Option<i64>,
    #[serde(default)]
    scheduled_expire_time: Option<i64>,
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    encoded_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Token {
    identifier: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    api_key_identifier: String,
    api_key_type: String,
    parent_identifier: String,
    account_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    valid_from: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    valid_to: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scheduled_expire_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encoded_password: Option<String>,
}

impl From<TokenConfig> for Token {
    fn from(c: TokenConfig) -> Self {
        Self {
            identifier: c.identifier,
            name: c.name,
            description: c.description,
            tags: Some(expand_tags(&c.tags)),
            api_key_identifier: c.apikey_id,
            api_key_type: c.apikey_type,
            parent_identifier: c.parent_id,
            account_identifier: c.account_id,
            org_identifier: c.org_id.filter(|s| !s.is_empty()),
            project_identifier: c.project_id.filter(|s| !s.is_empty()),
            valid_from: c.valid_from,
            valid_to: c.valid_to,
            scheduled_expire_time: c.scheduled_expire_time,
            valid: c.valid,
            email: c.email.filter(|s| !s.is_empty()),
            username: c.username.filter(|s| !s.is_empty()),
            encoded_password: c.encoded_password.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
struct TokenState {
    identifier: String,
    name: String,
    description: String,
    tags: Vec<String>,
    apikey_id: String,
    apikey_type: String,
    parent_id: String,
    account_id: String,
    org_id: Option<String>,
    project_id: Option<String>,
    valid_from: Option<i64>,
    valid_to: Option<i64>,
    scheduled_expire_time: Option<i64>,
    valid: Option<bool>,
    email: Option<String>,
    username: Option<String>,
}

fn flatten(d: &mut ResourceData, token: Token) -> Result<(), Diagnostics> {
    d.set_id(token.identifier.clone());
    d.apply(&TokenState {
        identifier: token.identifier,
        name: token.name,
        description: token.description.unwrap_or_default(),
        tags: flatten_tags(&token.tags.unwrap_or_default()),
        apikey_id: token.api_key_identifier,
        apikey_type: token.api_key_type,
        parent_id: token.parent_identifier,
        account_id: token.account_identifier,
        org_id: token.org_identifier.filter(|s| !s.is_empty()),
        project_id: token.project_identifier.filter(|s| !s.is_empty()),
        valid_from: token.valid_from,
        valid_to: token.valid_to,
        scheduled_expire_time: token.scheduled_expire_time,
        valid: token.valid,
        email: token.email,
        username: token.username,
    })
}

#[derive(Debug, Deserialize)]
struct AggregatedToken {
    token: Option<Token>,
}

#[derive(Debug, Deserialize)]
struct TokenPage {
    #[serde(default)]
    content: Vec<AggregatedToken>,
}

/// Query naming the owning API key, shared by list and delete
fn owner_query(client: &HarnessClient, d: &ResourceData) -> QueryParams {
    scoped_query(client, d.get_str("org_id"), d.get_str("project_id"))
        .with("apiKeyType", d.get_str("apikey_type").unwrap_or_default())
        .with("parentIdentifier", d.get_str("parent_id").unwrap_or_default())
        .with("apiKeyIdentifier", d.get_str("apikey_id").unwrap_or_default())
}

/// The token, but only when the list narrows down to exactly one entry
async fn find_token(client: &HarnessClient, d: &ResourceData, identifier: &str) -> Result<Option<Token>, ApiError> {
    let url = owner_query(client, d)
        .with("identifiers", identifier)
        .append_to(&client.ng_url("token/aggregate"));
    let page: Option<TokenPage> = decode_data(client.get(Api::NextGen, &url).await?)?;

    let mut content = page.map(|p| p.content).unwrap_or_default();
    if content.len() != 1 {
        tracing::debug!("Token lookup for {} matched {} entries", identifier, content.len());
        return Ok(None);
    }
    Ok(content.pop().and_then(|t| t.token))
}

/// Identifier used for lookups: the configured one, or the id after import
fn lookup_identifier(d: &ResourceData) -> String {
    d.get_str("identifier")
        .map(str::to_string)
        .unwrap_or_else(|| d.id().to_string())
}

pub struct TokenResource;

#[async_trait]
impl Resource for TokenResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::Token
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: TokenConfig = d.decode()?;
        let identifier = config.identifier.clone();
        let body = to_body(&Token::from(config))?;
        let url = client.account_query().append_to(&client.ng_url("token"));

        let response = client.post(Api::NextGen, &url, &body).await?;
        if let Some(value) = decode_data::<String>(response)? {
            d.set("value", value);
        }

        match find_token(client, d, &identifier).await? {
            Some(token) => flatten(d, token),
            None => Err(Diagnostics::error(format!(
                "Token {} was created but could not be read back",
                identifier
            ))),
        }
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let identifier = lookup_identifier(d);
        match find_token(client, d, &identifier).await {
            Ok(Some(token)) => flatten(d, token),
            Ok(None) => {
                mark_gone(d, "Token");
                Ok(())
            }
            Err(err) => handle_read_error(err, d),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: TokenConfig = d.decode()?;
        let body = to_body(&Token::from(config))?;
        let url = client
            .account_query()
            .append_to(&client.ng_url(&format!("token/{}", segment(d.id()))));

        let response = client.put(Api::NextGen, &url, &body).await?;
        match decode_data::<Token>(response)? {
            Some(token) => flatten(d, token),
            None => Err(Diagnostics::error("Harness returned no token")),
        }
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let url = owner_query(client, d)
            .append_to(&client.ng_url(&format!("token/{}", segment(d.id()))));
        client.delete(Api::NextGen, &url).await?;
        Ok(())
    }
}
