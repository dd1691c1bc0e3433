//! `harness_platform_gitx_webhook` resource

use super::{mark_gone, segment, to_body};
use crate::harness::client::decode_data;
use crate::harness::{Api, ApiError, HarnessClient};
use crate::resource::diag::{handle_create_error, handle_read_error};
use crate::resource::{Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const TYPE_NAME: &str = "harness_platform_gitx_webhook";

#[derive(Debug, Deserialize)]
struct WebhookConfig {
    identifier: String,
    name: String,
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    repo_name: String,
    connector_ref: String,
    #[serde(default)]
    folder_paths: Vec<String>,
    #[serde(default)]
    is_enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    webhook_identifier: &'a str,
    webhook_name: &'a str,
    repo_name: &'a str,
    connector_ref: &'a str,
    folder_paths: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    is_enabled: Option<bool>,
}

impl<'a> From<&'a WebhookConfig> for WebhookRequest<'a> {
    fn from(c: &'a WebhookConfig) -> Self {
        Self {
            webhook_identifier: &c.identifier,
            webhook_name: &c.name,
            repo_name: &c.repo_name,
            connector_ref: &c.connector_ref,
            folder_paths: &c.folder_paths,
            is_enabled: c.is_enabled,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Webhook {
    #[serde(default)]
    webhook_identifier: String,
    #[serde(default)]
    webhook_name: String,
    #[serde(default)]
    repo_name: String,
    #[serde(default)]
    connector_ref: String,
    #[serde(default)]
    folder_paths: Vec<String>,
    #[serde(default)]
    is_enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
struct WebhookState {
    identifier: String,
    name: String,
    repo_name: String,
    connector_ref: String,
    folder_paths: Vec<String>,
    is_enabled: Option<bool>,
}

/// Account, org or project collection depending on the configured scope
fn webhooks_url(client: &HarnessClient, org_id: Option<&str>, project_id: Option<&str>) -> String {
    match (org_id.filter(|s| !s.is_empty()), project_id.filter(|s| !s.is_empty())) {
        (Some(org), Some(project)) => client.v1_url(&format!(
            "orgs/{}/projects/{}/gitx-webhooks",
            segment(org),
            segment(project)
        )),
        (Some(org), None) => client.v1_url(&format!("orgs/{}/gitx-webhooks", segment(org))),
        _ => client.v1_url("gitx-webhooks"),
    }
}

fn webhook_url(client: &HarnessClient, d: &ResourceData, identifier: &str) -> String {
    format!(
        "{}/{}",
        webhooks_url(client, d.get_str("org_id"), d.get_str("project_id")),
        segment(identifier)
    )
}

/// An empty identifier in the answer means the webhook is gone
async fn get_webhook(client: &HarnessClient, url: &str) -> Result<Option<Webhook>, ApiError> {
    let response = client.get(Api::OpenApi, url).await?;
    let webhook: Option<Webhook> = decode_data(response)?;
    Ok(webhook.filter(|w| !w.webhook_identifier.is_empty()))
}

fn flatten(d: &mut ResourceData, webhook: Webhook) -> Result<(), Diagnostics> {
    d.set_id(webhook.webhook_identifier.clone());
    d.apply(&WebhookState {
        identifier: webhook.webhook_identifier,
        name: webhook.webhook_name,
        repo_name: webhook.repo_name,
        connector_ref: webhook.connector_ref,
        folder_paths: webhook.folder_paths,
        is_enabled: webhook.is_enabled,
    })
}

async fn read_webhook(client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
    let url = webhook_url(client, d, d.id());
    match get_webhook(client, &url).await {
        Ok(Some(webhook)) => flatten(d, webhook),
        Ok(None) => {
            mark_gone(d, "GitX webhook");
            Ok(())
        }
        Err(err) => handle_read_error(err, d),
    }
}

pub struct GitxWebhookResource;

#[async_trait]
impl Resource for GitxWebhookResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::MultiLevel
    }

    /// Creation answers without the webhook, it is read back afterwards
    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: WebhookConfig = d.decode()?;
        let body = to_body(&WebhookRequest::from(&config))?;
        let url = webhooks_url(client, config.org_id.as_deref(), config.project_id.as_deref());

        client
            .post(Api::OpenApi, &url, &body)
            .await
            .map_err(|err| handle_create_error(err, "GitX webhook"))?;

        d.set_id(config.identifier);
        read_webhook(client, d).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        read_webhook(client, d).await
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: WebhookConfig = d.decode()?;
        let body = to_body(&WebhookRequest::from(&config))?;
        let url = webhook_url(client, d, d.id());

        client.put(Api::OpenApi, &url, &body).await?;
        read_webhook(client, d).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let url = webhook_url(client, d, d.id());
        client.delete(Api::OpenApi, &url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::auth::Credentials;
    use serde_json::json;

    fn client() -> HarnessClient {
        HarnessClient::with_credentials("https://app.harness.io/gateway", "acc", Credentials::default()).unwrap()
    }

    #[test]
    fn test_collection_follows_scope() {
        let c = client();
        assert_eq!(webhooks_url(&c, None, None), "https://app.harness.io/gateway/v1/gitx-webhooks");
        assert_eq!(
            webhooks_url(&c, Some("default"), Some("")),
            "https://app.harness.io/gateway/v1/orgs/default/gitx-webhooks"
        );
        assert_eq!(
            webhooks_url(&c, Some("default"), Some("web")),
            "https://app.harness.io/gateway/v1/orgs/default/projects/web/gitx-webhooks"
        );
    }

    #[test]
    fn test_request_uses_snake_case_body() {
        let config: WebhookConfig = serde_json::from_value(json!({
            "identifier": "hook",
            "name": "hook",
            "repo_name": "infra",
            "connector_ref": "account.github",
            "folder_paths": [".harness"]
        }))
        .unwrap();
        let body = serde_json::to_value(WebhookRequest::from(&config)).unwrap();
        assert_eq!(body["webhook_identifier"], json!("hook"));
        assert_eq!(body["folder_paths"], json!([".harness"]));
        assert!(body.get("is_enabled").is_none());
    }
}
