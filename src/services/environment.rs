//! `harness_platform_environment` resource and data source

use super::{mark_gone, scoped_query, segment, to_body};
use crate::harness::client::decode_field;
use crate::harness::{Api, HarnessClient};
use crate::resource::diag::handle_read_error;
use crate::resource::tags::{expand_tags, flatten_tags};
use crate::resource::{DataSource, Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TYPE_NAME: &str = "harness_platform_environment";

#[derive(Debug, Deserialize)]
struct EnvironmentConfig {
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
    #[serde(default)]
    color: Option<String>,
    #[serde(rename = "type")]
    env_type: String,
    #[serde(default)]
    yaml: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentRequest<'a> {
    identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    org_identifier: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_identifier: Option<&'a str>,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    tags: BTreeMap<String, String>,
    #[serde(rename = "type")]
    env_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    yaml: Option<&'a str>,
}

impl<'a> From<&'a EnvironmentConfig> for EnvironmentRequest<'a> {
    fn from(c: &'a EnvironmentConfig) -> Self {
        Self {
            identifier: &c.identifier,
            org_identifier: c.org_id.as_deref(),
            project_identifier: c.project_id.as_deref(),
            name: &c.name,
            color: c.color.as_deref().filter(|s| !s.is_empty()),
            description: c.description.as_deref(),
            tags: expand_tags(&c.tags),
            env_type: &c.env_type,
            yaml: c.yaml.as_deref().filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentDetails {
    identifier: String,
    #[serde(default)]
    org_identifier: Option<String>,
    #[serde(default)]
    project_identifier: Option<String>,
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(rename = "type", default)]
    env_type: Option<String>,
    #[serde(default)]
    yaml: Option<String>,
}

#[derive(Debug, Serialize)]
struct EnvironmentState {
    identifier: String,
    org_id: Option<String>,
    project_id: Option<String>,
    name: String,
    color: Option<String>,
    description: String,
    tags: Vec<String>,
    #[serde(rename = "type")]
    env_type: Option<String>,
    /// Outer `None` leaves the attribute untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    yaml: Option<Option<String>>,
}

fn flatten(d: &mut ResourceData, env: EnvironmentDetails, keep_yaml: bool) -> Result<(), Diagnostics> {
    d.set_id(env.identifier.clone());
    d.apply(&EnvironmentState {
        identifier: env.identifier,
        org_id: env.org_identifier.filter(|s| !s.is_empty()),
        project_id: env.project_identifier.filter(|s| !s.is_empty()),
        name: env.name,
        color: env.color,
        description: env.description.unwrap_or_default(),
        tags: flatten_tags(&env.tags.unwrap_or_default()),
        env_type: env.env_type,
        yaml: keep_yaml.then_some(env.yaml),
    })
}

/// Create and update share one call, chosen by whether the id is set
async fn create_or_update(client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
    let config: EnvironmentConfig = d.decode()?;
    let body = to_body(&EnvironmentRequest::from(&config))?;
    let url = client.account_query().append_to(&client.ng_url("environmentsV2"));

    let response = if d.is_new() {
        client.post(Api::NextGen, &url, &body).await?
    } else {
        client.put(Api::NextGen, &url, &body).await?
    };

    let Some(env) = decode_field::<EnvironmentDetails>(&response, "environment")? else {
        return Err(Diagnostics::error(format!(
            "Harness returned no environment for {}",
            config.identifier
        )));
    };
    let keep_yaml = config.yaml.is_some();
    flatten(d, env, keep_yaml)
}

/// Fetch one environment by identifier, `None` when soft deleted
async fn get_environment(
    client: &HarnessClient,
    identifier: &str,
    org_id: Option<&str>,
    project_id: Option<&str>,
) -> Result<Option<EnvironmentDetails>, crate::harness::ApiError> {
    let url = scoped_query(client, org_id, project_id)
        .append_to(&client.ng_url(&format!("environmentsV2/{}", segment(identifier))));
    let response = client.get(Api::NextGen, &url).await?;
    decode_field(&response, "environment")
}

#[derive(Debug, Deserialize)]
struct EnvironmentListItem {
    environment: Option<EnvironmentDetails>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentPage {
    #[serde(default)]
    content: Vec<EnvironmentListItem>,
}

/// Look an environment up by its display name
async fn find_environment_by_name(
    client: &HarnessClient,
    name: &str,
    org_id: Option<&str>,
    project_id: Option<&str>,
) -> Result<Option<EnvironmentDetails>, crate::harness::ApiError> {
    let url = scoped_query(client, org_id, project_id)
        .with("searchTerm", name)
        .with("page", "0")
        .with("size", "100")
        .append_to(&client.ng_url("environmentsV2"));
    let response = client.get(Api::NextGen, &url).await?;
    let page: Option<EnvironmentPage> = crate::harness::client::decode_data(response)?;

    Ok(page
        .map(|p| p.content)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| item.environment)
        .find(|env| env.name == name))
}

pub struct EnvironmentResource;

#[async_trait]
impl Resource for EnvironmentResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::MultiLevel
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        create_or_update(client, d).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let id = d.id().to_string();
        let org_id = d.get_str("org_id").map(str::to_string);
        let project_id = d.get_str("project_id").map(str::to_string);

        let env = match get_environment(client, &id, org_id.as_deref(), project_id.as_deref()).await {
            Ok(env) => env,
            Err(err) => return handle_read_error(err, d),
        };
        match env {
            Some(env) => {
                let keep_yaml = d.get_str("yaml").is_some();
                flatten(d, env, keep_yaml)
            }
            None => {
                mark_gone(d, "Environment");
                Ok(())
            }
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        create_or_update(client, d).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let force_delete = d.get("force_delete").and_then(|v| v.as_bool());
        let url = scoped_query(client, d.get_str("org_id"), d.get_str("project_id"))
            .with_bool("forceDelete", force_delete)
            .append_to(&client.ng_url(&format!("environmentsV2/{}", segment(d.id()))));
        client.delete(Api::NextGen, &url).await?;
        Ok(())
    }
}

pub struct EnvironmentDataSource;

#[async_trait]
impl DataSource for EnvironmentDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let org_id = d.get_str("org_id").map(str::to_string);
        let project_id = d.get_str("project_id").map(str::to_string);

        let env = if let Some(identifier) = d.get_str("identifier").map(str::to_string) {
            get_environment(client, &identifier, org_id.as_deref(), project_id.as_deref()).await?
        } else if let Some(name) = d.get_str("name").map(str::to_string) {
            find_environment_by_name(client, &name, org_id.as_deref(), project_id.as_deref()).await?
        } else {
            return Err(Diagnostics::error("either identifier or name must be specified"));
        };

        // Soft deleted environments come back empty, leave the data source unset
        let Some(env) = env else {
            return Ok(());
        };
        flatten(d, env, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_unset_scope() {
        let config: EnvironmentConfig = serde_json::from_value(json!({
            "identifier": "test_env",
            "name": "test_env",
            "type": "PreProduction",
            "tags": ["foo:bar"]
        }))
        .unwrap();
        let body = serde_json::to_value(EnvironmentRequest::from(&config)).unwrap();
        assert!(body.get("orgIdentifier").is_none());
        assert_eq!(body["type"], json!("PreProduction"));
        assert_eq!(body["tags"], json!({"foo": "bar"}));
    }

    #[test]
    fn test_flatten_without_configured_yaml() {
        let env: EnvironmentDetails = serde_json::from_value(json!({
            "identifier": "test_env",
            "orgIdentifier": "org",
            "projectIdentifier": "proj",
            "name": "test_env",
            "type": "PreProduction",
            "tags": {"foo": "bar"},
            "yaml": "environment: {}"
        }))
        .unwrap();
        let mut d = ResourceData::default();
        flatten(&mut d, env, false).unwrap();
        assert_eq!(d.id(), "test_env");
        assert_eq!(d.get_str("org_id"), Some("org"));
        assert_eq!(d.get("tags"), Some(&json!(["foo:bar"])));
        assert!(d.get("yaml").is_none());
    }

    #[test]
    fn test_flatten_drops_fields_missing_from_response() {
        let env: EnvironmentDetails = serde_json::from_value(json!({
            "identifier": "test_env",
            "name": "test_env",
            "type": "Production"
        }))
        .unwrap();
        let mut d = ResourceData::from_state(
            json!({"id": "test_env", "color": "#0063F7", "org_id": "org", "yaml": "environment: {}"})
                .as_object()
                .unwrap()
                .clone(),
        );
        flatten(&mut d, env, false).unwrap();
        assert!(d.get("color").is_none());
        assert!(d.get("org_id").is_none());
        assert_eq!(d.get_str("yaml"), Some("environment: {}"));
    }
}
