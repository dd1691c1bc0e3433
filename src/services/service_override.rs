//! `harness_platform_environment_service_overrides` resource
//!
//! Overrides are keyed by their environment and service, there is no
//! identifier of their own. Create and update are the same upsert.

use super::{mark_gone, scoped_query, to_body};
use crate::harness::client::decode_data;
use crate::harness::{Api, ApiError, HarnessClient};
use crate::resource::diag::handle_read_error;
use crate::resource::{Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const TYPE_NAME: &str = "harness_platform_environment_service_overrides";
const PATH: &str = "environmentsV2/serviceOverrides";

#[derive(Debug, Deserialize)]
struct ServiceOverrideConfig {
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    env_id: String,
    service_id: String,
    yaml: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceOverrideRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    org_identifier: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_identifier: Option<&'a str>,
    environment_identifier: &'a str,
    service_identifier: &'a str,
    yaml: &'a str,
}

impl<'a> From<&'a ServiceOverrideConfig> for ServiceOverrideRequest<'a> {
    fn from(c: &'a ServiceOverrideConfig) -> Self {
        Self {
            org_identifier: c.org_id.as_deref().filter(|s| !s.is_empty()),
            project_identifier: c.project_id.as_deref().filter(|s| !s.is_empty()),
            environment_identifier: &c.env_id,
            service_identifier: &c.service_id,
            yaml: &c.yaml,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceOverride {
    #[serde(default)]
    org_identifier: Option<String>,
    #[serde(default)]
    project_identifier: Option<String>,
    environment_ref: String,
    service_ref: String,
    #[serde(default)]
    yaml: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceOverridePage {
    #[serde(default)]
    content: Vec<ServiceOverride>,
}

#[derive(Debug, Serialize)]
struct ServiceOverrideState {
    identifier: String,
    org_id: Option<String>,
    project_id: Option<String>,
    env_id: String,
    service_id: String,
    yaml: Option<String>,
}

fn override_id(service_ref: &str, environment_ref: &str) -> String {
    format!("{}-{}", service_ref, environment_ref)
}

fn flatten(d: &mut ResourceData, so: ServiceOverride) -> Result<(), Diagnostics> {
    let id = override_id(&so.service_ref, &so.environment_ref);
    d.set_id(id.clone());
    d.apply(&ServiceOverrideState {
        identifier: id,
        org_id: so.org_identifier.filter(|s| !s.is_empty()),
        project_id: so.project_identifier.filter(|s| !s.is_empty()),
        env_id: so.environment_ref,
        service_id: so.service_ref,
        yaml: so.yaml,
    })
}

async fn upsert(client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
    let config: ServiceOverrideConfig = d.decode()?;
    let body = to_body(&ServiceOverrideRequest::from(&config))?;
    let url = client.account_query().append_to(&client.ng_url(PATH));

    let response = client.post(Api::NextGen, &url, &body).await?;
    match decode_data::<ServiceOverride>(response)? {
        Some(so) => flatten(d, so),
        None => Err(Diagnostics::error(format!(
            "Harness returned no overrides for service {} in environment {}",
            config.service_id, config.env_id
        ))),
    }
}

/// Fetch the overrides of one service in one environment
async fn get_override(
    client: &HarnessClient,
    env_id: &str,
    service_id: &str,
    org_id: Option<&str>,
    project_id: Option<&str>,
) -> Result<Option<ServiceOverride>, ApiError> {
    let url = scoped_query(client, org_id, project_id)
        .with("environmentIdentifier", env_id)
        .with("serviceIdentifier", service_id)
        .append_to(&client.ng_url(PATH));
    let response = client.get(Api::NextGen, &url).await?;
    let page: Option<ServiceOverridePage> = decode_data(response)?;
    Ok(page.and_then(|p| p.content.into_iter().next()))
}

pub struct ServiceOverrideResource;

#[async_trait]
impl Resource for ServiceOverrideResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::ServiceOverride
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        upsert(client, d).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let (Some(env_id), Some(service_id)) = (
            d.get_str("env_id").map(str::to_string),
            d.get_str("service_id").map(str::to_string),
        ) else {
            return Err(Diagnostics::error("env_id and service_id are required to read service overrides"));
        };
        let org_id = d.get_str("org_id").map(str::to_string);
        let project_id = d.get_str("project_id").map(str::to_string);

        match get_override(client, &env_id, &service_id, org_id.as_deref(), project_id.as_deref()).await {
            Ok(Some(so)) => flatten(d, so),
            Ok(None) => {
                mark_gone(d, "Service overrides");
                Ok(())
            }
            Err(err) => handle_read_error(err, d),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        upsert(client, d).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let url = scoped_query(client, d.get_str("org_id"), d.get_str("project_id"))
            .with_opt("environmentIdentifier", d.get_str("env_id"))
            .with_opt("serviceIdentifier", d.get_str("service_id"))
            .append_to(&client.ng_url(PATH));
        client.delete(Api::NextGen, &url).await?;
        Ok(())
    }
}
