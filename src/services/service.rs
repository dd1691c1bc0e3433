//! `harness_platform_service` resource and data source

use super::{mark_gone, scoped_query, segment, to_body};
use crate::harness::client::{decode_data, decode_field};
use crate::harness::{Api, ApiError, HarnessClient};
use crate::resource::diag::handle_read_error;
use crate::resource::tags::{expand_tags, flatten_tags};
use crate::resource::{DataSource, Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TYPE_NAME: &str = "harness_platform_service";

#[derive(Debug, Deserialize)]
struct ServiceConfig {
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
    yaml: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRequest<'a> {
    identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    org_identifier: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_identifier: Option<&'a str>,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    yaml: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDetails {
    identifier: String,
    #[serde(default)]
    org_identifier: Option<String>,
    #[serde(default)]
    project_identifier: Option<String>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    yaml: Option<String>,
}

#[derive(Debug, Serialize)]
struct ServiceState {
    identifier: String,
    org_id: Option<String>,
    project_id: Option<String>,
    name: String,
    description: String,
    tags: Vec<String>,
    yaml: Option<String>,
}

fn flatten(d: &mut ResourceData, svc: ServiceDetails) -> Result<(), Diagnostics> {
    d.set_id(svc.identifier.clone());
    d.apply(&ServiceState {
        identifier: svc.identifier,
        org_id: svc.org_identifier.filter(|s| !s.is_empty()),
        project_id: svc.project_identifier.filter(|s| !s.is_empty()),
        name: svc.name,
        description: svc.description.unwrap_or_default(),
        tags: flatten_tags(&svc.tags.unwrap_or_default()),
        yaml: svc.yaml,
    })
}

async fn get_service(
    client: &HarnessClient,
    identifier: &str,
    org_id: Option<&str>,
    project_id: Option<&str>,
) -> Result<Option<ServiceDetails>, ApiError> {
    let url = scoped_query(client, org_id, project_id)
        .append_to(&client.ng_url(&format!("servicesV2/{}", segment(identifier))));
    let response = client.get(Api::NextGen, &url).await?;
    decode_field(&response, "service")
}

#[derive(Debug, Deserialize)]
struct ServiceListItem {
    service: Option<ServiceDetails>,
}

#[derive(Debug, Deserialize)]
struct ServicePage {
    #[serde(default)]
    content: Vec<ServiceListItem>,
}

async fn find_service_by_name(
    client: &HarnessClient,
    name: &str,
    org_id: Option<&str>,
    project_id: Option<&str>,
) -> Result<Option<ServiceDetails>, ApiError> {
    let url = scoped_query(client, org_id, project_id)
        .with("searchTerm", name)
        .with("page", "0")
        .with("size", "100")
        .append_to(&client.ng_url("servicesV2"));
    let page: Option<ServicePage> = decode_data(client.get(Api::NextGen, &url).await?)?;

    Ok(page
        .map(|p| p.content)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| item.service)
        .find(|svc| svc.name == name))
}

async fn create_or_update(client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
    let config: ServiceConfig = d.decode()?;
    let body = to_body(&ServiceRequest {
        identifier: &config.identifier,
        org_identifier: config.org_id.as_deref(),
        project_identifier: config.project_id.as_deref(),
        name: &config.name,
        description: config.description.as_deref(),
        tags: expand_tags(&config.tags),
        yaml: config.yaml.as_deref().filter(|s| !s.is_empty()),
    })?;
    let url = client.account_query().append_to(&client.ng_url("servicesV2"));

    let response = if d.is_new() {
        client.post(Api::NextGen, &url, &body).await?
    } else {
        client.put(Api::NextGen, &url, &body).await?
    };

    match decode_field::<ServiceDetails>(&response, "service")? {
        Some(svc) => flatten(d, svc),
        None => Err(Diagnostics::error(format!(
            "Harness returned no service for {}",
            config.identifier
        ))),
    }
}

pub struct ServiceResource;

#[async_trait]
impl Resource for ServiceResource {
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

        match get_service(client, &id, org_id.as_deref(), project_id.as_deref()).await {
            Ok(Some(svc)) => flatten(d, svc),
            Ok(None) => {
                mark_gone(d, "Service");
                Ok(())
            }
            Err(err) => handle_read_error(err, d),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        create_or_update(client, d).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let url = scoped_query(client, d.get_str("org_id"), d.get_str("project_id"))
            .with_bool("forceDelete", d.get("force_delete").and_then(|v| v.as_bool()))
            .append_to(&client.ng_url(&format!("servicesV2/{}", segment(d.id()))));
        client.delete(Api::NextGen, &url).await?;
        Ok(())
    }
}

pub struct ServiceDataSource;

#[async_trait]
impl DataSource for ServiceDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let org_id = d.get_str("org_id").map(str::to_string);
        let project_id = d.get_str("project_id").map(str::to_string);

        let svc = if let Some(identifier) = d.get_str("identifier").map(str::to_string) {
            get_service(client, &identifier, org_id.as_deref(), project_id.as_deref()).await?
        } else if let Some(name) = d.get_str("name").map(str::to_string) {
            find_service_by_name(client, &name, org_id.as_deref(), project_id.as_deref()).await?
        } else {
            return Err(Diagnostics::error("either identifier or name must be specified"));
        };

        match svc {
            Some(svc) => flatten(d, svc),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_details_tolerate_nulls() {
        let svc: ServiceDetails = serde_json::from_value(json!({
            "identifier": "svc",
            "orgIdentifier": null,
            "projectIdentifier": null,
            "name": "svc",
            "description": null,
            "tags": null
        }))
        .unwrap();

        let mut d = ResourceData::default();
        flatten(&mut d, svc).unwrap();
        assert_eq!(d.id(), "svc");
        assert!(d.get("org_id").is_none());
        assert_eq!(d.get("tags"), Some(&json!([])));
    }
}
