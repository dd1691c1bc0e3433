//! `harness_platform_connector_pagerduty` resource and data source

use super::{mark_gone, scoped_query, segment, to_body};
use crate::harness::client::{decode_data, decode_field};
use crate::harness::{Api, ApiError, HarnessClient};
use crate::resource::diag::handle_read_error;
use crate::resource::tags::{expand_tags, flatten_tags};
use crate::resource::{DataSource, Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

const TYPE_NAME: &str = "harness_platform_connector_pagerduty";
const CONNECTOR_TYPE: &str = "PagerDuty";

#[derive(Debug, Deserialize)]
struct PagerDutyConfig {
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
    api_token_ref: String,
    #[serde(default)]
    delegate_selectors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagerDutySpec {
    #[serde(default)]
    api_token_ref: Option<String>,
    #[serde(default)]
    delegate_selectors: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectorInfo {
    name: String,
    identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_identifier: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(rename = "type")]
    connector_type: String,
    spec: PagerDutySpec,
}

impl From<PagerDutyConfig> for ConnectorInfo {
    fn from(c: PagerDutyConfig) -> Self {
        Self {
            name: c.name,
            identifier: c.identifier,
            description: c.description,
            org_identifier: c.org_id.filter(|s| !s.is_empty()),
            project_identifier: c.project_id.filter(|s| !s.is_empty()),
            tags: Some(expand_tags(&c.tags)),
            connector_type: CONNECTOR_TYPE.to_string(),
            spec: PagerDutySpec {
                api_token_ref: Some(c.api_token_ref),
                delegate_selectors: Some(c.delegate_selectors),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct PagerDutyState {
    identifier: String,
    name: String,
    description: String,
    tags: Vec<String>,
    org_id: Option<String>,
    project_id: Option<String>,
    api_token_ref: Option<String>,
    delegate_selectors: Vec<String>,
}

fn flatten(d: &mut ResourceData, connector: ConnectorInfo) -> Result<(), Diagnostics> {
    if connector.connector_type != CONNECTOR_TYPE {
        return Err(Diagnostics::error(format!(
            "Connector {} is of type {}, expected {}",
            connector.identifier, connector.connector_type, CONNECTOR_TYPE
        )));
    }

    let mut selectors = connector.spec.delegate_selectors.unwrap_or_default();
    selectors.sort();

    d.set_id(connector.identifier.clone());
    d.apply(&PagerDutyState {
        identifier: connector.identifier,
        name: connector.name,
        description: connector.description.unwrap_or_default(),
        tags: flatten_tags(&connector.tags.unwrap_or_default()),
        org_id: connector.org_identifier.filter(|s| !s.is_empty()),
        project_id: connector.project_identifier.filter(|s| !s.is_empty()),
        api_token_ref: connector.spec.api_token_ref,
        delegate_selectors: selectors,
    })
}

async fn get_connector(
    client: &HarnessClient,
    identifier: &str,
    org_id: Option<&str>,
    project_id: Option<&str>,
) -> Result<Option<ConnectorInfo>, ApiError> {
    let url = scoped_query(client, org_id, project_id)
        .append_to(&client.ng_url(&format!("connectors/{}", segment(identifier))));
    let response = client.get(Api::NextGen, &url).await?;
    decode_field(&response, "connector")
}

#[derive(Debug, Deserialize)]
struct ConnectorListItem {
    connector: Option<ConnectorInfo>,
}

#[derive(Debug, Deserialize)]
struct ConnectorPage {
    #[serde(default)]
    content: Vec<ConnectorListItem>,
}

async fn find_connector_by_name(
    client: &HarnessClient,
    name: &str,
    org_id: Option<&str>,
    project_id: Option<&str>,
) -> Result<Option<ConnectorInfo>, ApiError> {
    let url = scoped_query(client, org_id, project_id)
        .with("searchTerm", name)
        .with("type", CONNECTOR_TYPE)
        .with("pageIndex", "0")
        .with("pageSize", "100")
        .append_to(&client.ng_url("connectors"));
    let page: Option<ConnectorPage> = decode_data(client.get(Api::NextGen, &url).await?)?;

    Ok(page
        .map(|p| p.content)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| item.connector)
        .find(|c| c.name == name))
}

async fn create_or_update(client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
    let config: PagerDutyConfig = d.decode()?;
    let connector = to_body(&ConnectorInfo::from(config))?;
    let body = json!({ "connector": connector });

    let url = client.account_query().append_to(&client.ng_url("connectors"));

    let response = if d.is_new() {
        client.post(Api::NextGen, &url, &body).await?
    } else {
        client.put(Api::NextGen, &url, &body).await?
    };

    match decode_field::<ConnectorInfo>(&response, "connector")? {
        Some(connector) => flatten(d, connector),
        None => Err(Diagnostics::error("Harness returned no connector")),
    }
}

pub struct PagerDutyConnectorResource;

#[async_trait]
impl Resource for PagerDutyConnectorResource {
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

        match get_connector(client, &id, org_id.as_deref(), project_id.as_deref()).await {
            Ok(Some(connector)) => flatten(d, connector),
            Ok(None) => {
                mark_gone(d, "Connector");
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
            .append_to(&client.ng_url(&format!("connectors/{}", segment(d.id()))));
        client.delete(Api::NextGen, &url).await?;
        Ok(())
    }
}

pub struct PagerDutyConnectorDataSource;

#[async_trait]
impl DataSource for PagerDutyConnectorDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let org_id = d.get_str("org_id").map(str::to_string);
        let project_id = d.get_str("project_id").map(str::to_string);

        let connector = if let Some(identifier) = d.get_str("identifier").map(str::to_string) {
            get_connector(client, &identifier, org_id.as_deref(), project_id.as_deref()).await?
        } else if let Some(name) = d.get_str("name").map(str::to_string) {
            find_connector_by_name(client, &name, org_id.as_deref(), project_id.as_deref()).await?
        } else {
            return Err(Diagnostics::error("either identifier or name must be specified"));
        };

        match connector {
            Some(connector) => flatten(d, connector),
            None => Ok(()),
        }
    }
}
