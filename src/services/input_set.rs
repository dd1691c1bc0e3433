//! `harness_platform_input_set` resource

use super::git::{self, GitCreateDetails, GitDetailsConfig, GitResponseDetails, GitUpdateDetails};
use super::{mark_gone, scope_or_current, segment, to_body};
use crate::harness::client::decode_data;
use crate::harness::{Api, ApiError, HarnessClient, QueryParams};
use crate::resource::diag::handle_read_error;
use crate::resource::tags::{expand_tags, flatten_tags};
use crate::resource::{Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TYPE_NAME: &str = "harness_platform_input_set";

#[derive(Debug, Deserialize)]
struct InputSetConfig {
    identifier: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    org_id: String,
    project_id: String,
    pipeline_id: String,
    yaml: String,
    #[serde(default)]
    git_details: Option<Vec<GitDetailsConfig>>,
}

/// Where an input set lives; present in config and in imported state
#[derive(Debug, Deserialize)]
struct InputSetLocation {
    org_id: String,
    project_id: String,
    pipeline_id: String,
    #[serde(default)]
    git_details: Option<Vec<GitDetailsConfig>>,
}

#[derive(Debug, Serialize)]
struct InputSetRequest<'a, G> {
    slug: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    tags: BTreeMap<String, String>,
    input_set_yaml: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_details: Option<G>,
}

impl<'a, G> InputSetRequest<'a, G>
where
    G: From<&'a GitDetailsConfig>,
{
    fn new(c: &'a InputSetConfig) -> Self {
        Self {
            slug: &c.identifier,
            name: &c.name,
            description: c.description.as_deref(),
            tags: expand_tags(&c.tags),
            input_set_yaml: &c.yaml,
            git_details: git::first(&c.git_details).map(G::from),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputSetResponse {
    #[serde(alias = "identifier")]
    slug: String,
    name: String,
    #[serde(default)]
    org: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    input_set_yaml: Option<String>,
    #[serde(default)]
    git_details: Option<GitResponseDetails>,
}

#[derive(Debug, Serialize)]
struct InputSetState {
    identifier: String,
    name: String,
    description: String,
    tags: Vec<String>,
    org_id: Option<String>,
    project_id: Option<String>,
    pipeline_id: String,
    yaml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_details: Option<Vec<git::GitDetailsState>>,
}

fn flatten(
    d: &mut ResourceData,
    input_set: InputSetResponse,
    pipeline_id: &str,
    configured: Option<&GitDetailsConfig>,
) -> Result<(), Diagnostics> {
    let org_id = scope_or_current(d, input_set.org, "org_id");
    let project_id = scope_or_current(d, input_set.project, "project_id");
    d.set_id(input_set.slug.clone());
    d.apply(&InputSetState {
        identifier: input_set.slug,
        name: input_set.name,
        description: input_set.description.unwrap_or_default(),
        tags: flatten_tags(&input_set.tags.unwrap_or_default()),
        org_id,
        project_id,
        pipeline_id: pipeline_id.to_string(),
        yaml: input_set.input_set_yaml,
        git_details: input_set
            .git_details
            .map(|details| vec![git::flatten(details, configured)]),
    })
}

fn input_sets_url(client: &HarnessClient, org_id: &str, project_id: &str) -> String {
    client.v1_url(&format!(
        "orgs/{}/projects/{}/input-sets",
        segment(org_id),
        segment(project_id)
    ))
}

fn input_set_url(client: &HarnessClient, org_id: &str, project_id: &str, identifier: &str) -> String {
    format!("{}/{}", input_sets_url(client, org_id, project_id), segment(identifier))
}

fn pipeline_query(pipeline_id: &str) -> QueryParams {
    QueryParams::new().with("pipeline", pipeline_id)
}

async fn get_input_set(
    client: &HarnessClient,
    location: &InputSetLocation,
    identifier: &str,
) -> Result<Option<InputSetResponse>, ApiError> {
    let url = git::read_query(pipeline_query(&location.pipeline_id), git::first(&location.git_details))
        .append_to(&input_set_url(client, &location.org_id, &location.project_id, identifier));
    decode_data(client.get(Api::OpenApi, &url).await?)
}

/// Read back after a write; a missing answer right after a write is an error
async fn read_back(client: &HarnessClient, d: &mut ResourceData, identifier: &str) -> Result<(), Diagnostics> {
    let location: InputSetLocation = d.decode()?;
    match get_input_set(client, &location, identifier).await? {
        Some(input_set) => {
            flatten(d, input_set, &location.pipeline_id, git::first(&location.git_details))
        }
        None => Err(Diagnostics::error(format!(
            "Input set {} could not be read back",
            identifier
        ))),
    }
}

pub struct InputSetResource;

#[async_trait]
impl Resource for InputSetResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::PipelineChild
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: InputSetConfig = d.decode()?;
        let body = to_body(&InputSetRequest::<GitCreateDetails>::new(&config))?;

        let url = pipeline_query(&config.pipeline_id)
            .append_to(&input_sets_url(client, &config.org_id, &config.project_id));
        client.post(Api::OpenApi, &url, &body).await?;

        read_back(client, d, &config.identifier).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let location: InputSetLocation = d.decode()?;
        let id = d.id().to_string();

        match get_input_set(client, &location, &id).await {
            Ok(Some(input_set)) => {
                flatten(d, input_set, &location.pipeline_id, git::first(&location.git_details))
            }
            Ok(None) => {
                mark_gone(d, "Input set");
                Ok(())
            }
            Err(err) => handle_read_error(err, d),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: InputSetConfig = d.decode()?;
        let body = to_body(&InputSetRequest::<GitUpdateDetails>::new(&config))?;

        let url = pipeline_query(&config.pipeline_id)
            .append_to(&input_set_url(client, &config.org_id, &config.project_id, d.id()));
        client.put(Api::OpenApi, &url, &body).await?;

        let id = d.id().to_string();
        read_back(client, d, &id).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let location: InputSetLocation = d.decode()?;
        let url = pipeline_query(&location.pipeline_id)
            .append_to(&input_set_url(client, &location.org_id, &location.project_id, d.id()));
        client.delete(Api::OpenApi, &url).await?;
        Ok(())
    }
}
