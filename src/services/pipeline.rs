//! `harness_platform_pipeline` resource and data source

use super::git::{self, GitCreateDetails, GitDetailsConfig, GitResponseDetails, GitUpdateDetails};
use super::{mark_gone, scope_or_current, segment, to_body};
use crate::harness::client::decode_data;
use crate::harness::{Api, ApiError, HarnessClient, QueryParams};
use crate::resource::diag::handle_read_error;
use crate::resource::tags::{expand_tags, flatten_tags};
use crate::resource::{DataSource, Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TYPE_NAME: &str = "harness_platform_pipeline";

#[derive(Debug, Deserialize)]
struct PipelineConfig {
    identifier: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    org_id: String,
    project_id: String,
    yaml: String,
    #[serde(default)]
    git_details: Option<Vec<GitDetailsConfig>>,
}

#[derive(Debug, Serialize)]
struct PipelineCreateRequest<'a> {
    slug: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    tags: BTreeMap<String, String>,
    pipeline_yaml: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_details: Option<GitCreateDetails>,
}

#[derive(Debug, Serialize)]
struct PipelineUpdateRequest<'a> {
    slug: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    tags: BTreeMap<String, String>,
    pipeline_yaml: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_details: Option<GitUpdateDetails>,
}

#[derive(Debug, Deserialize)]
struct PipelineResponse {
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
    pipeline_yaml: Option<String>,
    #[serde(default)]
    git_details: Option<GitResponseDetails>,
}

#[derive(Debug, Serialize)]
struct PipelineState {
    identifier: String,
    name: String,
    description: String,
    tags: Vec<String>,
    org_id: Option<String>,
    project_id: Option<String>,
    yaml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_details: Option<Vec<git::GitDetailsState>>,
}

fn flatten(d: &mut ResourceData, pipeline: PipelineResponse, configured: Option<&GitDetailsConfig>) -> Result<(), Diagnostics> {
    let org_id = scope_or_current(d, pipeline.org, "org_id");
    let project_id = scope_or_current(d, pipeline.project, "project_id");
    d.set_id(pipeline.slug.clone());
    d.apply(&PipelineState {
        identifier: pipeline.slug,
        name: pipeline.name,
        description: pipeline.description.unwrap_or_default(),
        tags: flatten_tags(&pipeline.tags.unwrap_or_default()),
        org_id,
        project_id,
        yaml: pipeline.pipeline_yaml,
        git_details: pipeline
            .git_details
            .map(|details| vec![git::flatten(details, configured)]),
    })
}

fn pipelines_url(client: &HarnessClient, org_id: &str, project_id: &str) -> String {
    client.v1_url(&format!(
        "orgs/{}/projects/{}/pipelines",
        segment(org_id),
        segment(project_id)
    ))
}

fn pipeline_url(client: &HarnessClient, org_id: &str, project_id: &str, identifier: &str) -> String {
    format!("{}/{}", pipelines_url(client, org_id, project_id), segment(identifier))
}

async fn get_pipeline(
    client: &HarnessClient,
    org_id: &str,
    project_id: &str,
    identifier: &str,
    configured: Option<&GitDetailsConfig>,
) -> Result<Option<PipelineResponse>, ApiError> {
    let url = git::read_query(QueryParams::new(), configured)
        .append_to(&pipeline_url(client, org_id, project_id, identifier));
    decode_data(client.get(Api::OpenApi, &url).await?)
}

/// Scope attributes every call needs, taken from config or imported state
fn scope(d: &ResourceData) -> Result<(String, String), Diagnostics> {
    match (d.get_str("org_id"), d.get_str("project_id")) {
        (Some(org), Some(project)) => Ok((org.to_string(), project.to_string())),
        _ => Err(Diagnostics::error("org_id and project_id must be set for pipelines")),
    }
}

pub struct PipelineResource;

#[async_trait]
impl Resource for PipelineResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::ProjectLevel
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: PipelineConfig = d.decode()?;
        let configured = git::first(&config.git_details);
        let body = to_body(&PipelineCreateRequest {
            slug: &config.identifier,
            name: &config.name,
            description: config.description.as_deref(),
            tags: expand_tags(&config.tags),
            pipeline_yaml: &config.yaml,
            git_details: configured.map(GitCreateDetails::from),
        })?;

        let url = pipelines_url(client, &config.org_id, &config.project_id);
        client.post(Api::OpenApi, &url, &body).await?;

        match get_pipeline(client, &config.org_id, &config.project_id, &config.identifier, configured).await? {
            Some(pipeline) => flatten(d, pipeline, configured),
            None => Err(Diagnostics::error(format!(
                "Pipeline {} was created but could not be read back",
                config.identifier
            ))),
        }
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let (org_id, project_id) = scope(d)?;
        let id = d.id().to_string();
        let config: PipelineConfigGit = d.decode()?;
        let configured = git::first(&config.git_details);

        match get_pipeline(client, &org_id, &project_id, &id, configured).await {
            Ok(Some(pipeline)) => flatten(d, pipeline, configured),
            Ok(None) => {
                mark_gone(d, "Pipeline");
                Ok(())
            }
            Err(err) => handle_read_error(err, d),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: PipelineConfig = d.decode()?;
        let configured = git::first(&config.git_details);
        let body = to_body(&PipelineUpdateRequest {
            slug: &config.identifier,
            name: &config.name,
            description: config.description.as_deref(),
            tags: expand_tags(&config.tags),
            pipeline_yaml: &config.yaml,
            git_details: configured.map(GitUpdateDetails::from),
        })?;

        let url = pipeline_url(client, &config.org_id, &config.project_id, d.id());
        client.put(Api::OpenApi, &url, &body).await?;

        let id = d.id().to_string();
        match get_pipeline(client, &config.org_id, &config.project_id, &id, configured).await? {
            Some(pipeline) => flatten(d, pipeline, configured),
            None => {
                mark_gone(d, "Pipeline");
                Ok(())
            }
        }
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let (org_id, project_id) = scope(d)?;
        let url = pipeline_url(client, &org_id, &project_id, d.id());
        client.delete(Api::OpenApi, &url).await?;
        Ok(())
    }
}

/// Only the git block, for reads where the rest of the config may be absent
#[derive(Debug, Default, Deserialize)]
struct PipelineConfigGit {
    #[serde(default)]
    git_details: Option<Vec<GitDetailsConfig>>,
}

pub struct PipelineDataSource;

#[async_trait]
impl DataSource for PipelineDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let (org_id, project_id) = scope(d)?;

        let pipeline = if let Some(identifier) = d.get_str("identifier").map(str::to_string) {
            get_pipeline(client, &org_id, &project_id, &identifier, None).await?
        } else if let Some(name) = d.get_str("name").map(str::to_string) {
            let url = QueryParams::new()
                .with("search_term", name.as_str())
                .with("page", "0")
                .with("limit", "100")
                .append_to(&pipelines_url(client, &org_id, &project_id));
            let list: Option<Vec<PipelineResponse>> = decode_data(client.get(Api::OpenApi, &url).await?)?;
            match list.unwrap_or_default().into_iter().find(|p| p.name == name) {
                // List entries carry no YAML, fetch the full pipeline
                Some(found) => get_pipeline(client, &org_id, &project_id, &found.slug, None).await?,
                None => None,
            }
        } else {
            return Err(Diagnostics::error("either identifier or name must be specified"));
        };

        match pipeline {
            Some(pipeline) => flatten(d, pipeline, None),
            None => Ok(()),
        }
    }
}
