//! GitOps data sources
//!
//! These live on the GitOps service rather than next-gen, are addressed
//! through the agent that owns them, and answer with bare bodies.

use super::segment;
use crate::harness::client::decode_data;
use crate::harness::{Api, HarnessClient, QueryParams};
use crate::resource::{DataSource, Diagnostics, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const REPO_CRED_TYPE_NAME: &str = "harness_platform_gitops_repo_cred";
const APP_PROJECT_TYPE_NAME: &str = "harness_platform_gitops_app_project";

/// GitOps calls take the account from configuration when one is given
fn gitops_query(client: &HarnessClient, d: &ResourceData) -> QueryParams {
    let query = match d.get_str("account_id").filter(|s| !s.is_empty()) {
        Some(account) => QueryParams::new().with("accountIdentifier", account),
        None => client.account_query(),
    };
    query
        .with_opt("orgIdentifier", d.get_str("org_id"))
        .with_opt("projectIdentifier", d.get_str("project_id"))
}

fn required<'a>(d: &'a ResourceData, key: &str) -> Result<&'a str, Diagnostics> {
    d.get_str(key)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Diagnostics::error(format!("{} must be set", key)))
}

// =============================================================================
// Repository credentials
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoCredentials {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    repo_creds: Option<RepoCreds>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoCreds {
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "type", default)]
    creds_type: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    ssh_private_key: Option<String>,
    #[serde(default)]
    tls_client_cert_data: Option<String>,
    #[serde(default)]
    tls_client_cert_key: Option<String>,
    #[serde(default)]
    github_app_private_key: Option<String>,
    #[serde(rename = "githubAppID", default)]
    github_app_id: Option<Value>,
    #[serde(rename = "githubAppInstallationID", default)]
    github_app_installation_id: Option<Value>,
    #[serde(default)]
    github_app_enterprise_base_url: Option<String>,
    #[serde(rename = "enableOCI", default)]
    enable_oci: Option<bool>,
}

#[derive(Debug, Serialize)]
struct CredsBlock {
    url: String,
    #[serde(rename = "type")]
    creds_type: String,
    username: String,
    password: String,
    ssh_private_key: String,
    tls_client_cert_data: String,
    tls_client_cert_key: String,
    github_app_private_key: String,
    github_app_id: String,
    github_app_installation_id: String,
    github_app_enterprise_base_url: String,
    enable_oci: bool,
}

/// GitHub app ids arrive as strings or numbers depending on the agent version
fn id_string(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

impl From<RepoCreds> for CredsBlock {
    fn from(c: RepoCreds) -> Self {
        Self {
            url: c.url.unwrap_or_default(),
            creds_type: c.creds_type.unwrap_or_default(),
            username: c.username.unwrap_or_default(),
            password: c.password.unwrap_or_default(),
            ssh_private_key: c.ssh_private_key.unwrap_or_default(),
            tls_client_cert_data: c.tls_client_cert_data.unwrap_or_default(),
            tls_client_cert_key: c.tls_client_cert_key.unwrap_or_default(),
            github_app_private_key: c.github_app_private_key.unwrap_or_default(),
            github_app_id: id_string(c.github_app_id),
            github_app_installation_id: id_string(c.github_app_installation_id),
            github_app_enterprise_base_url: c.github_app_enterprise_base_url.unwrap_or_default(),
            enable_oci: c.enable_oci.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RepoCredState {
    identifier: String,
    creds: Vec<CredsBlock>,
}

fn flatten_repo_cred(d: &mut ResourceData, creds: RepoCredentials, identifier: &str) -> Result<(), Diagnostics> {
    let identifier = creds.identifier.filter(|s| !s.is_empty()).unwrap_or_else(|| identifier.to_string());
    d.set_id(identifier.clone());
    d.apply(&RepoCredState {
        identifier,
        creds: vec![creds.repo_creds.unwrap_or_default().into()],
    })
}

pub struct RepoCredDataSource;

#[async_trait]
impl DataSource for RepoCredDataSource {
    fn type_name(&self) -> &'static str {
        REPO_CRED_TYPE_NAME
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let agent_id = required(d, "agent_id")?.to_string();
        let identifier = required(d, "identifier")?.to_string();
        let url = gitops_query(client, d).append_to(&client.gitops_url(&format!(
            "agents/{}/repocreds/{}",
            segment(&agent_id),
            segment(&identifier)
        )));

        let response = client.get(Api::GitOps, &url).await?;
        match decode_data::<RepoCredentials>(response)? {
            Some(creds) => flatten_repo_cred(d, creds, &identifier),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Application projects
// =============================================================================

#[derive(Debug, Deserialize)]
struct AppProject {
    #[serde(default)]
    metadata: Option<ProjectMetadata>,
    #[serde(default)]
    spec: Option<ProjectSpec>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    uid: String,
    #[serde(default)]
    resource_version: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSpec {
    #[serde(default)]
    description: String,
    #[serde(default)]
    source_repos: Vec<String>,
    #[serde(default)]
    destinations: Vec<Destination>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Destination {
    #[serde(default)]
    server: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
struct MetadataBlock {
    name: String,
    namespace: String,
    uid: String,
    resource_version: String,
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct SpecBlock {
    description: String,
    source_repos: Vec<String>,
    destinations: Vec<Destination>,
}

#[derive(Debug, Serialize)]
struct ProjectBlock {
    metadata: Vec<MetadataBlock>,
    spec: Vec<SpecBlock>,
}

#[derive(Debug, Serialize)]
struct AppProjectState {
    account_id: String,
    project: Vec<ProjectBlock>,
}

fn flatten_app_project(d: &mut ResourceData, account_id: String, project: AppProject) -> Result<(), Diagnostics> {
    let Some(metadata) = project.metadata else {
        return Ok(());
    };
    let spec = project.spec.unwrap_or_default();

    d.set_id(metadata.name.clone());
    d.apply(&AppProjectState {
        account_id,
        project: vec![ProjectBlock {
            metadata: vec![MetadataBlock {
                name: metadata.name,
                namespace: metadata.namespace,
                uid: metadata.uid,
                resource_version: metadata.resource_version,
                labels: metadata.labels,
            }],
            spec: vec![SpecBlock {
                description: spec.description,
                source_repos: spec.source_repos,
                destinations: spec.destinations,
            }],
        }],
    })
}

pub struct AppProjectDataSource;

#[async_trait]
impl DataSource for AppProjectDataSource {
    fn type_name(&self) -> &'static str {
        APP_PROJECT_TYPE_NAME
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let agent_id = required(d, "agent_id")?.to_string();
        let query_name = required(d, "query_name")?.to_string();
        let account_id = d
            .get_str("account_id")
            .filter(|s| !s.is_empty())
            .unwrap_or(client.account_id.as_str())
            .to_string();
        let url = gitops_query(client, d).append_to(&client.gitops_url(&format!(
            "agents/{}/projects/{}",
            segment(&agent_id),
            segment(&query_name)
        )));

        let response = client.get(Api::GitOps, &url).await?;
        match decode_data::<AppProject>(response)? {
            Some(project) => flatten_app_project(d, account_id, project),
            None => Ok(()),
        }
    }
}
