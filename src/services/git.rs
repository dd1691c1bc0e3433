//! `git_details` block shared by pipelines and input sets
//!
//! The API only echoes back where the entity lives (branch, file, repo,
//! commit). Settings that steer the write itself (store type, base branch,
//! commit message, connector) are kept from the configuration.

use crate::harness::QueryParams;
use serde::{Deserialize, Serialize};

/// One `git_details` block as configured
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GitDetailsConfig {
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub base_branch: Option<String>,
    #[serde(default)]
    pub connector_ref: Option<String>,
    #[serde(default)]
    pub store_type: Option<String>,
    #[serde(default)]
    pub repo_name: Option<String>,
    #[serde(default)]
    pub last_object_id: Option<String>,
    #[serde(default)]
    pub last_commit_id: Option<String>,
    #[serde(default)]
    pub parent_entity_connector_ref: Option<String>,
    #[serde(default)]
    pub parent_entity_repo_name: Option<String>,
}

/// First block of an optional `git_details` list
pub(crate) fn first(blocks: &Option<Vec<GitDetailsConfig>>) -> Option<&GitDetailsConfig> {
    blocks.as_ref().and_then(|b| b.first())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|s| !s.is_empty())
}

/// `git_details` body of a create call
#[derive(Debug, Serialize)]
pub(crate) struct GitCreateDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    connector_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo_name: Option<String>,
}

impl From<&GitDetailsConfig> for GitCreateDetails {
    fn from(c: &GitDetailsConfig) -> Self {
        Self {
            branch_name: non_empty(&c.branch_name),
            file_path: non_empty(&c.file_path),
            commit_message: non_empty(&c.commit_message),
            base_branch: non_empty(&c.base_branch),
            connector_ref: non_empty(&c.connector_ref),
            store_type: non_empty(&c.store_type),
            repo_name: non_empty(&c.repo_name),
        }
    }
}

/// `git_details` body of an update call
#[derive(Debug, Serialize)]
pub(crate) struct GitUpdateDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_entity_connector_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_entity_repo_name: Option<String>,
}

impl From<&GitDetailsConfig> for GitUpdateDetails {
    fn from(c: &GitDetailsConfig) -> Self {
        Self {
            branch_name: non_empty(&c.branch_name),
            commit_message: non_empty(&c.commit_message),
            base_branch: non_empty(&c.base_branch),
            last_object_id: non_empty(&c.last_object_id),
            last_commit_id: non_empty(&c.last_commit_id),
            parent_entity_connector_ref: non_empty(&c.parent_entity_connector_ref),
            parent_entity_repo_name: non_empty(&c.parent_entity_repo_name),
        }
    }
}

/// `git_details` as returned by the API
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GitResponseDetails {
    #[serde(default)]
    branch_name: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    repo_name: Option<String>,
    #[serde(default)]
    commit_id: Option<String>,
    #[serde(default)]
    object_id: Option<String>,
}

/// Flattened `git_details` block
#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct GitDetailsState {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    connector_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_entity_connector_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_entity_repo_name: Option<String>,
}

/// Merge the API answer with the write-side settings from the configuration
pub(crate) fn flatten(response: GitResponseDetails, configured: Option<&GitDetailsConfig>) -> GitDetailsState {
    let configured = configured.cloned().unwrap_or_default();
    GitDetailsState {
        branch_name: non_empty(&response.branch_name),
        file_path: non_empty(&response.file_path),
        repo_name: non_empty(&response.repo_name),
        last_commit_id: non_empty(&response.commit_id),
        last_object_id: non_empty(&response.object_id),
        store_type: non_empty(&configured.store_type),
        base_branch: non_empty(&configured.base_branch),
        commit_message: non_empty(&configured.commit_message),
        connector_ref: non_empty(&configured.connector_ref),
        parent_entity_connector_ref: non_empty(&configured.parent_entity_connector_ref),
        parent_entity_repo_name: non_empty(&configured.parent_entity_repo_name),
    }
}

/// Query selecting the branch (and parent entity) a read should look at
pub(crate) fn read_query(query: QueryParams, configured: Option<&GitDetailsConfig>) -> QueryParams {
    let Some(git) = configured else {
        return query;
    };
    query
        .with_opt("branch_name", git.branch_name.as_deref())
        .with_opt("parent_entity_connector_ref", git.parent_entity_connector_ref.as_deref())
        .with_opt("parent_entity_repo_name", git.parent_entity_repo_name.as_deref())
}
