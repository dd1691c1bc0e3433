//! Harness entities exposed as resources and data sources
//!
//! Each module follows the same shape: a config model decoded from
//! [`ResourceData`], request/response models matching the Harness API, and a
//! state model flattened back.

pub mod api_key;
pub mod application;
pub mod connector;
pub mod environment;
pub mod feature_flag;
mod git;
pub mod gitops;
pub mod gitx_webhook;
pub mod input_set;
pub mod pipeline;
pub mod secret;
pub mod service;
pub mod service_override;
pub mod target_group;
pub mod token;
pub mod user;

use crate::harness::{HarnessClient, QueryParams};
use crate::resource::{DataSource, Diagnostic, Diagnostics, Resource, ResourceData};
use serde::Serialize;
use serde_json::Value;

/// Every managed resource type
pub fn all_resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(environment::EnvironmentResource),
        Box::new(service::ServiceResource),
        Box::new(api_key::ApiKeyResource),
        Box::new(token::TokenResource),
        Box::new(connector::PagerDutyConnectorResource),
        Box::new(secret::SecretTextResource),
        Box::new(secret::SecretWinRmResource),
        Box::new(service_override::ServiceOverrideResource),
        Box::new(gitx_webhook::GitxWebhookResource),
        Box::new(pipeline::PipelineResource),
        Box::new(input_set::InputSetResource),
        Box::new(feature_flag::FeatureFlagResource),
        Box::new(target_group::TargetGroupResource),
        Box::new(application::ApplicationResource),
        Box::new(user::UserResource),
    ]
}

/// Every data source type
pub fn all_data_sources() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(environment::EnvironmentDataSource),
        Box::new(service::ServiceDataSource),
        Box::new(connector::PagerDutyConnectorDataSource),
        Box::new(pipeline::PipelineDataSource),
        Box::new(application::ApplicationDataSource),
        Box::new(gitops::RepoCredDataSource),
        Box::new(gitops::AppProjectDataSource),
    ]
}

/// Account query plus the optional org/project scope
pub(crate) fn scoped_query(client: &HarnessClient, org_id: Option<&str>, project_id: Option<&str>) -> QueryParams {
    client
        .account_query()
        .with_opt("orgIdentifier", org_id)
        .with_opt("projectIdentifier", project_id)
}

/// A 200 answer without payload means the entity was soft deleted
pub(crate) fn mark_gone(d: &mut ResourceData, what: &str) {
    tracing::warn!("{} {} no longer exists, removing from state", what, d.id());
    d.clear_id();
}

/// Scope missing from an answer keeps the value already in state, later
/// reads and deletes are addressed through it
pub(crate) fn scope_or_current(d: &ResourceData, answered: Option<String>, key: &str) -> Option<String> {
    answered
        .filter(|s| !s.is_empty())
        .or_else(|| d.get_str(key).map(str::to_string))
}

/// Path segment with reserved characters escaped
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Serialize a request model into a JSON body
pub(crate) fn to_body<T: Serialize>(request: &T) -> Result<Value, Diagnostics> {
    serde_json::to_value(request).map_err(|e| {
        Diagnostics::from(Diagnostic::error("Failed to build request").with_detail(e.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::registry::{data_source_names, resource_names};

    #[test]
    fn test_every_resource_has_a_schema() {
        let mut registered: Vec<&str> = all_resources().iter().map(|r| r.type_name()).collect();
        registered.sort_unstable();
        assert_eq!(registered, resource_names());
    }

    #[test]
    fn test_every_data_source_has_a_schema() {
        let mut registered: Vec<&str> = all_data_sources().iter().map(|r| r.type_name()).collect();
        registered.sort_unstable();
        assert_eq!(registered, data_source_names());
    }

    #[test]
    fn test_scoped_query_skips_missing_scope() {
        let client = HarnessClient::with_credentials(
            "https://app.harness.io/gateway",
            "acc",
            crate::harness::auth::Credentials::default(),
        )
        .unwrap();
        let query = scoped_query(&client, Some("default"), None);
        assert_eq!(query.get("orgIdentifier"), Some("default"));
        assert_eq!(query.get("projectIdentifier"), None);
    }

    #[test]
    fn test_scope_or_current_prefers_answer() {
        let mut d = ResourceData::default();
        d.set("org_id", "default");
        assert_eq!(scope_or_current(&d, Some("other".into()), "org_id").as_deref(), Some("other"));
        assert_eq!(scope_or_current(&d, Some(String::new()), "org_id").as_deref(), Some("default"));
        assert_eq!(scope_or_current(&d, None, "project_id"), None);
    }

    #[test]
    fn test_segment_escapes_reserved_characters() {
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
    }
}
