//! `harness_platform_feature_flag` resource
//!
//! The create call only accepts the flag itself. Per-environment settings
//! (target group rules, individual targets, state) and tags are applied
//! afterwards as PATCH instruction batches, one batch per environment.
//!
//! Reads are environment specific as well: the flag is fetched once per
//! configured environment and each answer upserts its `environment` block.

use super::{mark_gone, scope_or_current, segment, to_body};
use crate::harness::client::decode_data;
use crate::harness::{Api, ApiError, HarnessClient, QueryParams};
use crate::resource::diag::{handle_create_error, handle_read_error};
use crate::resource::{Diagnostic, Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

const TYPE_NAME: &str = "harness_platform_feature_flag";

const ADD_RULE: &str = "addRule";
const ADD_TARGETS: &str = "addTargetsToVariationTargetMap";
const ADD_TAG: &str = "addTag";
const SET_STATE: &str = "setFeatureFlagState";
const SEGMENT_MATCH: &str = "segmentMatch";
const BUCKET_BY: &str = "identifier";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Variation {
    identifier: String,
    name: String,
    #[serde(default)]
    description: String,
    value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct FlagTag {
    name: String,
    identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct WeightedVariation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct DistributionBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variations: Option<Vec<WeightedVariation>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct TargetGroupRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    distribution: Option<Vec<DistributionBlock>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct TargetRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    targets: Option<Vec<String>>,
}

/// One `environment` block, in configuration and in state alike
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct EnvironmentBlock {
    identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_on_variation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_off_variation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    add_target_group_rule: Option<Vec<TargetGroupRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    add_target_rule: Option<Vec<TargetRule>>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitCommit {
    commit_msg: String,
}

#[derive(Debug, Deserialize)]
struct FeatureFlagConfig {
    identifier: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    org_id: String,
    project_id: String,
    #[serde(default)]
    archived: Option<bool>,
    default_off_variation: String,
    default_on_variation: String,
    #[serde(default)]
    git_details: Option<Vec<GitCommit>>,
    kind: String,
    #[serde(default)]
    owner: Option<String>,
    permanent: bool,
    #[serde(default)]
    tags: Option<Vec<FlagTag>>,
    #[serde(default)]
    environment: Option<Vec<EnvironmentBlock>>,
    variation: Vec<Variation>,
}

/// Attributes needed to address an existing flag
#[derive(Debug, Deserialize)]
struct FlagLocation {
    org_id: String,
    project_id: String,
    #[serde(default)]
    environment: Option<Vec<EnvironmentBlock>>,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GitDetailsRequest<'a> {
    commit_msg: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateFlagRequest<'a> {
    identifier: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archived: Option<bool>,
    default_off_variation: &'a str,
    default_on_variation: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_details: Option<GitDetailsRequest<'a>>,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<&'a str>,
    permanent: bool,
    project: &'a str,
    variations: &'a [Variation],
}

impl<'a> From<&'a FeatureFlagConfig> for CreateFlagRequest<'a> {
    fn from(c: &'a FeatureFlagConfig) -> Self {
        Self {
            identifier: &c.identifier,
            name: &c.name,
            description: c.description.as_deref().filter(|s| !s.is_empty()),
            archived: c.archived,
            default_off_variation: &c.default_off_variation,
            default_on_variation: &c.default_on_variation,
            git_details: c
                .git_details
                .as_ref()
                .and_then(|g| g.first())
                .map(|g| GitDetailsRequest {
                    commit_msg: &g.commit_msg,
                }),
            kind: &c.kind,
            owner: c.owner.as_deref().filter(|s| !s.is_empty()),
            permanent: c.permanent,
            project: &c.project_id,
            variations: &c.variation,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PutFlagRequest<'a> {
    identifier: &'a str,
    name: &'a str,
    description: &'a str,
    default_off_variation: &'a str,
    default_on_variation: &'a str,
    permanent: bool,
    variations: &'a [Variation],
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [FlagTag],
}

fn no_tags(tags: &&[FlagTag]) -> bool {
    tags.is_empty()
}

impl<'a> From<&'a FeatureFlagConfig> for PutFlagRequest<'a> {
    fn from(c: &'a FeatureFlagConfig) -> Self {
        Self {
            identifier: &c.identifier,
            name: &c.name,
            description: c.description.as_deref().unwrap_or_default(),
            default_off_variation: &c.default_off_variation,
            default_on_variation: &c.default_on_variation,
            permanent: c.permanent,
            variations: &c.variation,
            tags: c.tags.as_deref().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct ServeVariation {
    variation: String,
    weight: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct ServeDistribution {
    bucket_by: &'static str,
    variations: Vec<ServeVariation>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Serve {
    #[serde(skip_serializing_if = "Option::is_none")]
    variation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distribution: Option<ServeDistribution>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct Clause {
    op: &'static str,
    values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    variation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clauses: Option<Vec<Clause>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serve: Option<Serve>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct Instruction {
    kind: &'static str,
    parameters: Parameters,
}

/// Instructions sent in one PATCH call
#[derive(Debug, Clone, PartialEq)]
struct PatchBatch {
    environment: Option<String>,
    instructions: Vec<Instruction>,
}

fn target_group_instruction(rule: &TargetGroupRule) -> Instruction {
    let distribution = rule
        .distribution
        .as_ref()
        .and_then(|d| d.first())
        .map(|d| ServeDistribution {
            bucket_by: BUCKET_BY,
            variations: d
                .variations
                .iter()
                .flatten()
                .map(|v| ServeVariation {
                    variation: v.variation.clone().unwrap_or_default(),
                    weight: v.weight.unwrap_or_default(),
                })
                .collect(),
        });

    Instruction {
        kind: ADD_RULE,
        parameters: Parameters {
            serve: Some(Serve {
                variation: rule.variation.clone().filter(|s| !s.is_empty()),
                distribution,
            }),
            clauses: Some(vec![Clause {
                op: SEGMENT_MATCH,
                values: vec![rule.group_name.clone().unwrap_or_default()],
            }]),
            ..Default::default()
        },
    }
}

fn environment_instructions(env: &EnvironmentBlock) -> Vec<Instruction> {
    let mut instructions: Vec<Instruction> = env
        .add_target_group_rule
        .iter()
        .flatten()
        .map(target_group_instruction)
        .collect();

    instructions.extend(
        env.add_target_rule
            .iter()
            .flatten()
            .filter(|rule| rule.targets.as_ref().is_some_and(|t| !t.is_empty()))
            .map(|rule| Instruction {
                kind: ADD_TARGETS,
                parameters: Parameters {
                    variation: rule.variation.clone(),
                    targets: rule.targets.clone(),
                    ..Default::default()
                },
            }),
    );

    if let Some(state) = env.state.as_deref().filter(|s| !s.is_empty()) {
        instructions.push(Instruction {
            kind: SET_STATE,
            parameters: Parameters {
                state: Some(state.to_string()),
                ..Default::default()
            },
        });
    }
    instructions
}

/// Group the follow-up instructions into PATCH calls. Tags ride along with
/// the first batch; an empty result means no PATCH is needed.
fn patch_batches(config: &FeatureFlagConfig) -> Vec<PatchBatch> {
    let mut batches: Vec<PatchBatch> = config
        .environment
        .iter()
        .flatten()
        .map(|env| PatchBatch {
            environment: Some(env.identifier.clone()),
            instructions: environment_instructions(env),
        })
        .filter(|batch| !batch.instructions.is_empty())
        .collect();

    let tag_instructions: Vec<Instruction> = config
        .tags
        .iter()
        .flatten()
        .map(|tag| Instruction {
            kind: ADD_TAG,
            parameters: Parameters {
                name: Some(tag.name.clone()),
                identifier: Some(tag.identifier.clone()),
                ..Default::default()
            },
        })
        .collect();

    if !tag_instructions.is_empty() {
        match batches.first_mut() {
            Some(first) => first.instructions.extend(tag_instructions),
            None => batches.push(PatchBatch {
                environment: None,
                instructions: tag_instructions,
            }),
        }
    }
    batches
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Deserialize)]
struct ServeResponse {
    #[serde(default)]
    variation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TargetRef {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct VariationMapEntry {
    #[serde(default)]
    variation: Option<String>,
    #[serde(default)]
    targets: Option<Vec<TargetRef>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvProperties {
    environment: String,
    #[serde(default)]
    default_serve: Option<ServeResponse>,
    #[serde(default)]
    off_variation: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    variation_map: Option<Vec<VariationMapEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    identifier: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    default_on_variation: Option<String>,
    #[serde(default)]
    default_off_variation: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    permanent: Option<bool>,
    #[serde(default)]
    archived: Option<bool>,
    #[serde(default)]
    owner: Option<Vec<String>>,
    #[serde(default)]
    variations: Option<Vec<Variation>>,
    #[serde(default)]
    tags: Option<Vec<FlagTag>>,
    #[serde(default)]
    env_properties: Option<EnvProperties>,
}

#[derive(Debug, Serialize)]
struct FeatureFlagState {
    identifier: String,
    name: String,
    description: String,
    org_id: String,
    project_id: Option<String>,
    default_on_variation: Option<String>,
    default_off_variation: Option<String>,
    kind: Option<String>,
    permanent: Option<bool>,
    archived: Option<bool>,
    owner: Option<String>,
    variation: Option<Vec<Variation>>,
    tags: Option<Vec<FlagTag>>,
    /// `None` when the flag was read without environment properties
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<Vec<EnvironmentBlock>>,
}

impl From<EnvProperties> for EnvironmentBlock {
    fn from(p: EnvProperties) -> Self {
        let target_rules: Vec<TargetRule> = p
            .variation_map
            .into_iter()
            .flatten()
            .map(|entry| TargetRule {
                variation: entry.variation,
                targets: entry
                    .targets
                    .map(|t| t.into_iter().map(|t| t.identifier).collect()),
            })
            .collect();

        Self {
            identifier: p.environment,
            state: p.state,
            default_on_variation: p.default_serve.and_then(|s| s.variation),
            default_off_variation: p.off_variation,
            add_target_group_rule: None,
            add_target_rule: Some(target_rules),
        }
    }
}

/// Replace the block for the answered environment, or append it
fn upsert_environment(mut environments: Vec<EnvironmentBlock>, updated: EnvironmentBlock) -> Vec<EnvironmentBlock> {
    match environments
        .iter_mut()
        .find(|env| env.identifier == updated.identifier)
    {
        Some(existing) => {
            let group_rules = existing.add_target_group_rule.take();
            *existing = EnvironmentBlock {
                add_target_group_rule: group_rules,
                ..updated
            };
        }
        None => environments.push(updated),
    }
    environments
}

fn flatten(d: &mut ResourceData, flag: Feature, org_id: &str) -> Result<(), Diagnostics> {
    let environment = match flag.env_properties {
        Some(props) => {
            let current: Vec<EnvironmentBlock> = match d.get("environment") {
                Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                    Diagnostics::from(
                        Diagnostic::error("Invalid environment blocks in state")
                            .with_detail(e.to_string())
                            .with_attribute("environment"),
                    )
                })?,
                None => Vec::new(),
            };
            Some(upsert_environment(current, props.into()))
        }
        None => None,
    };

    let project_id = scope_or_current(d, flag.project, "project_id");
    d.set_id(flag.identifier.clone());
    d.apply(&FeatureFlagState {
        identifier: flag.identifier,
        name: flag.name,
        description: flag.description.unwrap_or_default(),
        org_id: org_id.to_string(),
        project_id,
        default_on_variation: flag.default_on_variation,
        default_off_variation: flag.default_off_variation,
        kind: flag.kind,
        permanent: flag.permanent,
        archived: flag.archived,
        owner: flag.owner.map(|o| o.join(",")),
        variation: flag.variations,
        tags: flag.tags.filter(|t| !t.is_empty()),
        environment,
    })
}

// ============================================================================
// API calls
// ============================================================================

fn flag_query(client: &HarnessClient, org_id: &str, project_id: &str) -> QueryParams {
    client
        .account_query()
        .with("orgIdentifier", org_id)
        .with("projectIdentifier", project_id)
}

fn flag_url(client: &HarnessClient, identifier: &str) -> String {
    client.cf_url(&format!("features/{}", segment(identifier)))
}

async fn get_flag(
    client: &HarnessClient,
    identifier: &str,
    org_id: &str,
    project_id: &str,
    environment: &str,
) -> Result<Option<Feature>, ApiError> {
    let url = flag_query(client, org_id, project_id)
        .with("environmentIdentifier", environment)
        .append_to(&flag_url(client, identifier));
    decode_data(client.get(Api::FeatureFlags, &url).await?)
}

/// Fetch the flag once per configured environment (or once without one)
async fn refresh(client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
    let location: FlagLocation = d.decode()?;
    let id = d.id().to_string();

    let mut environments: Vec<String> = location
        .environment
        .iter()
        .flatten()
        .map(|env| env.identifier.clone())
        .collect();
    if environments.is_empty() {
        environments.push(String::new());
    }

    for environment in environments {
        match get_flag(client, &id, &location.org_id, &location.project_id, &environment).await {
            Ok(Some(flag)) => flatten(d, flag, &location.org_id)?,
            Ok(None) => {
                mark_gone(d, "Feature flag");
                return Ok(());
            }
            Err(err) => return handle_read_error(err, d),
        }
    }
    Ok(())
}

async fn apply_patches(client: &HarnessClient, config: &FeatureFlagConfig) -> Result<(), Diagnostics> {
    for batch in patch_batches(config) {
        tracing::debug!(
            "Patching feature flag {} with {} instruction(s) for environment {:?}",
            config.identifier,
            batch.instructions.len(),
            batch.environment
        );
        let url = flag_query(client, &config.org_id, &config.project_id)
            .with_opt("environmentIdentifier", batch.environment.as_deref())
            .append_to(&flag_url(client, &config.identifier));
        let body = json!({ "instructions": to_body(&batch.instructions)? });
        client.patch(Api::FeatureFlags, &url, &body).await?;
    }
    Ok(())
}

pub struct FeatureFlagResource;

#[async_trait]
impl Resource for FeatureFlagResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::ProjectLevel
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: FeatureFlagConfig = d.decode()?;
        let body = to_body(&CreateFlagRequest::from(&config))?;
        let url = client
            .account_query()
            .with("orgIdentifier", config.org_id.as_str())
            .append_to(&client.cf_url("features"));

        client.post(Api::FeatureFlags, &url, &body).await.map_err(|err| {
            handle_create_error(
                err,
                &format!(
                    "A feature flag with identifier [{}] orgIdentifier [{}] project [{}]",
                    config.identifier, config.org_id, config.project_id
                ),
            )
        })?;

        d.set_id(config.identifier.clone());
        apply_patches(client, &config).await?;
        refresh(client, d).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        refresh(client, d).await
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: FeatureFlagConfig = d.decode()?;
        let body = to_body(&PutFlagRequest::from(&config))?;
        let url = flag_query(client, &config.org_id, &config.project_id)
            .append_to(&flag_url(client, d.id()));

        client.put(Api::FeatureFlags, &url, &body).await?;
        refresh(client, d).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let location: FlagLocation = d.decode()?;
        let url = flag_query(client, &location.org_id, &location.project_id)
            .with_bool("forceDelete", Some(true))
            .append_to(&flag_url(client, d.id()));
        client.delete(Api::FeatureFlags, &url).await?;
        Ok(())
    }
}
