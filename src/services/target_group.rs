//! `harness_platform_feature_flag_target_group` resource
//!
//! Updates are not a PUT. The prior and new `included`, `excluded` and `rule`
//! values are compared and only the differences are sent as PATCH
//! instructions.

use super::{mark_gone, segment, to_body};
use crate::harness::client::decode_data;
use crate::harness::{Api, ApiError, HarnessClient, QueryParams};
use crate::resource::diag::{handle_create_error, handle_read_error};
use crate::resource::{Diagnostic, Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

const TYPE_NAME: &str = "harness_platform_feature_flag_target_group";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct RuleBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    attribute: String,
    #[serde(default)]
    negate: bool,
    op: String,
    #[serde(default)]
    values: Vec<String>,
}

impl RuleBlock {
    /// Rules are matched on content, the server assigned id is ignored
    fn key(&self) -> String {
        format!("{}_{}_{}", self.attribute, self.op, self.values.join(" "))
    }
}

#[derive(Debug, Deserialize)]
struct TargetGroupConfig {
    identifier: String,
    org_id: String,
    project_id: String,
    environment: String,
    name: String,
    #[serde(default)]
    included: Option<Vec<String>>,
    #[serde(default)]
    excluded: Option<Vec<String>>,
    #[serde(default)]
    rule: Option<Vec<RuleBlock>>,
}

/// Attributes needed to address an existing target group
#[derive(Debug, Deserialize)]
struct TargetGroupLocation {
    org_id: String,
    project_id: String,
    environment: String,
}

#[derive(Debug, Serialize)]
struct RuleRequest<'a> {
    attribute: &'a str,
    negate: bool,
    op: &'a str,
    values: &'a [String],
}

#[derive(Debug, Serialize)]
struct SegmentRequest<'a> {
    identifier: &'a str,
    project: &'a str,
    environment: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    included: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    excluded: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rules: Option<Vec<RuleRequest<'a>>>,
}

impl<'a> From<&'a TargetGroupConfig> for SegmentRequest<'a> {
    fn from(c: &'a TargetGroupConfig) -> Self {
        Self {
            identifier: &c.identifier,
            project: &c.project_id,
            environment: &c.environment,
            name: &c.name,
            included: c.included.as_deref().filter(|t| !t.is_empty()),
            excluded: c.excluded.as_deref().filter(|t| !t.is_empty()),
            rules: c.rule.as_ref().filter(|r| !r.is_empty()).map(|rules| {
                rules
                    .iter()
                    .map(|r| RuleRequest {
                        attribute: &r.attribute,
                        negate: r.negate,
                        op: &r.op,
                        values: &r.values,
                    })
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TargetRef {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct Segment {
    identifier: String,
    name: String,
    #[serde(default)]
    included: Option<Vec<TargetRef>>,
    #[serde(default)]
    excluded: Option<Vec<TargetRef>>,
    #[serde(default)]
    rules: Option<Vec<RuleBlock>>,
}

#[derive(Debug, Serialize)]
struct TargetGroupState {
    identifier: String,
    name: String,
    org_id: String,
    project_id: String,
    account_id: String,
    environment: String,
    included: Vec<String>,
    excluded: Vec<String>,
    rule: Vec<RuleBlock>,
}

fn identifiers(targets: Option<Vec<TargetRef>>) -> Vec<String> {
    targets
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.identifier)
        .collect()
}

fn flatten(d: &mut ResourceData, segment: Segment, location: &TargetGroupLocation, account_id: &str) -> Result<(), Diagnostics> {
    d.set_id(segment.identifier.clone());
    d.apply(&TargetGroupState {
        identifier: segment.identifier,
        name: segment.name,
        org_id: location.org_id.clone(),
        project_id: location.project_id.clone(),
        account_id: account_id.to_string(),
        environment: location.environment.clone(),
        included: identifiers(segment.included),
        excluded: identifiers(segment.excluded),
        rule: segment.rules.unwrap_or_default(),
    })
}

// ============================================================================
// Update instructions
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
struct Instruction {
    kind: &'static str,
    parameters: Value,
}

/// Entries of `old` missing from `new`, and entries of `new` missing from `old`
fn list_diff(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old_set: HashSet<&String> = old.iter().collect();
    let new_set: HashSet<&String> = new.iter().collect();

    let extra = old.iter().filter(|t| !new_set.contains(t)).cloned().collect();
    let missing = new.iter().filter(|t| !old_set.contains(t)).cloned().collect();
    (extra, missing)
}

/// Same as [`list_diff`] for rules, compared by [`RuleBlock::key`]
fn rule_diff(old: &[RuleBlock], new: &[RuleBlock]) -> (Vec<RuleBlock>, Vec<RuleBlock>) {
    let old_keys: HashSet<String> = old.iter().map(RuleBlock::key).collect();
    let new_keys: HashSet<String> = new.iter().map(RuleBlock::key).collect();

    let extra = old
        .iter()
        .filter(|r| !new_keys.contains(&r.key()))
        .cloned()
        .collect();
    let missing = new
        .iter()
        .filter(|r| !old_keys.contains(&r.key()))
        .cloned()
        .collect();
    (extra, missing)
}

fn decode_change<T: serde::de::DeserializeOwned + Default>(key: &str, value: Option<&Value>) -> Result<T, Diagnostics> {
    match value.filter(|v| !v.is_null()) {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
            Diagnostics::from(
                Diagnostic::error(format!("Invalid value for {}", key))
                    .with_detail(e.to_string())
                    .with_attribute(key),
            )
        }),
        None => Ok(T::default()),
    }
}

/// PATCH instructions turning the prior state into the new configuration.
/// Removals come first so a target never sits in both lists at once.
fn update_instructions(d: &ResourceData) -> Result<Vec<Instruction>, Diagnostics> {
    let mut removals = Vec::new();
    let mut additions = Vec::new();

    for (key, remove_kind, add_kind) in [
        ("included", "removeFromIncludeList", "addToIncludeList"),
        ("excluded", "removeFromExcludeList", "addToExcludeList"),
    ] {
        if !d.has_change(key) {
            continue;
        }
        let (old, new) = d.get_change(key);
        let old: Vec<String> = decode_change(key, old)?;
        let new: Vec<String> = decode_change(key, new)?;

        let (extra, missing) = list_diff(&old, &new);
        if !extra.is_empty() {
            removals.push(Instruction {
                kind: remove_kind,
                parameters: json!({ "targets": extra }),
            });
        }
        if !missing.is_empty() {
            additions.push(Instruction {
                kind: add_kind,
                parameters: json!({ "targets": missing }),
            });
        }
    }

    let mut instructions = removals;
    instructions.append(&mut additions);

    if d.has_change("rule") {
        let (old, new) = d.get_change("rule");
        let old: Vec<RuleBlock> = decode_change("rule", old)?;
        let new: Vec<RuleBlock> = decode_change("rule", new)?;
        let (extra, missing) = rule_diff(&old, &new);

        for rule in extra {
            match rule.id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => instructions.push(Instruction {
                    kind: "removeClause",
                    parameters: json!({ "clauseID": id }),
                }),
                None => tracing::warn!("Rule {} has no id, cannot remove it", rule.key()),
            }
        }
        for rule in missing {
            instructions.push(Instruction {
                kind: "addClause",
                parameters: json!({
                    "attribute": rule.attribute,
                    "op": rule.op,
                    "values": rule.values,
                    "negate": rule.negate,
                }),
            });
        }
    }

    Ok(instructions)
}

// ============================================================================
// API calls
// ============================================================================

fn segment_url(client: &HarnessClient, location: &TargetGroupLocation, identifier: &str) -> String {
    client
        .account_query()
        .with("orgIdentifier", location.org_id.as_str())
        .with("projectIdentifier", location.project_id.as_str())
        .with("environmentIdentifier", location.environment.as_str())
        .append_to(&client.cf_url(&format!("segments/{}", segment(identifier))))
}

async fn get_segment(client: &HarnessClient, location: &TargetGroupLocation, identifier: &str) -> Result<Option<Segment>, ApiError> {
    let url = segment_url(client, location, identifier);
    decode_data(client.get(Api::FeatureFlags, &url).await?)
}

/// Read back after a write, where the group must exist
async fn read_back(client: &HarnessClient, d: &mut ResourceData, location: &TargetGroupLocation) -> Result<(), Diagnostics> {
    let id = d.id().to_string();
    match get_segment(client, location, &id).await? {
        Some(segment) => flatten(d, segment, location, &client.account_id),
        None => Err(Diagnostics::error(format!(
            "Target group {} could not be read back",
            id
        ))),
    }
}

pub struct TargetGroupResource;

#[async_trait]
impl Resource for TargetGroupResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::EnvironmentChild
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let config: TargetGroupConfig = d.decode()?;
        let body = to_body(&SegmentRequest::from(&config))?;
        let url = client
            .account_query()
            .with("orgIdentifier", config.org_id.as_str())
            .append_to(&client.cf_url("segments"));

        let status = match client
            .request_with_status(Api::FeatureFlags, Method::POST, &url, Some(&body))
            .await
        {
            Ok((status, _)) => status,
            Err(err) => {
                return Err(handle_create_error(
                    err,
                    &format!(
                        "A target group with identifier [{}] orgIdentifier [{}] project [{}] environment [{}]",
                        config.identifier, config.org_id, config.project_id, config.environment
                    ),
                ))
            }
        };
        if status != 201 {
            return Err(Diagnostics::error(format!(
                "Target group {} creation returned unexpected status {}",
                config.identifier, status
            )));
        }

        d.set_id(config.identifier.clone());
        let location = TargetGroupLocation {
            org_id: config.org_id,
            project_id: config.project_id,
            environment: config.environment,
        };
        read_back(client, d, &location).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let location: TargetGroupLocation = d.decode()?;
        let id = d.id().to_string();

        match get_segment(client, &location, &id).await {
            Ok(Some(segment)) => flatten(d, segment, &location, &client.account_id),
            Ok(None) => {
                mark_gone(d, "Target group");
                Ok(())
            }
            Err(err) => handle_read_error(err, d),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let location: TargetGroupLocation = d.decode()?;
        let instructions = update_instructions(d)?;

        if instructions.is_empty() {
            tracing::debug!("Target group {} has nothing to patch", d.id());
        } else {
            let body = json!({ "instructions": to_body(&instructions)? });
            let url = segment_url(client, &location, d.id());
            client.patch(Api::FeatureFlags, &url, &body).await?;
        }

        read_back(client, d, &location).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let location: TargetGroupLocation = d.decode()?;
        let url = segment_url(client, &location, d.id());
        client.delete(Api::FeatureFlags, &url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(prior: Value, config: Value) -> ResourceData {
        let mut prior = prior.as_object().cloned().unwrap();
        prior.insert("id".into(), json!("beta"));
        ResourceData::for_update(config.as_object().cloned().unwrap(), prior)
    }

    #[test]
    fn test_no_changes_no_instructions() {
        let state = json!({"included": ["a"], "rule": [{"id": "r1", "attribute": "country", "op": "equal", "values": ["UK"], "negate": false}]});
        let config = json!({"included": ["a"], "rule": [{"attribute": "country", "op": "equal", "values": ["UK"], "negate": false}]});
        assert!(update_instructions(&update(state, config)).unwrap().is_empty());
    }

    #[test]
    fn test_removals_come_first() {
        let d = update(
            json!({"included": ["a", "b"], "excluded": ["x"]}),
            json!({"included": ["b", "c"], "excluded": []}),
        );
        let kinds: Vec<&str> = update_instructions(&d).unwrap().iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec!["removeFromIncludeList", "removeFromExcludeList", "addToIncludeList"]
        );

        let instructions = update_instructions(&d).unwrap();
        assert_eq!(instructions[0].parameters, json!({"targets": ["a"]}));
        assert_eq!(instructions[2].parameters, json!({"targets": ["c"]}));
    }

    #[test]
    fn test_rule_changes_use_clause_ids() {
        let d = update(
            json!({"rule": [
                {"id": "r1", "attribute": "country", "op": "equal", "values": ["UK"], "negate": false},
                {"attribute": "tier", "op": "equal", "values": ["gold"], "negate": false}
            ]}),
            json!({"rule": [
                {"attribute": "country", "op": "equal", "values": ["US"], "negate": true}
            ]}),
        );

        let instructions = update_instructions(&d).unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].kind, "removeClause");
        assert_eq!(instructions[0].parameters, json!({"clauseID": "r1"}));
        assert_eq!(instructions[1].kind, "addClause");
        assert_eq!(instructions[1].parameters["values"], json!(["US"]));
        assert_eq!(instructions[1].parameters["negate"], json!(true));
    }

    #[test]
    fn test_malformed_prior_list_is_an_error() {
        let d = update(json!({"included": "alice"}), json!({"included": ["alice", "bob"]}));
        let err = update_instructions(&d).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Invalid value for included"));
        assert!(text.contains("(attribute included)"));
    }

    #[test]
    fn test_create_body_skips_empty_lists() {
        let config: TargetGroupConfig = serde_json::from_value(json!({
            "identifier": "beta",
            "org_id": "default",
            "project_id": "shop",
            "environment": "qa",
            "account_id": "acc",
            "name": "Beta",
            "included": [],
            "rule": [{"attribute": "email", "op": "ends_with", "values": ["@example.com"]}]
        }))
        .unwrap();
        let body = serde_json::to_value(SegmentRequest::from(&config)).unwrap();
        assert!(body.get("included").is_none());
        assert_eq!(body["rules"][0]["negate"], json!(false));
        assert_eq!(body["project"], json!("shop"));
    }
}
