//! Plan computation
//!
//! Compares a stored state with a new configuration and decides whether the
//! resource must be created, replaced, updated or left alone.

use super::schema::{AttrType, AttributeSchema, DiffSuppress, ResourceSchema};
use super::yaml::yaml_equivalent;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const SENSITIVE_PLACEHOLDER: &str = "(sensitive value)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    Update,
    Replace,
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeChange {
    pub attribute: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub force_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub action: PlanAction,
    pub changes: Vec<AttributeChange>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.action == PlanAction::NoOp
    }
}

/// Compute the plan for `config` given the stored state, if any. A state
/// without an id (cleared by a read that found nothing) plans a create.
pub fn plan(schema: &ResourceSchema, state: Option<&Map<String, Value>>, config: &Map<String, Value>) -> Plan {
    let state = state.filter(|s| {
        s.get("id")
            .and_then(Value::as_str)
            .map(|id| !id.is_empty())
            .unwrap_or(false)
    });

    let Some(state) = state else {
        let changes = schema
            .attributes
            .iter()
            .filter_map(|(name, attr)| {
                let new = configured_value(attr, config.get(name))?;
                Some(change(name, attr, None, Some(new)))
            })
            .collect();
        return Plan {
            action: PlanAction::Create,
            changes,
        };
    };

    let mut changes = Vec::new();
    for (name, attr) in &schema.attributes {
        if attr.is_computed_only() {
            continue;
        }
        let new = configured_value(attr, config.get(name));
        let old = state.get(name).filter(|v| !v.is_null()).cloned();

        let differs = match (&old, &new) {
            // Unset optional+computed attributes follow the remote value
            (_, None) if attr.computed => false,
            (old, None) => !is_empty_value(old.as_ref()),
            (None, Some(new)) => !is_empty_value(Some(new)),
            (Some(old), Some(new)) => !values_equal(attr, old, new),
        };
        if differs {
            changes.push(change(name, attr, old, new));
        }
    }

    let action = if changes.is_empty() {
        PlanAction::NoOp
    } else if changes.iter().any(|c| c.force_new) {
        PlanAction::Replace
    } else {
        PlanAction::Update
    };

    Plan { action, changes }
}

fn configured_value(attr: &AttributeSchema, value: Option<&Value>) -> Option<Value> {
    match value {
        Some(v) if !v.is_null() => Some(v.clone()),
        _ => attr.default.clone(),
    }
}

fn change(name: &str, attr: &AttributeSchema, old: Option<Value>, new: Option<Value>) -> AttributeChange {
    let mask = |v: Option<Value>| {
        if attr.sensitive {
            v.map(|_| Value::String(SENSITIVE_PLACEHOLDER.to_string()))
        } else {
            v
        }
    };
    AttributeChange {
        attribute: name.to_string(),
        old: mask(old),
        new: mask(new),
        force_new: attr.force_new,
    }
}

fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        _ => false,
    }
}

fn values_equal(attr: &AttributeSchema, old: &Value, new: &Value) -> bool {
    if is_empty_value(Some(old)) && is_empty_value(Some(new)) {
        return true;
    }

    match attr.attr_type {
        AttrType::String => match (old.as_str(), new.as_str(), attr.diff_suppress) {
            (Some(a), Some(b), Some(DiffSuppress::Yaml)) => yaml_equivalent(a, b),
            (Some(a), Some(b), Some(DiffSuppress::CaseInsensitive)) => a.eq_ignore_ascii_case(b),
            _ => old == new,
        },
        AttrType::Set => sorted_strings(old) == sorted_strings(new),
        AttrType::Block => blocks_equal(&attr.attributes, old, new),
        _ => old == new,
    }
}

fn sorted_strings(value: &Value) -> Vec<String> {
    let mut items: Vec<String> = value
        .as_array()
        .map(|a| a.iter().map(|v| v.to_string()).collect())
        .unwrap_or_default();
    items.sort();
    items
}

/// Blocks compare element-wise on the attributes the configuration sets
fn blocks_equal(attributes: &BTreeMap<String, AttributeSchema>, old: &Value, new: &Value) -> bool {
    let (Some(old), Some(new)) = (old.as_array(), new.as_array()) else {
        return old == new;
    };
    if old.len() != new.len() {
        return false;
    }

    old.iter().zip(new).all(|(o, n)| {
        let (Some(o), Some(n)) = (o.as_object(), n.as_object()) else {
            return o == n;
        };
        attributes.iter().all(|(name, attr)| {
            if attr.is_computed_only() {
                return true;
            }
            let new_value = configured_value(attr, n.get(name));
            let old_value = o.get(name).filter(|v| !v.is_null());
            match (old_value, new_value) {
                (_, None) if attr.computed => true,
                (old_value, None) => is_empty_value(old_value),
                (None, Some(nv)) => is_empty_value(Some(&nv)),
                (Some(ov), Some(nv)) => values_equal(attr, ov, &nv),
            }
        })
    })
}
