//! Configuration validation against a declared schema
//!
//! Defaults are filled in first, then every attribute is checked. All
//! problems are collected so the user sees them in one pass.

use super::diag::{Diagnostic, Diagnostics};
use super::schema::{AttrType, AttributeSchema, ResourceSchema};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Validate `config` in place, applying declared defaults
pub fn validate_config(schema: &ResourceSchema, config: &mut Map<String, Value>) -> Result<(), Diagnostics> {
    let mut diags = Diagnostics::new();
    validate_object(&schema.attributes, config, "", &mut diags);
    diags.into_result()
}

fn path_of(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn validate_object(
    attributes: &BTreeMap<String, AttributeSchema>,
    object: &mut Map<String, Value>,
    prefix: &str,
    diags: &mut Diagnostics,
) {
    for key in object.keys() {
        // The id is carried alongside the attributes in state documents
        if prefix.is_empty() && key == "id" && !attributes.contains_key("id") {
            continue;
        }
        if !attributes.contains_key(key) {
            diags.push(
                Diagnostic::error(format!("Unsupported argument \"{}\"", key))
                    .with_attribute(path_of(prefix, key)),
            );
        }
    }

    for (name, attr) in attributes {
        let path = path_of(prefix, name);

        let is_unset = object.get(name).map(Value::is_null).unwrap_or(true);
        if is_unset {
            if let Some(ref default) = attr.default {
                object.insert(name.clone(), default.clone());
                continue;
            }
            if attr.required {
                diags.push(
                    Diagnostic::error(format!("Missing required argument \"{}\"", name))
                        .with_attribute(path),
                );
            }
            continue;
        }

        if attr.is_computed_only() {
            diags.push(
                Diagnostic::error(format!("Value for unconfigurable attribute \"{}\"", name))
                    .with_detail("This attribute is computed by the provider and cannot be set.")
                    .with_attribute(path),
            );
            continue;
        }

        if let Some(value) = object.get_mut(name) {
            validate_value(attr, value, &path, diags);
        }
    }
}

fn validate_value(attr: &AttributeSchema, value: &mut Value, path: &str, diags: &mut Diagnostics) {
    match attr.attr_type {
        AttrType::String | AttrType::Int | AttrType::Bool => {
            validate_scalar(attr.attr_type, &attr.allowed_values, value, path, diags);
        }
        AttrType::List | AttrType::Set => {
            let Some(items) = value.as_array_mut() else {
                diags.push(type_error(path, "a list"));
                return;
            };
            check_item_count(attr, items.len(), path, diags);
            let elem = attr.elem.unwrap_or(AttrType::String);
            for (i, item) in items.iter_mut().enumerate() {
                validate_scalar(elem, &[], item, &format!("{}.{}", path, i), diags);
            }
        }
        AttrType::Map => {
            let Some(entries) = value.as_object_mut() else {
                diags.push(type_error(path, "a map"));
                return;
            };
            let elem = attr.elem.unwrap_or(AttrType::String);
            for (key, item) in entries.iter_mut() {
                validate_scalar(elem, &[], item, &format!("{}.{}", path, key), diags);
            }
        }
        AttrType::Block => {
            let Some(blocks) = value.as_array_mut() else {
                diags.push(type_error(path, "a list of blocks"));
                return;
            };
            check_item_count(attr, blocks.len(), path, diags);
            for (i, block) in blocks.iter_mut().enumerate() {
                let block_path = format!("{}.{}", path, i);
                match block.as_object_mut() {
                    Some(object) => validate_object(&attr.attributes, object, &block_path, diags),
                    None => diags.push(type_error(&block_path, "a block")),
                }
            }
        }
    }
}

fn validate_scalar(
    attr_type: AttrType,
    allowed_values: &[String],
    value: &Value,
    path: &str,
    diags: &mut Diagnostics,
) {
    let ok = match attr_type {
        AttrType::String => value.is_string(),
        AttrType::Int => value.as_i64().is_some(),
        AttrType::Bool => value.is_boolean(),
        _ => false,
    };
    if !ok {
        let expected = match attr_type {
            AttrType::String => "a string",
            AttrType::Int => "a whole number",
            AttrType::Bool => "a bool",
            _ => "a primitive value",
        };
        diags.push(type_error(path, expected));
        return;
    }

    if let (false, Some(s)) = (allowed_values.is_empty(), value.as_str()) {
        if !allowed_values.iter().any(|a| a == s) {
            diags.push(
                Diagnostic::error(format!(
                    "expected {} to be one of [{}], got {}",
                    path,
                    allowed_values.join(", "),
                    s
                ))
                .with_attribute(path),
            );
        }
    }
}

fn check_item_count(attr: &AttributeSchema, len: usize, path: &str, diags: &mut Diagnostics) {
    if let Some(min) = attr.min_items {
        if len < min {
            diags.push(
                Diagnostic::error(format!(
                    "Insufficient {} items: at least {} required, got {}",
                    path, min, len
                ))
                .with_attribute(path),
            );
        }
    }
    if let Some(max) = attr.max_items {
        if len > max {
            diags.push(
                Diagnostic::error(format!(
                    "Too many {} items: no more than {} allowed, got {}",
                    path, max, len
                ))
                .with_attribute(path),
            );
        }
    }
}

fn type_error(path: &str, expected: &str) -> Diagnostic {
    Diagnostic::error(format!("Incorrect attribute value type for \"{}\"", path))
        .with_detail(format!("Expected {}.", expected))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::registry::resource_schema;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    fn attrs(diags: &Diagnostics) -> Vec<String> {
        diags.iter().filter_map(|d| d.attribute.clone()).collect()
    }

    #[test]
    fn test_valid_environment_gets_defaults() {
        let schema = resource_schema("harness_platform_environment").unwrap();
        let mut config = map(json!({
            "identifier": "test_env",
            "name": "test_env",
            "type": "PreProduction",
            "tags": ["a:b"]
        }));
        validate_config(schema, &mut config).unwrap();
        assert_eq!(config["force_delete"], json!(false));
    }

    #[test]
    fn test_missing_required_and_bad_enum() {
        let schema = resource_schema("harness_platform_environment").unwrap();
        let mut config = map(json!({"identifier": "e", "type": "Staging"}));
        let diags = validate_config(schema, &mut config).unwrap_err();
        let attributes = attrs(&diags);
        assert!(attributes.contains(&"name".to_string()));
        assert!(attributes.contains(&"type".to_string()));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let schema = resource_schema("harness_platform_service").unwrap();
        let mut config = map(json!({"identifier": "s", "name": "s", "colour": "red"}));
        let diags = validate_config(schema, &mut config).unwrap_err();
        assert_eq!(attrs(&diags), vec!["colour".to_string()]);
    }

    #[test]
    fn test_computed_only_cannot_be_set() {
        let schema = resource_schema("harness_user").unwrap();
        let mut config = map(json!({"name": "n", "email": "a@b.c", "is_user_locked": true}));
        assert!(validate_config(schema, &mut config).is_err());
    }

    #[test]
    fn test_nested_block_validation() {
        let schema = resource_schema("harness_platform_feature_flag").unwrap();
        let mut config = map(json!({
            "identifier": "f",
            "name": "f",
            "org_id": "o",
            "project_id": "p",
            "kind": "boolean",
            "permanent": false,
            "default_on_variation": "Enabled",
            "default_off_variation": "Disabled",
            "variation": [
                {"identifier": "Enabled", "name": "Enabled", "description": "on", "value": "true"}
            ],
            "environment": [{"state": "maybe"}]
        }));
        let diags = validate_config(schema, &mut config).unwrap_err();
        let attributes = attrs(&diags);
        assert!(attributes.contains(&"variation".to_string()), "min items: {attributes:?}");
        assert!(attributes.contains(&"environment.0.identifier".to_string()));
        assert!(attributes.contains(&"environment.0.state".to_string()));
    }

    #[test]
    fn test_int_type_mismatch() {
        let schema = resource_schema("harness_platform_apikey").unwrap();
        let mut config = map(json!({
            "identifier": "k",
            "name": "k",
            "apikey_type": "USER",
            "parent_id": "u",
            "account_id": "acc",
            "default_time_to_expire_token": "soon"
        }));
        let diags = validate_config(schema, &mut config).unwrap_err();
        assert_eq!(attrs(&diags), vec!["default_time_to_expire_token".to_string()]);
    }
}
