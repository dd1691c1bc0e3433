//! Resource data binding
//!
//! [`ResourceData`] carries the id, the attribute map of one resource instance
//! and, during an update, the prior state. Resources never poke at individual
//! JSON values: they decode the whole map into a typed model once per
//! operation and apply a typed model back after the API call.

use super::diag::{Diagnostic, Diagnostics};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// State key holding the resource id
pub const ID_KEY: &str = "id";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    id: String,
    attributes: Map<String, Value>,
    prior: Option<Map<String, Value>>,
}

impl ResourceData {
    /// A resource that does not exist yet
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            id: String::new(),
            attributes,
            prior: None,
        }
    }

    /// Rebuild from a stored state document, the `id` key becomes the id
    pub fn from_state(mut state: Map<String, Value>) -> Self {
        let id = match state.remove(ID_KEY) {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        Self {
            id,
            attributes: state,
            prior: None,
        }
    }

    /// New configuration applied on top of an existing state
    pub fn for_update(config: Map<String, Value>, prior_state: Map<String, Value>) -> Self {
        let prior = Self::from_state(prior_state);
        Self {
            id: prior.id,
            attributes: config,
            prior: Some(prior.attributes),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the remote entity as gone
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// String attribute, `None` when unset or empty
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    /// Bind the attribute map into a typed model
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Diagnostics> {
        serde_json::from_value(Value::Object(self.attributes.clone())).map_err(|e| {
            Diagnostics::from(
                Diagnostic::error("Invalid resource configuration").with_detail(e.to_string()),
            )
        })
    }

    /// Flatten a typed model into the attribute map. A field serialized as
    /// `null` is removed from state; a field the model skips keeps its
    /// current value.
    pub fn apply<T: Serialize>(&mut self, model: &T) -> Result<(), Diagnostics> {
        let value = serde_json::to_value(model).map_err(|e| {
            Diagnostics::from(
                Diagnostic::error("Failed to flatten API response").with_detail(e.to_string()),
            )
        })?;

        let Value::Object(fields) = value else {
            return Err(Diagnostics::error(
                "Failed to flatten API response: expected an object",
            ));
        };

        for (key, value) in fields {
            if value.is_null() {
                self.attributes.remove(&key);
            } else {
                self.attributes.insert(key, value);
            }
        }
        Ok(())
    }

    /// Whether `key` differs between the prior state and the current attributes
    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        normalize(old) != normalize(new)
    }

    /// Prior and current value of `key`
    pub fn get_change(&self, key: &str) -> (Option<&Value>, Option<&Value>) {
        let old = self.prior.as_ref().and_then(|p| p.get(key));
        (old, self.attributes.get(key))
    }

    /// State document for this resource, `None` once the id is cleared
    pub fn to_state(&self) -> Option<Map<String, Value>> {
        if self.id.is_empty() {
            return None;
        }
        let mut state = self.attributes.clone();
        state.insert(ID_KEY.to_string(), Value::String(self.id.clone()));
        Some(state)
    }
}

/// Missing, `null`, empty strings and empty collections compare equal
fn normalize(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::Array(a)) if a.is_empty() => None,
        Some(Value::Object(o)) if o.is_empty() => None,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Model {
        identifier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        org_id: Option<String>,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    fn test_state_roundtrip_keeps_id() {
        let d = ResourceData::from_state(map(json!({"id": "e1", "identifier": "e1"})));
        assert_eq!(d.id(), "e1");
        assert!(d.get("id").is_none());
        let state = d.to_state().unwrap();
        assert_eq!(state["id"], json!("e1"));
    }

    #[test]
    fn test_cleared_id_has_no_state() {
        let mut d = ResourceData::from_state(map(json!({"id": "e1"})));
        d.clear_id();
        assert!(d.to_state().is_none());
    }

    #[test]
    fn test_decode_into_model() {
        let d = ResourceData::new(map(json!({"identifier": "e1", "tags": ["a:b"]})));
        let model: Model = d.decode().unwrap();
        assert_eq!(model.org_id, None);
        assert_eq!(model.tags, vec!["a:b".to_string()]);
    }

    #[test]
    fn test_decode_type_mismatch_is_diagnostic() {
        let d = ResourceData::new(map(json!({"identifier": 7})));
        let err = d.decode::<Model>().unwrap_err();
        assert!(err.has_errors());
    }

    #[test]
    fn test_apply_skips_absent_fields() {
        let mut d = ResourceData::new(map(json!({"identifier": "e1", "org_id": "o"})));
        d.apply(&Model {
            identifier: "e1".into(),
            org_id: None,
            tags: vec!["x:y".into()],
        })
        .unwrap();
        assert_eq!(d.get_str("org_id"), Some("o"));
        assert_eq!(d.get("tags"), Some(&json!(["x:y"])));
    }

    #[test]
    fn test_apply_removes_null_fields() {
        #[derive(Serialize)]
        struct Flat {
            identifier: &'static str,
            color: Option<&'static str>,
        }

        let mut d = ResourceData::new(map(json!({"identifier": "e1", "color": "#0063F7", "yaml": "x"})));
        d.apply(&Flat {
            identifier: "e1",
            color: None,
        })
        .unwrap();
        assert!(d.get("color").is_none());
        assert!(!d.attributes().contains_key("color"));
        assert_eq!(d.get_str("yaml"), Some("x"));
    }

    #[test]
    fn test_has_change() {
        let d = ResourceData::for_update(
            map(json!({"name": "new", "included": [], "description": ""})),
            map(json!({"id": "g", "name": "old", "included": null})),
        );
        assert_eq!(d.id(), "g");
        assert!(d.has_change("name"));
        assert!(!d.has_change("included"));
        assert!(!d.has_change("description"));
    }
}
