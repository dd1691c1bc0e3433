//! Import id parsing
//!
//! An import id is either positional (`org/project/id`, segment meaning
//! depends on the segment count) or tagged (`org_id=o,project_id=p,identifier=x`,
//! pairs separated by `,` or `/`). Both resolve to the same attribute map.

use super::diag::Diagnostics;
use serde_json::{Map, Value};
use thiserror::Error;

/// Alias accepted in tagged ids for the identifier field
const ID_ALIAS: &str = "id";
const IDENTIFIER: &str = "identifier";

/// How a resource type lays out its composite import id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportLayout {
    /// One segment stored in the named attribute; `"id"` stores nothing but the id
    Single(&'static str),
    /// `id`, `org/id` or `org/project/id`
    MultiLevel,
    /// `org/project/id`
    ProjectLevel,
    /// `org/project/pipeline/id`
    PipelineChild,
    /// `org/project/environment/id`
    EnvironmentChild,
    /// `parent/id/type`, `org/parent/id/type` or `org/project/parent/id/type`
    ApiKey,
    /// `parent/apikey/type/id`, `org/parent/apikey/type/id` or `org/project/parent/apikey/type/id`
    Token,
    /// `env/service`, `org/env/service` or `org/project/env/service`; the
    /// read derives the final id from both references
    ServiceOverride,
}

/// Result of parsing an import id
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedId {
    pub id: String,
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("invalid import id \"{id}\": expected {expected}, got {got} segment(s)")]
    SegmentCount {
        id: String,
        expected: String,
        got: usize,
    },

    #[error("invalid import id \"{id}\": segment {position} is empty")]
    EmptySegment { id: String, position: usize },

    #[error("invalid import id \"{id}\": \"{pair}\" is not a key=value pair")]
    MalformedPair { id: String, pair: String },

    #[error("invalid import id \"{id}\": unknown key \"{key}\", expected one of {expected}")]
    UnknownKey {
        id: String,
        key: String,
        expected: String,
    },

    #[error("invalid import id \"{id}\": key \"{key}\" given more than once")]
    DuplicateKey { id: String, key: String },

    #[error("invalid import id \"{id}\": missing \"{key}\"")]
    MissingKey { id: String, key: String },
}

impl From<ImportError> for Diagnostics {
    fn from(err: ImportError) -> Self {
        Diagnostics::error(err.to_string())
    }
}

impl ImportLayout {
    /// Accepted positional layouts, shortest first
    fn arrangements(self) -> Vec<Vec<&'static str>> {
        match self {
            Self::Single(field) => vec![vec![field]],
            Self::MultiLevel => vec![
                vec![IDENTIFIER],
                vec!["org_id", IDENTIFIER],
                vec!["org_id", "project_id", IDENTIFIER],
            ],
            Self::ProjectLevel => vec![vec!["org_id", "project_id", IDENTIFIER]],
            Self::PipelineChild => vec![vec!["org_id", "project_id", "pipeline_id", IDENTIFIER]],
            Self::EnvironmentChild => {
                vec![vec!["org_id", "project_id", "environment", IDENTIFIER]]
            }
            Self::ApiKey => vec![
                vec!["parent_id", IDENTIFIER, "apikey_type"],
                vec!["org_id", "parent_id", IDENTIFIER, "apikey_type"],
                vec!["org_id", "project_id", "parent_id", IDENTIFIER, "apikey_type"],
            ],
            Self::Token => vec![
                vec!["parent_id", "apikey_id", "apikey_type", IDENTIFIER],
                vec!["org_id", "parent_id", "apikey_id", "apikey_type", IDENTIFIER],
                vec![
                    "org_id",
                    "project_id",
                    "parent_id",
                    "apikey_id",
                    "apikey_type",
                    IDENTIFIER,
                ],
            ],
            Self::ServiceOverride => vec![
                vec!["env_id", "service_id"],
                vec!["org_id", "env_id", "service_id"],
                vec!["org_id", "project_id", "env_id", "service_id"],
            ],
        }
    }

    /// Attribute holding the resource id
    fn id_field(self) -> &'static str {
        match self {
            Self::Single(field) => field,
            Self::ServiceOverride => "service_id",
            _ => IDENTIFIER,
        }
    }

    /// Keys a tagged id may carry
    pub fn known_keys(self) -> Vec<&'static str> {
        self.arrangements()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    /// Human readable list of accepted layouts
    fn describe(self) -> String {
        self.arrangements()
            .iter()
            .map(|a| format!("{} ({})", a.len(), a.join("/")))
            .collect::<Vec<_>>()
            .join(" or ")
    }

    /// Parse a positional or tagged import id
    pub fn parse(self, raw: &str) -> Result<ImportedId, ImportError> {
        if raw.contains('=') {
            return self.parse_tagged(raw);
        }

        let segments: Vec<&str> = raw.split('/').collect();
        let arrangement = self
            .arrangements()
            .into_iter()
            .find(|a| a.len() == segments.len())
            .ok_or_else(|| ImportError::SegmentCount {
                id: raw.to_string(),
                expected: self.describe(),
                got: segments.len(),
            })?;

        if let Some(position) = segments.iter().position(|s| s.trim().is_empty()) {
            return Err(ImportError::EmptySegment {
                id: raw.to_string(),
                position: position + 1,
            });
        }

        let pairs = arrangement
            .iter()
            .zip(segments)
            .map(|(k, v)| (*k, v.to_string()))
            .collect::<Vec<_>>();
        Ok(self.build(pairs))
    }

    fn parse_tagged(self, raw: &str) -> Result<ImportedId, ImportError> {
        let known = self.known_keys();
        let mut pairs: Vec<(&'static str, String)> = Vec::new();

        for pair in raw.split([',', '/']).filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| ImportError::MalformedPair {
                    id: raw.to_string(),
                    pair: pair.to_string(),
                })?;

            let key = if key == ID_ALIAS { self.id_field() } else { key };
            let Some(field) = known.iter().find(|k| **k == key) else {
                return Err(ImportError::UnknownKey {
                    id: raw.to_string(),
                    key: key.to_string(),
                    expected: known.join(", "),
                });
            };
            if pairs.iter().any(|(k, _)| k == field) {
                return Err(ImportError::DuplicateKey {
                    id: raw.to_string(),
                    key: key.to_string(),
                });
            }
            pairs.push((*field, value.to_string()));
        }

        // The shortest arrangement lists the keys every id needs
        let required = self.arrangements().into_iter().next().unwrap_or_default();
        if let Some(missing) = required
            .iter()
            .find(|k| !pairs.iter().any(|(p, _)| p == *k))
        {
            return Err(ImportError::MissingKey {
                id: raw.to_string(),
                key: missing.to_string(),
            });
        }

        Ok(self.build(pairs))
    }

    fn build(self, pairs: Vec<(&'static str, String)>) -> ImportedId {
        let id_field = self.id_field();
        let mut id = String::new();
        let mut attributes = Map::new();

        for (key, value) in pairs {
            if key == id_field {
                id = value.clone();
            }
            if key != ID_ALIAS {
                attributes.insert(key.to_string(), Value::String(value));
            }
        }

        ImportedId { id, attributes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_multi_level_layouts() {
        let account = ImportLayout::MultiLevel.parse("env1").unwrap();
        assert_eq!(account.id, "env1");
        assert!(account.attributes.get("org_id").is_none());

        let project = ImportLayout::MultiLevel.parse("org/proj/env1").unwrap();
        assert_eq!(project.attributes["org_id"], json!("org"));
        assert_eq!(project.attributes["project_id"], json!("proj"));
        assert_eq!(project.attributes["identifier"], json!("env1"));
    }

    #[test]
    fn test_segment_count_rejected() {
        let err = ImportLayout::ProjectLevel.parse("org/env1").unwrap_err();
        assert!(matches!(err, ImportError::SegmentCount { got: 2, .. }));
        assert!(err.to_string().contains("org_id/project_id/identifier"));

        assert!(ImportLayout::MultiLevel.parse("a/b/c/d").is_err());
    }

    #[test]
    fn test_empty_segment_rejected() {
        let err = ImportLayout::MultiLevel.parse("org//env1").unwrap_err();
        assert_eq!(
            err,
            ImportError::EmptySegment {
                id: "org//env1".into(),
                position: 2
            }
        );
    }

    #[test]
    fn test_api_key_layouts() {
        let key = ImportLayout::ApiKey.parse("org/user1/key1/USER").unwrap();
        assert_eq!(key.id, "key1");
        assert_eq!(key.attributes["parent_id"], json!("user1"));
        assert_eq!(key.attributes["apikey_type"], json!("USER"));
        assert!(ImportLayout::ApiKey.parse("user1/key1").is_err());
    }

    #[test]
    fn test_token_layouts() {
        let token = ImportLayout::Token
            .parse("org/proj/sa1/key1/SERVICE_ACCOUNT/tok1")
            .unwrap();
        assert_eq!(token.id, "tok1");
        assert_eq!(token.attributes["apikey_id"], json!("key1"));
        assert_eq!(token.attributes["project_id"], json!("proj"));
    }

    #[test]
    fn test_tagged_form() {
        let parsed = ImportLayout::PipelineChild
            .parse("org_id=o,project_id=p/pipeline_id=pipe,id=set1")
            .unwrap();
        assert_eq!(parsed.id, "set1");
        assert_eq!(parsed.attributes["identifier"], json!("set1"));
        assert_eq!(parsed.attributes["pipeline_id"], json!("pipe"));
    }

    #[test]
    fn test_tagged_form_errors() {
        let unknown = ImportLayout::MultiLevel.parse("identifier=x,color=red").unwrap_err();
        assert!(matches!(unknown, ImportError::UnknownKey { .. }));

        let missing = ImportLayout::MultiLevel.parse("org_id=o").unwrap_err();
        assert!(matches!(missing, ImportError::MissingKey { ref key, .. } if key == "identifier"));

        let dup = ImportLayout::MultiLevel.parse("id=a,identifier=b").unwrap_err();
        assert!(matches!(dup, ImportError::DuplicateKey { .. }));

        let malformed = ImportLayout::MultiLevel.parse("identifier=x,org").unwrap_err();
        assert!(matches!(malformed, ImportError::MalformedPair { .. }));
    }

    #[test]
    fn test_service_override_layouts() {
        let account = ImportLayout::ServiceOverride.parse("qa/checkout").unwrap();
        assert_eq!(account.id, "checkout");
        assert_eq!(account.attributes["env_id"], json!("qa"));
        assert!(account.attributes.get("org_id").is_none());

        let project = ImportLayout::ServiceOverride.parse("org/proj/qa/checkout").unwrap();
        assert_eq!(project.attributes["project_id"], json!("proj"));
        assert_eq!(project.attributes["service_id"], json!("checkout"));

        let tagged = ImportLayout::ServiceOverride.parse("env_id=qa,id=checkout").unwrap();
        assert_eq!(tagged, account);
        assert!(ImportLayout::ServiceOverride.parse("checkout").is_err());
    }

    #[test]
    fn test_single_layouts() {
        let user = ImportLayout::Single("email").parse("someone@example.com").unwrap();
        assert_eq!(user.id, "someone@example.com");
        assert_eq!(user.attributes["email"], json!("someone@example.com"));

        let app = ImportLayout::Single("id").parse("app123").unwrap();
        assert_eq!(app.id, "app123");
        assert!(app.attributes.is_empty());
    }
}
