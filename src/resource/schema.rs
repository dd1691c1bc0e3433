//! Schema declaration types
//!
//! A resource schema is a declarative attribute map, loaded from the embedded
//! JSON files by the registry. The same types drive validation and planning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    String,
    Int,
    Bool,
    /// Ordered list of `elem` values
    List,
    /// Unordered set of `elem` values
    Set,
    /// String-keyed map of `elem` values
    Map,
    /// List of nested blocks described by `attributes`
    Block,
}

/// Diff-suppression rule for an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffSuppress {
    /// Semantically equal YAML documents are not a change
    Yaml,
    /// Strings differing only in case are not a change
    CaseInsensitive,
}

/// One attribute of a resource or nested block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSchema {
    #[serde(rename = "type")]
    pub attr_type: AttrType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub force_new: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    /// Element type of list/set/map attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem: Option<AttrType>,
    /// Nested attributes of block attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_suppress: Option<DiffSuppress>,
}

impl AttributeSchema {
    /// Only ever set by the provider, never by configuration
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.required && !self.optional
    }
}

/// Shared attribute set spliced into a schema by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Account, organization or project level resource
    MultiLevel,
    /// Project level resource, org_id and project_id required
    ProjectLevel,
    /// Account level resource
    AccountLevel,
    /// Data source resolvable at any level
    MultiLevelData,
    /// Project level data source
    ProjectLevelData,
}

/// Declared shape of one resource or data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeKind>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSchema>,
}

impl ResourceSchema {
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }
}
