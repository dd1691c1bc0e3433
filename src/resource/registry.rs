//! Schema Registry - Load resource schemas from JSON
//!
//! This module loads every resource and data source schema from embedded JSON
//! files and provides lookup functions for the rest of the provider. Shared
//! scope attribute sets are spliced in at load time.

use super::schema::{AttributeSchema, ResourceSchema, ScopeKind};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Embedded schema JSON files (compiled into the binary)
const SCHEMA_FILES: &[&str] = &[
    include_str!("../schemas/scopes.json"),
    include_str!("../schemas/platform.json"),
    include_str!("../schemas/feature_flags.json"),
    include_str!("../schemas/pipelines.json"),
    include_str!("../schemas/cd.json"),
    include_str!("../schemas/gitops.json"),
];

/// Root structure of schemas/*.json
#[derive(Debug, Clone, Deserialize, Default)]
struct SchemaFile {
    #[serde(default)]
    scopes: HashMap<ScopeKind, BTreeMap<String, AttributeSchema>>,
    #[serde(default)]
    resources: HashMap<String, ResourceSchema>,
    #[serde(default)]
    data_sources: HashMap<String, ResourceSchema>,
}

/// All declared schemas, scope attributes already merged
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    pub resources: HashMap<String, ResourceSchema>,
    pub data_sources: HashMap<String, ResourceSchema>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();

/// Get the schema registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static SchemaRegistry {
    REGISTRY.get_or_init(|| {
        let mut merged = SchemaFile::default();

        for content in SCHEMA_FILES {
            let partial: SchemaFile = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded schema JSON: {}", e));
            merged.scopes.extend(partial.scopes);
            merged.resources.extend(partial.resources);
            merged.data_sources.extend(partial.data_sources);
        }

        let scopes = merged.scopes;
        let splice = |mut schema: ResourceSchema| {
            if let Some(shared) = schema.scope.and_then(|kind| scopes.get(&kind)) {
                for (name, attr) in shared {
                    // Resource-specific declarations win over the shared set
                    schema
                        .attributes
                        .entry(name.clone())
                        .or_insert_with(|| attr.clone());
                }
            }
            schema
        };

        SchemaRegistry {
            resources: merged
                .resources
                .into_iter()
                .map(|(k, v)| (k, splice(v)))
                .collect(),
            data_sources: merged
                .data_sources
                .into_iter()
                .map(|(k, v)| (k, splice(v)))
                .collect(),
        }
    })
}

/// Get a resource schema by Terraform type name
pub fn resource_schema(name: &str) -> Option<&'static ResourceSchema> {
    get_registry().resources.get(name)
}

/// Get a data source schema by Terraform type name
pub fn data_source_schema(name: &str) -> Option<&'static ResourceSchema> {
    get_registry().data_sources.get(name)
}

/// All declared resource type names, sorted
pub fn resource_names() -> Vec<&'static str> {
    let mut names: Vec<&str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    names.sort_unstable();
    names
}

/// All declared data source type names, sorted
pub fn data_source_names() -> Vec<&'static str> {
    let mut names: Vec<&str> = get_registry()
        .data_sources
        .keys()
        .map(|s| s.as_str())
        .collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::schema::AttrType;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(!registry.resources.is_empty(), "Registry should have resources");
        assert!(!registry.data_sources.is_empty(), "Registry should have data sources");
    }

    #[test]
    fn test_environment_gets_multi_level_scope() {
        let schema = resource_schema("harness_platform_environment").unwrap();
        let org = schema.attribute("org_id").unwrap();
        assert!(org.optional && org.force_new);
        assert!(schema.attribute("identifier").unwrap().required);
        assert_eq!(schema.attribute("tags").unwrap().attr_type, AttrType::Set);
        assert_eq!(
            schema.attribute("type").unwrap().allowed_values,
            vec!["PreProduction".to_string(), "Production".to_string()]
        );
    }

    #[test]
    fn test_project_level_scope_requires_org_and_project() {
        let schema = resource_schema("harness_platform_pipeline").unwrap();
        assert!(schema.attribute("org_id").unwrap().required);
        assert!(schema.attribute("project_id").unwrap().required);
    }

    #[test]
    fn test_resource_overrides_shared_attribute() {
        // The token declares its own account_id, the shared set must not replace it
        let schema = resource_schema("harness_platform_token").unwrap();
        assert!(schema.attribute("account_id").unwrap().required);
        assert!(schema.attribute("value").unwrap().sensitive);
    }

    #[test]
    fn test_data_source_lookup_attributes_are_optional() {
        let schema = data_source_schema("harness_platform_environment").unwrap();
        assert!(schema.attribute("identifier").unwrap().optional);
        assert!(schema.attribute("name").unwrap().optional);
        assert!(schema.attribute("color").unwrap().is_computed_only());
    }

    #[test]
    fn test_names_are_sorted() {
        let names = resource_names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"harness_platform_feature_flag"));
    }
}
