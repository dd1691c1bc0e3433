//! Resource abstraction layer
//!
//! This module provides the data-driven half of the provider. Schemas are
//! loaded from JSON files at compile time; everything else here works on any
//! schema without knowing which Harness entity it describes.
//!
//! # Architecture
//!
//! - [`schema`] - Attribute and resource schema types
//! - [`registry`] - Loads and caches schemas from embedded JSON
//! - [`validate`] - Checks a configuration against its schema
//! - [`data`] - Binds attribute maps to typed models
//! - [`plan`] - Compares state with configuration
//! - [`import`] - Parses composite import ids
//! - [`lifecycle`] - The `Resource` / `DataSource` traits
//!
//! # Schema Definitions
//!
//! Schemas are defined in JSON files under `src/schemas/`:
//! - `scopes.json` - Shared account/org/project attribute sets
//! - `platform.json` - Environments, services, API keys, tokens, connectors, secrets
//! - `feature_flags.json` - Feature flags and target groups
//! - `pipelines.json` - Pipelines and input sets
//! - `cd.json` - First-generation applications and users
//!
//! # Example
//!
//! ```ignore
//! use crate::resource::{plan, resource_schema};
//!
//! fn needs_apply(state: &Map<String, Value>, config: &Map<String, Value>) -> bool {
//!     let schema = resource_schema("harness_platform_environment").unwrap();
//!     !plan::plan(schema, Some(state), config).is_empty()
//! }
//! ```

pub mod data;
pub mod diag;
pub mod import;
pub mod lifecycle;
pub mod plan;
pub mod registry;
pub mod schema;
pub mod tags;
pub mod validate;
pub mod yaml;

pub use data::ResourceData;
pub use diag::{Diagnostic, Diagnostics};
pub use import::{ImportError, ImportLayout};
pub use lifecycle::{DataSource, Resource};
pub use registry::{data_source_schema, resource_schema};
