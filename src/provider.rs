//! Provider
//!
//! Registry of every resource and data source, keyed by Terraform type name,
//! plus the lifecycle operations the CLI drives. Each operation validates the
//! incoming document against the declared schema, hands a [`ResourceData`] to
//! the resource implementation and returns the resulting state document.
//!
//! # Architecture
//!
//! - State and configuration documents are plain JSON objects
//! - The client is owned by the provider and lent to every call
//! - A `None` state means the remote object no longer exists

use crate::harness::HarnessClient;
use crate::resource::plan::{self, Plan, PlanAction};
use crate::resource::schema::ResourceSchema;
use crate::resource::validate::validate_config;
use crate::resource::{DataSource, Diagnostic, Diagnostics, Resource, ResourceData};
use crate::services;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type Document = Map<String, Value>;

pub struct Provider {
    client: HarnessClient,
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
}

impl Provider {
    /// Provider with every built-in resource and data source registered
    pub fn new(client: HarnessClient) -> Self {
        let mut provider = Self::empty(client);
        for resource in services::all_resources() {
            provider.register(resource);
        }
        for data_source in services::all_data_sources() {
            provider.register_data_source(data_source);
        }
        provider
    }

    /// Provider without any registered types
    pub fn empty(client: HarnessClient) -> Self {
        Self {
            client,
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, resource: Box<dyn Resource>) {
        self.resources.insert(resource.type_name(), resource);
    }

    pub fn register_data_source(&mut self, data_source: Box<dyn DataSource>) {
        self.data_sources.insert(data_source.type_name(), data_source);
    }

    pub fn client(&self) -> &HarnessClient {
        &self.client
    }

    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    pub fn data_source_types(&self) -> Vec<&'static str> {
        self.data_sources.keys().copied().collect()
    }

    fn resource(&self, type_name: &str) -> Result<&dyn Resource, Diagnostics> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| Diagnostics::error(format!("Unknown resource type \"{}\"", type_name)))
    }

    fn data_source(&self, type_name: &str) -> Result<&dyn DataSource, Diagnostics> {
        self.data_sources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| Diagnostics::error(format!("Unknown data source \"{}\"", type_name)))
    }

    fn resource_schema(resource: &dyn Resource) -> Result<&'static ResourceSchema, Diagnostics> {
        resource.schema().ok_or_else(|| {
            Diagnostics::error(format!("No schema declared for \"{}\"", resource.type_name()))
        })
    }

    /// Declared schema of a resource type, falling back to data sources
    pub fn schema(&self, type_name: &str) -> Result<&'static ResourceSchema, Diagnostics> {
        if let Ok(resource) = self.resource(type_name) {
            return Self::resource_schema(resource);
        }
        let data_source = self.data_source(type_name)?;
        data_source.schema().ok_or_else(|| {
            Diagnostics::error(format!("No schema declared for \"{}\"", type_name))
        })
    }

    pub async fn create(&self, type_name: &str, mut config: Document) -> Result<Document, Diagnostics> {
        let resource = self.resource(type_name)?;
        validate_config(Self::resource_schema(resource)?, &mut config)?;
        config.remove("id");

        tracing::info!("Creating {}", type_name);
        let mut d = ResourceData::new(config);
        resource.create(&self.client, &mut d).await?;

        d.to_state().ok_or_else(|| {
            Diagnostics::error(format!("{} was created but Harness returned no id", type_name))
        })
    }

    /// Refresh a state document; `None` when the object is gone
    pub async fn read(&self, type_name: &str, state: Document) -> Result<Option<Document>, Diagnostics> {
        let resource = self.resource(type_name)?;
        let mut d = ResourceData::from_state(state);
        if d.is_new() {
            return Err(Diagnostics::error("State has no id"));
        }

        tracing::info!("Reading {} {}", type_name, d.id());
        resource.read(&self.client, &mut d).await?;
        Ok(d.to_state())
    }

    /// Apply `config` on top of `state`. A change to a force-new attribute
    /// replaces the object.
    pub async fn update(&self, type_name: &str, state: Document, mut config: Document) -> Result<Option<Document>, Diagnostics> {
        let resource = self.resource(type_name)?;
        let schema = Self::resource_schema(resource)?;
        validate_config(schema, &mut config)?;
        config.remove("id");

        let planned = plan::plan(schema, Some(&state), &config);
        match planned.action {
            PlanAction::NoOp => {
                tracing::info!("{} is up to date", type_name);
                return Ok(Some(state));
            }
            PlanAction::Create => return self.create(type_name, config).await.map(Some),
            PlanAction::Replace => {
                tracing::info!("Replacing {}", type_name);
                self.delete(type_name, state).await?;
                return self.create(type_name, config).await.map(Some);
            }
            PlanAction::Update => {}
        }

        fill_from_prior(schema, &mut config, &state);
        let mut d = ResourceData::for_update(config, state);
        tracing::info!("Updating {} {}", type_name, d.id());
        resource.update(&self.client, &mut d).await?;
        Ok(d.to_state())
    }

    pub async fn delete(&self, type_name: &str, state: Document) -> Result<(), Diagnostics> {
        let resource = self.resource(type_name)?;
        let mut d = ResourceData::from_state(state);
        if d.is_new() {
            return Ok(());
        }

        tracing::info!("Deleting {} {}", type_name, d.id());
        resource.delete(&self.client, &mut d).await
    }

    /// Import an existing object by its composite id
    pub async fn import(&self, type_name: &str, import_id: &str) -> Result<Document, Diagnostics> {
        let resource = self.resource(type_name)?;
        let imported = resource.import_layout().parse(import_id)?;

        tracing::info!("Importing {} {}", type_name, import_id);
        let mut d = ResourceData::new(imported.attributes);
        d.set_id(imported.id);
        resource.read(&self.client, &mut d).await?;

        d.to_state().ok_or_else(|| {
            Diagnostics::from(
                Diagnostic::error("Cannot import non-existent remote object").with_detail(format!(
                    "No {} matches import id \"{}\"",
                    type_name, import_id
                )),
            )
        })
    }

    pub async fn read_data_source(&self, type_name: &str, mut config: Document) -> Result<Document, Diagnostics> {
        let data_source = self.data_source(type_name)?;
        if let Some(schema) = data_source.schema() {
            validate_config(schema, &mut config)?;
        }

        tracing::info!("Reading data source {}", type_name);
        let mut d = ResourceData::new(config);
        data_source.read(&self.client, &mut d).await?;
        Ok(d.to_state().unwrap_or_else(|| d.attributes().clone()))
    }

    /// Plan `config` against an optional prior state
    pub fn plan(&self, type_name: &str, state: Option<&Document>, mut config: Document) -> Result<Plan, Diagnostics> {
        let resource = self.resource(type_name)?;
        let schema = Self::resource_schema(resource)?;
        validate_config(schema, &mut config)?;
        Ok(plan::plan(schema, state, &config))
    }
}

/// Computed attributes absent from the configuration keep the value last
/// read from Harness. Values returned only once (a token's secret) survive
/// updates this way.
fn fill_from_prior(schema: &ResourceSchema, config: &mut Document, prior: &Document) {
    for (name, attr) in &schema.attributes {
        if !attr.computed {
            continue;
        }
        if config.get(name).map(|v| !v.is_null()).unwrap_or(false) {
            continue;
        }
        if let Some(previous) = prior.get(name).filter(|v| !v.is_null()) {
            config.insert(name.clone(), previous.clone());
        }
    }
}
