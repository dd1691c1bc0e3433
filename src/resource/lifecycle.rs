//! Resource and data source traits
//!
//! Every Harness entity implements [`Resource`]: Expand the typed model out
//! of [`ResourceData`], call the API once, Flatten the response back.

use super::data::ResourceData;
use super::diag::Diagnostics;
use super::import::ImportLayout;
use super::registry;
use super::schema::ResourceSchema;
use crate::harness::HarnessClient;
use async_trait::async_trait;

#[async_trait]
pub trait Resource: Send + Sync {
    /// Terraform type name, e.g. `harness_platform_environment`
    fn type_name(&self) -> &'static str;

    /// Layout of the composite id accepted by `import`
    fn import_layout(&self) -> ImportLayout;

    fn schema(&self) -> Option<&'static ResourceSchema> {
        registry::resource_schema(self.type_name())
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics>;

    /// Refresh `d` from the API. Clears the id when the entity is gone.
    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics>;

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics>;

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics>;
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Option<&'static ResourceSchema> {
        registry::data_source_schema(self.type_name())
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics>;
}
