//! `harness_platform_secret_text` resource

use super::{decode_secret, delete_secret, flatten_common, read_secret, save_secret, SecretConfig};
use crate::harness::HarnessClient;
use crate::resource::{Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TYPE_NAME: &str = "harness_platform_secret_text";
const SECRET_TYPE: &str = "SecretText";

#[derive(Debug, Deserialize)]
struct SecretTextConfig {
    #[serde(flatten)]
    common: SecretConfig,
    secret_manager_identifier: String,
    value_type: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretTextSpec {
    #[serde(default)]
    secret_manager_identifier: Option<String>,
    #[serde(default)]
    value_type: Option<String>,
    /// Write only, never returned by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct SecretTextState {
    secret_manager_identifier: Option<String>,
    value_type: Option<String>,
}

/// `value` is left alone, the configured one stays in state
fn flatten(d: &mut ResourceData, secret: Value) -> Result<(), Diagnostics> {
    let spec: SecretTextSpec = flatten_common(d, decode_secret(secret, SECRET_TYPE)?)?;
    d.apply(&SecretTextState {
        secret_manager_identifier: spec.secret_manager_identifier,
        value_type: spec.value_type,
    })
}

async fn create_or_update(client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
    let config: SecretTextConfig = d.decode()?;
    let secret = config.common.into_secret(
        SECRET_TYPE,
        SecretTextSpec {
            secret_manager_identifier: Some(config.secret_manager_identifier),
            value_type: Some(config.value_type),
            value: config.value,
        },
    );
    let saved = save_secret(client, d, &secret).await?;
    flatten(d, saved)
}

pub struct SecretTextResource;

#[async_trait]
impl Resource for SecretTextResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::MultiLevel
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        create_or_update(client, d).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        match read_secret(client, d).await? {
            Some(secret) => flatten(d, secret),
            None => Ok(()),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        create_or_update(client, d).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        delete_secret(client, d).await
    }
}
