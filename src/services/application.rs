//! `harness_application` resource and data source (first-generation GraphQL API)

use super::mark_gone;
use crate::harness::graphql::GraphQlQuery;
use crate::harness::{ApiError, HarnessClient};
use crate::resource::diag::handle_read_error;
use crate::resource::{DataSource, Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const TYPE_NAME: &str = "harness_application";

const APPLICATION_FIELDS: &str = "id name description isManualTriggerAuthorized";

#[derive(Debug, Deserialize)]
struct ApplicationConfig {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_manual_trigger_authorized: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Application {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_manual_trigger_authorized: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateApplicationInput<'a> {
    client_mutation_id: String,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    is_manual_trigger_authorized: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateApplicationInput<'a> {
    application_id: &'a str,
    client_mutation_id: String,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    is_manual_trigger_authorized: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteApplicationInput<'a> {
    application_id: &'a str,
    client_mutation_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationPayload {
    application: Option<Application>,
}

#[derive(Debug, Serialize)]
struct ApplicationState {
    name: String,
    description: String,
    is_manual_trigger_authorized: bool,
}

/// Every mutation carries a fresh client mutation id
fn mutation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn flatten(d: &mut ResourceData, app: Application) -> Result<(), Diagnostics> {
    d.set_id(app.id);
    d.apply(&ApplicationState {
        name: app.name,
        description: app.description.unwrap_or_default(),
        is_manual_trigger_authorized: app.is_manual_trigger_authorized.unwrap_or_default(),
    })
}

pub(crate) async fn get_application_by_id(client: &HarnessClient, id: &str) -> Result<Option<Application>, ApiError> {
    #[derive(Deserialize)]
    struct Response {
        application: Option<Application>,
    }

    let query = GraphQlQuery::new(format!(
        "query($applicationId: String!) {{ application(applicationId: $applicationId) {{ {} }} }}",
        APPLICATION_FIELDS
    ))
    .variable("applicationId", id)?;
    let response: Response = client.execute_graphql(&query).await?;
    Ok(response.application)
}

async fn get_application_by_name(client: &HarnessClient, name: &str) -> Result<Option<Application>, ApiError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Response {
        application_by_name: Option<Application>,
    }

    let query = GraphQlQuery::new(format!(
        "query($name: String!) {{ applicationByName(name: $name) {{ {} }} }}",
        APPLICATION_FIELDS
    ))
    .variable("name", name)?;
    let response: Response = client.execute_graphql(&query).await?;
    Ok(response.application_by_name)
}

/// One page of applications, used by the sweeper
pub(crate) async fn list_applications(client: &HarnessClient, limit: usize, offset: usize) -> Result<Vec<Application>, ApiError> {
    #[derive(Deserialize)]
    struct Nodes {
        #[serde(default)]
        nodes: Vec<Application>,
    }
    #[derive(Deserialize)]
    struct Response {
        applications: Option<Nodes>,
    }

    let query = GraphQlQuery::new(format!(
        "query($limit: Int!, $offset: Int) {{ applications(limit: $limit, offset: $offset) {{ nodes {{ {} }} }} }}",
        APPLICATION_FIELDS
    ))
    .variable("limit", limit)?
    .variable("offset", offset)?;
    let response: Response = client.execute_graphql(&query).await?;
    Ok(response.applications.map(|a| a.nodes).unwrap_or_default())
}

pub(crate) async fn delete_application(client: &HarnessClient, id: &str) -> Result<(), ApiError> {
    let query = GraphQlQuery::new(
        "mutation deleteApp($app: DeleteApplicationInput!) { deleteApplication(input: $app) { clientMutationId } }",
    )
    .variable(
        "app",
        DeleteApplicationInput {
            application_id: id,
            client_mutation_id: mutation_id(),
        },
    )?;
    let _: serde_json::Value = client.execute_graphql(&query).await?;
    Ok(())
}

pub struct ApplicationResource;

#[async_trait]
impl Resource for ApplicationResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::Single("id")
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            create_application: ApplicationPayload,
        }

        let config: ApplicationConfig = d.decode()?;
        let query = GraphQlQuery::new(format!(
            "mutation createapp($app: CreateApplicationInput!) {{ createApplication(input: $app) {{ clientMutationId application {{ {} }} }} }}",
            APPLICATION_FIELDS
        ))
        .variable(
            "app",
            CreateApplicationInput {
                client_mutation_id: mutation_id(),
                name: &config.name,
                description: config.description.as_deref(),
                is_manual_trigger_authorized: config.is_manual_trigger_authorized,
            },
        )?;

        let response: Response = client.execute_graphql(&query).await?;
        match response.create_application.application {
            Some(app) => flatten(d, app),
            None => Err(Diagnostics::error(format!(
                "Harness returned no application for {}",
                config.name
            ))),
        }
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let id = d.id().to_string();
        match get_application_by_id(client, &id).await {
            Ok(Some(app)) => flatten(d, app),
            Ok(None) => {
                mark_gone(d, "Application");
                Ok(())
            }
            Err(err) => handle_read_error(err, d),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            update_application: ApplicationPayload,
        }

        let config: ApplicationConfig = d.decode()?;
        let id = d.id().to_string();
        let query = GraphQlQuery::new(format!(
            "mutation updateapp($app: UpdateApplicationInput!) {{ updateApplication(input: $app) {{ clientMutationId application {{ {} }} }} }}",
            APPLICATION_FIELDS
        ))
        .variable(
            "app",
            UpdateApplicationInput {
                application_id: &id,
                client_mutation_id: mutation_id(),
                name: &config.name,
                description: config.description.as_deref(),
                is_manual_trigger_authorized: config.is_manual_trigger_authorized,
            },
        )?;

        let response: Response = client.execute_graphql(&query).await?;
        match response.update_application.application {
            Some(app) => flatten(d, app),
            None => Err(Diagnostics::error(format!("Harness returned no application for {}", id))),
        }
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        delete_application(client, d.id()).await?;
        Ok(())
    }
}

pub struct ApplicationDataSource;

#[async_trait]
impl DataSource for ApplicationDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let app = if let Some(id) = d.get_str("id").map(str::to_string) {
            get_application_by_id(client, &id).await?
        } else if let Some(name) = d.get_str("name").map(str::to_string) {
            get_application_by_name(client, &name).await?
        } else {
            return Err(Diagnostics::error("either id or name must be specified"));
        };

        match app {
            Some(app) => flatten(d, app),
            None => Ok(()),
        }
    }
}
