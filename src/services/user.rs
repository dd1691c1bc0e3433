//! `harness_user` resource (first-generation GraphQL API)
//!
//! Users are addressed by email: reads go through `userByEmail` so an import
//! only needs the address, the GraphQL id is learned on the first read.

use super::mark_gone;
use crate::harness::graphql::GraphQlQuery;
use crate::harness::{ApiError, HarnessClient};
use crate::resource::diag::handle_read_error;
use crate::resource::{Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const TYPE_NAME: &str = "harness_user";

const USER_FIELDS: &str = "id name email isEmailVerified isImportedFromIdentityProvider \
                           isPasswordExpired isTwoFactorAuthenticationEnabled isUserLocked";

#[derive(Debug, Deserialize)]
struct UserConfig {
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: String,
    name: String,
    email: String,
    #[serde(default)]
    is_email_verified: bool,
    #[serde(default)]
    is_imported_from_identity_provider: bool,
    #[serde(default)]
    is_password_expired: bool,
    #[serde(default)]
    is_two_factor_authentication_enabled: bool,
    #[serde(default)]
    is_user_locked: bool,
}

#[derive(Debug, Serialize)]
struct UserState {
    name: String,
    email: String,
    is_email_verified: bool,
    is_imported_from_identity_provider: bool,
    is_password_expired: bool,
    is_two_factor_auth_enabled: bool,
    is_user_locked: bool,
}

impl From<User> for UserState {
    fn from(u: User) -> Self {
        Self {
            name: u.name,
            email: u.email,
            is_email_verified: u.is_email_verified,
            is_imported_from_identity_provider: u.is_imported_from_identity_provider,
            is_password_expired: u.is_password_expired,
            is_two_factor_auth_enabled: u.is_two_factor_authentication_enabled,
            is_user_locked: u.is_user_locked,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserInput<'a> {
    client_mutation_id: String,
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserInput<'a> {
    client_mutation_id: String,
    id: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteUserInput<'a> {
    client_mutation_id: String,
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    user: Option<User>,
}

fn flatten(d: &mut ResourceData, user: User) -> Result<(), Diagnostics> {
    d.set_id(user.id.clone());
    d.apply(&UserState::from(user))
}

async fn get_user_by_email(client: &HarnessClient, email: &str) -> Result<Option<User>, ApiError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Response {
        user_by_email: Option<User>,
    }

    let query = GraphQlQuery::new(format!(
        "query($email: String!) {{ userByEmail(email: $email) {{ {} }} }}",
        USER_FIELDS
    ))
    .variable("email", email)?;
    let response: Response = client.execute_graphql(&query).await?;
    Ok(response.user_by_email)
}

pub struct UserResource;

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::Single("email")
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            create_user: UserPayload,
        }

        let config: UserConfig = d.decode()?;
        let query = GraphQlQuery::new(format!(
            "mutation($user: CreateUserInput!) {{ createUser(input: $user) {{ clientMutationId user {{ {} }} }} }}",
            USER_FIELDS
        ))
        .variable(
            "user",
            CreateUserInput {
                client_mutation_id: uuid::Uuid::new_v4().to_string(),
                name: &config.name,
                email: &config.email,
            },
        )?;

        let response: Response = client.execute_graphql(&query).await?;
        let Some(user) = response.create_user.user else {
            return Err(Diagnostics::error(format!("Harness returned no user for {}", config.email)));
        };
        tracing::info!("Created user {} ({})", config.email, user.id);
        d.set_id(user.id);

        self.read(client, d).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let Some(email) = d.get_str("email").map(str::to_string) else {
            return Err(Diagnostics::error("email must be set to read a user"));
        };

        match get_user_by_email(client, &email).await {
            Ok(Some(user)) => flatten(d, user),
            Ok(None) => {
                mark_gone(d, "User");
                Ok(())
            }
            Err(err) => handle_read_error(err, d),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            update_user: UserPayload,
        }

        let config: UserConfig = d.decode()?;
        let id = d.id().to_string();
        let query = GraphQlQuery::new(format!(
            "mutation($user: UpdateUserInput!) {{ updateUser(input: $user) {{ clientMutationId user {{ {} }} }} }}",
            USER_FIELDS
        ))
        .variable(
            "user",
            UpdateUserInput {
                client_mutation_id: uuid::Uuid::new_v4().to_string(),
                id: &id,
                name: &config.name,
            },
        )?;

        let response: Response = client.execute_graphql(&query).await?;
        match response.update_user.user {
            Some(user) => flatten(d, user),
            None => self.read(client, d).await,
        }
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        let id = d.id().to_string();
        let query = GraphQlQuery::new(
            "mutation($user: DeleteUserInput!) { deleteUser(input: $user) { clientMutationId } }",
        )
        .variable(
            "user",
            DeleteUserInput {
                client_mutation_id: uuid::Uuid::new_v4().to_string(),
                id: &id,
            },
        )?;
        let _: serde_json::Value = client.execute_graphql(&query).await?;
        Ok(())
    }
}
