//! Lifecycle tests against a mocked Harness API using wiremock
//!
//! Each test drives the provider the way the CLI does (create, read, update,
//! import) and checks the resulting state documents and the requests sent.

use harness_provider::harness::auth::Credentials;
use harness_provider::harness::HarnessClient;
use harness_provider::provider::{Document, Provider};
use harness_provider::resource::plan::PlanAction;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCOUNT: &str = "acc123";

fn doc(v: Value) -> Document {
    v.as_object().expect("test documents are objects").clone()
}

fn provider(server: &MockServer) -> Provider {
    let credentials = Credentials::new(Some("classic-key".into()), Some("pat.key".into()));
    let client = HarnessClient::with_credentials(&server.uri(), ACCOUNT, credentials)
        .expect("client should build");
    Provider::new(client)
}

/// Next-gen `{status, data}` envelope
fn ng(data: Value) -> Value {
    json!({ "status": "SUCCESS", "data": data })
}

mod environment_tests {
    use super::*;

    const TYPE: &str = "harness_platform_environment";

    fn config() -> Document {
        doc(json!({
            "identifier": "test_env",
            "name": "Test env",
            "description": "created by tests",
            "org_id": "default",
            "project_id": "proj",
            "tags": ["team:cd"],
            "type": "PreProduction"
        }))
    }

    fn environment(name: &str) -> Value {
        json!({
            "environment": {
                "identifier": "test_env",
                "orgIdentifier": "default",
                "projectIdentifier": "proj",
                "name": name,
                "description": "created by tests",
                "tags": {"team": "cd"},
                "type": "PreProduction"
            }
        })
    }

    async fn mount_get(server: &MockServer, name: &str) {
        Mock::given(method("GET"))
            .and(path("/ng/api/environmentsV2/test_env"))
            .and(query_param("accountIdentifier", ACCOUNT))
            .and(query_param("orgIdentifier", "default"))
            .and(query_param("projectIdentifier", "proj"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(environment(name))))
            .mount(server)
            .await;
    }

    /// Create followed by Read reproduces every configured attribute
    #[tokio::test]
    async fn test_create_then_read_round_trip() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ng/api/environmentsV2"))
            .and(header("x-api-key", "pat.key"))
            .and(body_string_contains("\"type\":\"PreProduction\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(environment("Test env"))))
            .expect(1)
            .mount(&server)
            .await;
        mount_get(&server, "Test env").await;

        let provider = provider(&server);
        let created = provider.create(TYPE, config()).await.expect("create should succeed");

        assert_eq!(created["id"], json!("test_env"));
        for (key, value) in config() {
            assert_eq!(created.get(&key), Some(&value), "attribute {}", key);
        }

        let read = provider
            .read(TYPE, created.clone())
            .await
            .expect("read should succeed")
            .expect("environment should exist");
        assert_eq!(read, created);
    }

    /// A 404 on Read clears the id and the next plan creates the object again
    #[tokio::test]
    async fn test_read_404_clears_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ng/api/environmentsV2/test_env"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": "ERROR",
                "code": "RESOURCE_NOT_FOUND_EXCEPTION",
                "message": "Environment with identifier [test_env] not found"
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let mut state = config();
        state.insert("id".into(), json!("test_env"));

        let refreshed = provider.read(TYPE, state).await.expect("not found is not an error");
        assert!(refreshed.is_none());

        let plan = provider.plan(TYPE, refreshed.as_ref(), config()).expect("plan should succeed");
        assert_eq!(plan.action, PlanAction::Create);
        assert!(!plan.is_empty());
    }

    /// A soft-deleted environment answers 200 with an empty payload
    #[tokio::test]
    async fn test_read_empty_payload_clears_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ng/api/environmentsV2/test_env"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(Value::Null)))
            .mount(&server)
            .await;

        let mut state = config();
        state.insert("id".into(), json!("test_env"));
        let refreshed = provider(&server).read(TYPE, state).await.expect("read should succeed");
        assert!(refreshed.is_none());
    }

    /// Updating only the name keeps identifier, scope and type
    #[tokio::test]
    async fn test_update_name_only() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/ng/api/environmentsV2"))
            .and(body_string_contains("\"name\":\"Renamed\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(environment("Renamed"))))
            .expect(1)
            .mount(&server)
            .await;
        mount_get(&server, "Renamed").await;

        let provider = provider(&server);
        let mut state = config();
        state.insert("id".into(), json!("test_env"));
        let mut renamed = config();
        renamed.insert("name".into(), json!("Renamed"));

        let updated = provider
            .update(TYPE, state, renamed)
            .await
            .expect("update should succeed")
            .expect("environment should exist");
        let read = provider
            .read(TYPE, updated)
            .await
            .expect("read should succeed")
            .expect("environment should exist");

        assert_eq!(read["name"], json!("Renamed"));
        assert_eq!(read["identifier"], json!("test_env"));
        assert_eq!(read["org_id"], json!("default"));
        assert_eq!(read["project_id"], json!("proj"));
        assert_eq!(read["type"], json!("PreProduction"));
    }

    /// Import then Read reproduces the created state
    #[tokio::test]
    async fn test_import_project_level_id() {
        let server = MockServer::start().await;
        mount_get(&server, "Test env").await;

        let imported = provider(&server)
            .import(TYPE, "default/proj/test_env")
            .await
            .expect("import should succeed");

        assert_eq!(imported["id"], json!("test_env"));
        assert_eq!(imported["name"], json!("Test env"));
        assert_eq!(imported["tags"], json!(["team:cd"]));
        assert_eq!(imported["type"], json!("PreProduction"));
    }

    #[tokio::test]
    async fn test_import_rejects_segment_count() {
        let server = MockServer::start().await;
        let err = provider(&server)
            .import(TYPE, "a/b/c/d")
            .await
            .expect_err("four segments are not a multi level id");
        assert!(err.to_string().contains("segment"));
    }

    #[tokio::test]
    async fn test_data_source_by_name() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ng/api/environmentsV2"))
            .and(query_param("searchTerm", "Test env"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(json!({
                "content": [environment("Other"), environment("Test env")]
            }))))
            .mount(&server)
            .await;

        let found = provider(&server)
            .read_data_source(
                TYPE,
                doc(json!({"name": "Test env", "org_id": "default", "project_id": "proj"})),
            )
            .await
            .expect("lookup should succeed");
        assert_eq!(found["id"], json!("test_env"));
        assert_eq!(found["type"], json!("PreProduction"));
    }
}

mod feature_flag_tests {
    use super::*;

    fn flag_config() -> Document {
        doc(json!({
            "identifier": "new_checkout",
            "name": "New checkout",
            "org_id": "default",
            "project_id": "proj",
            "kind": "boolean",
            "permanent": false,
            "default_on_variation": "Enabled",
            "default_off_variation": "Disabled",
            "variation": [
                {"identifier": "Enabled", "name": "Enabled", "description": "on", "value": "true"},
                {"identifier": "Disabled", "name": "Disabled", "description": "off", "value": "false"}
            ]
        }))
    }

    #[tokio::test]
    async fn test_create_conflict_reports_existing_flag() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/cf/admin/features"))
            .and(query_param("accountIdentifier", ACCOUNT))
            .and(query_param("orgIdentifier", "default"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "409",
                "message": "A resource with the same identifier already exists"
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .create("harness_platform_feature_flag", flag_config())
            .await
            .expect_err("conflict should fail");
        assert!(err
            .to_string()
            .contains("A feature flag with identifier [new_checkout] orgIdentifier [default] project [proj] already exists"));
    }

    #[tokio::test]
    async fn test_create_requires_two_variations() {
        let server = MockServer::start().await;
        let mut config = flag_config();
        config.insert(
            "variation".into(),
            json!([{"identifier": "Enabled", "name": "Enabled", "value": "true"}]),
        );

        let err = provider(&server)
            .create("harness_platform_feature_flag", config)
            .await
            .expect_err("one variation is not enough");
        assert!(err.to_string().contains("variation"));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}

mod target_group_tests {
    use super::*;

    const TYPE: &str = "harness_platform_feature_flag_target_group";

    fn state() -> Document {
        doc(json!({
            "id": "beta",
            "identifier": "beta",
            "name": "Beta users",
            "org_id": "default",
            "project_id": "proj",
            "environment": "qa",
            "account_id": ACCOUNT,
            "included": ["alice", "bob"],
            "excluded": [],
            "rule": []
        }))
    }

    #[tokio::test]
    async fn test_update_patches_list_differences() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/cf/admin/segments/beta"))
            .and(query_param("environmentIdentifier", "qa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cf/admin/segments/beta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "beta",
                "name": "Beta users",
                "environment": "qa",
                "included": [{"identifier": "bob"}, {"identifier": "carol"}],
                "excluded": [],
                "rules": []
            })))
            .mount(&server)
            .await;

        let mut config = state();
        config.remove("id");
        config.insert("included".into(), json!(["bob", "carol"]));

        let updated = provider(&server)
            .update(TYPE, state(), config)
            .await
            .expect("update should succeed")
            .expect("group should exist");
        assert_eq!(updated["included"], json!(["bob", "carol"]));

        let requests = server.received_requests().await.unwrap_or_default();
        let patch = requests
            .iter()
            .find(|r| r.method.as_str() == "PATCH")
            .expect("a patch should be sent");
        let body: Value = serde_json::from_slice(&patch.body).expect("patch body is JSON");
        assert_eq!(
            body["instructions"],
            json!([
                {"kind": "removeFromIncludeList", "parameters": {"targets": ["alice"]}},
                {"kind": "addToIncludeList", "parameters": {"targets": ["carol"]}}
            ])
        );
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/cf/admin/segments"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({"message": "exists"})))
            .mount(&server)
            .await;

        let mut config = state();
        config.remove("id");
        let err = provider(&server)
            .create(TYPE, config)
            .await
            .expect_err("conflict should fail");
        assert!(err.to_string().contains("environment [qa] already exists"));
    }

    #[tokio::test]
    async fn test_create_reports_unexpected_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/cf/admin/segments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let mut config = state();
        config.remove("id");
        let err = provider(&server)
            .create(TYPE, config)
            .await
            .expect_err("a 200 is not a creation");
        assert!(err
            .to_string()
            .contains("Target group beta creation returned unexpected status 200"));
    }
}

mod token_tests {
    use super::*;

    const TYPE: &str = "harness_platform_token";

    fn token(identifier: &str) -> Value {
        json!({
            "token": {
                "identifier": identifier,
                "name": identifier,
                "apiKeyIdentifier": "ci_key",
                "apiKeyType": "USER",
                "parentIdentifier": "jane",
                "accountIdentifier": ACCOUNT,
                "valid": true
            }
        })
    }

    fn state() -> Document {
        doc(json!({
            "id": "ci_token",
            "identifier": "ci_token",
            "name": "ci_token",
            "apikey_id": "ci_key",
            "apikey_type": "USER",
            "parent_id": "jane",
            "account_id": ACCOUNT,
            "value": "pat.secret"
        }))
    }

    #[tokio::test]
    async fn test_read_single_match() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ng/api/token/aggregate"))
            .and(query_param("identifiers", "ci_token"))
            .and(query_param("apiKeyIdentifier", "ci_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(json!({
                "content": [token("ci_token")]
            }))))
            .mount(&server)
            .await;

        let read = provider(&server)
            .read(TYPE, state())
            .await
            .expect("read should succeed")
            .expect("token should exist");
        assert_eq!(read["valid"], json!(true));
        assert_eq!(read["value"], json!("pat.secret"));
    }

    #[tokio::test]
    async fn test_read_ambiguous_match_is_gone() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ng/api/token/aggregate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(json!({
                "content": [token("ci_token"), token("ci_token_2")]
            }))))
            .mount(&server)
            .await;

        let read = provider(&server).read(TYPE, state()).await.expect("read should succeed");
        assert!(read.is_none());
    }
}

mod graphql_tests {
    use super::*;
    use harness_provider::sweep::Sweeper;

    fn application(id: &str, name: &str) -> Value {
        json!({"id": id, "name": name, "description": "", "isManualTriggerAuthorized": false})
    }

    #[tokio::test]
    async fn test_application_create_and_read() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/graphql"))
            .and(query_param("accountId", ACCOUNT))
            .and(header("x-api-key", "classic-key"))
            .and(body_string_contains("createApplication"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"createApplication": {"clientMutationId": "m", "application": application("app1", "my-app")}}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/graphql"))
            .and(body_string_contains("applicationId"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"application": application("app1", "my-app")}
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let created = provider
            .create("harness_application", doc(json!({"name": "my-app"})))
            .await
            .expect("create should succeed");
        assert_eq!(created["id"], json!("app1"));

        let imported = provider
            .import("harness_application", "app1")
            .await
            .expect("import should succeed");
        assert_eq!(imported["name"], json!("my-app"));
        assert_eq!(imported["is_manual_trigger_authorized"], json!(false));
    }

    #[tokio::test]
    async fn test_application_missing_is_gone() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{"message": "Application does not exist"}]
            })))
            .mount(&server)
            .await;

        let state = doc(json!({"id": "app1", "name": "my-app"}));
        let read = provider(&server)
            .read("harness_application", state)
            .await
            .expect("not found is not an error");
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_user_import_by_email() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/graphql"))
            .and(body_string_contains("userByEmail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"userByEmail": {
                    "id": "u1",
                    "name": "Jane",
                    "email": "jane@example.com",
                    "isEmailVerified": true,
                    "isUserLocked": false
                }}
            })))
            .mount(&server)
            .await;

        let imported = provider(&server)
            .import("harness_user", "jane@example.com")
            .await
            .expect("import should succeed");
        assert_eq!(imported["id"], json!("u1"));
        assert_eq!(imported["email"], json!("jane@example.com"));
        assert_eq!(imported["is_email_verified"], json!(true));
    }

    #[tokio::test]
    async fn test_sweeper_deletes_prefixed_applications() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/graphql"))
            .and(body_string_contains("applications("))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"applications": {"nodes": [
                    application("a1", "Test_app"),
                    application("a2", "production")
                ]}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/graphql"))
            .and(body_string_contains("deleteApplication"))
            .and(body_string_contains("\"applicationId\":\"a1\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"deleteApplication": {"clientMutationId": "m"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        let deleted = Sweeper::new(provider.client())
            .sweep_applications()
            .await
            .expect("sweep should succeed");
        assert_eq!(deleted, 1);
    }
}

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_pipeline_calls_carry_account_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/orgs/default/projects/proj/pipelines/build"))
            .and(header("Harness-Account", ACCOUNT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "slug": "build",
                "name": "build",
                "org": "default",
                "project": "proj",
                "pipeline_yaml": "pipeline:\n  name: build\n"
            })))
            .mount(&server)
            .await;

        let imported = provider(&server)
            .import("harness_platform_pipeline", "default/proj/build")
            .await
            .expect("import should succeed");
        assert_eq!(imported["yaml"], json!("pipeline:\n  name: build\n"));
    }
}

mod token_update_tests {
    use super::*;

    const TYPE: &str = "harness_platform_token";

    fn token(name: &str, email: Option<&str>) -> Value {
        let mut token = json!({
            "identifier": "ci_token",
            "name": name,
            "apiKeyIdentifier": "ci_key",
            "apiKeyType": "USER",
            "parentIdentifier": "jane",
            "accountIdentifier": ACCOUNT,
            "valid": true
        });
        if let Some(email) = email {
            token["email"] = json!(email);
        }
        token
    }

    fn state() -> Document {
        doc(json!({
            "id": "ci_token",
            "identifier": "ci_token",
            "name": "ci_token",
            "apikey_id": "ci_key",
            "apikey_type": "USER",
            "parent_id": "jane",
            "account_id": ACCOUNT,
            "email": "jane@example.com",
            "valid": true,
            "value": "pat.acc.tok.secret"
        }))
    }

    /// The token value is only returned on creation and must outlive updates
    #[tokio::test]
    async fn test_update_keeps_token_value() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/ng/api/token/ci_token"))
            .and(body_string_contains("\"name\":\"renamed\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(token(
                "renamed",
                Some("jane@example.com"),
            ))))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = state();
        config.remove("id");
        config.remove("value");
        config.remove("valid");
        config.insert("name".into(), json!("renamed"));

        let updated = provider(&server)
            .update(TYPE, state(), config)
            .await
            .expect("update should succeed")
            .expect("token should exist");
        assert_eq!(updated["name"], json!("renamed"));
        assert_eq!(updated["value"], json!("pat.acc.tok.secret"));
    }

    /// A field Harness no longer returns is dropped from state on read
    #[tokio::test]
    async fn test_read_drops_field_removed_remotely() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ng/api/token/aggregate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(json!({
                "content": [{"token": token("ci_token", None)}]
            }))))
            .mount(&server)
            .await;

        let read = provider(&server)
            .read(TYPE, state())
            .await
            .expect("read should succeed")
            .expect("token should exist");
        assert!(read.get("email").is_none());
        assert_eq!(read["value"], json!("pat.acc.tok.secret"));
    }
}

mod service_tests {
    use super::*;

    const TYPE: &str = "harness_platform_service";

    fn config() -> Document {
        doc(json!({
            "identifier": "checkout",
            "name": "Checkout",
            "description": "checkout api",
            "org_id": "default",
            "project_id": "proj",
            "tags": ["team:cd"],
            "yaml": "service:\n  name: Checkout\n"
        }))
    }

    fn service() -> Value {
        json!({
            "service": {
                "identifier": "checkout",
                "orgIdentifier": "default",
                "projectIdentifier": "proj",
                "name": "Checkout",
                "description": "checkout api",
                "tags": {"team": "cd"},
                "yaml": "service:\n  name: Checkout\n"
            }
        })
    }

    async fn mount(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/ng/api/servicesV2"))
            .and(body_string_contains("\"identifier\":\"checkout\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(service())))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ng/api/servicesV2/checkout"))
            .and(query_param("orgIdentifier", "default"))
            .and(query_param("projectIdentifier", "proj"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(service())))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_then_read_round_trip() {
        let server = MockServer::start().await;
        mount(&server).await;

        let provider = provider(&server);
        let created = provider.create(TYPE, config()).await.expect("create should succeed");
        for (key, value) in config() {
            assert_eq!(created.get(&key), Some(&value), "attribute {}", key);
        }

        let read = provider
            .read(TYPE, created.clone())
            .await
            .expect("read should succeed")
            .expect("service should exist");
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_import() {
        let server = MockServer::start().await;
        mount(&server).await;

        let imported = provider(&server)
            .import(TYPE, "default/proj/checkout")
            .await
            .expect("import should succeed");
        for (key, value) in config() {
            assert_eq!(imported.get(&key), Some(&value), "attribute {}", key);
        }
    }
}

mod api_key_tests {
    use super::*;

    const TYPE: &str = "harness_platform_apikey";

    fn config() -> Document {
        doc(json!({
            "identifier": "ci_key",
            "name": "ci_key",
            "apikey_type": "USER",
            "parent_id": "jane",
            "account_id": ACCOUNT,
            "default_time_to_expire_token": 3600
        }))
    }

    fn api_key() -> Value {
        json!({
            "identifier": "ci_key",
            "name": "ci_key",
            "apiKeyType": "USER",
            "parentIdentifier": "jane",
            "accountIdentifier": ACCOUNT,
            "defaultTimeToExpireToken": 3600,
            "tags": {}
        })
    }

    async fn mount(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/ng/api/apikey"))
            .and(body_string_contains("\"apiKeyType\":\"USER\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(api_key())))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ng/api/apikey/aggregate/ci_key"))
            .and(query_param("apiKeyType", "USER"))
            .and(query_param("parentIdentifier", "jane"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(json!({"apiKey": api_key()}))))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_then_read_round_trip() {
        let server = MockServer::start().await;
        mount(&server).await;

        let provider = provider(&server);
        let created = provider.create(TYPE, config()).await.expect("create should succeed");
        assert_eq!(created["id"], json!("ci_key"));
        for (key, value) in config() {
            assert_eq!(created.get(&key), Some(&value), "attribute {}", key);
        }

        let read = provider
            .read(TYPE, created.clone())
            .await
            .expect("read should succeed")
            .expect("api key should exist");
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_import_parent_key_type() {
        let server = MockServer::start().await;
        mount(&server).await;

        let imported = provider(&server)
            .import(TYPE, "jane/ci_key/USER")
            .await
            .expect("import should succeed");
        for (key, value) in config() {
            assert_eq!(imported.get(&key), Some(&value), "attribute {}", key);
        }
    }
}

mod connector_tests {
    use super::*;

    const TYPE: &str = "harness_platform_connector_pagerduty";

    fn config() -> Document {
        doc(json!({
            "identifier": "pd",
            "name": "PagerDuty",
            "api_token_ref": "account.pd_token",
            "delegate_selectors": ["east", "west"]
        }))
    }

    fn connector(connector_type: &str) -> Value {
        json!({
            "connector": {
                "identifier": "pd",
                "name": "PagerDuty",
                "type": connector_type,
                "tags": {},
                "spec": {"apiTokenRef": "account.pd_token", "delegateSelectors": ["west", "east"]}
            }
        })
    }

    #[tokio::test]
    async fn test_create_then_import() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ng/api/connectors"))
            .and(body_string_contains("\"type\":\"PagerDuty\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(connector("PagerDuty"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ng/api/connectors/pd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(connector("PagerDuty"))))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let created = provider.create(TYPE, config()).await.expect("create should succeed");
        for (key, value) in config() {
            assert_eq!(created.get(&key), Some(&value), "attribute {}", key);
        }

        let imported = provider.import(TYPE, "pd").await.expect("import should succeed");
        assert_eq!(imported, created);
    }

    #[tokio::test]
    async fn test_import_other_connector_type_fails() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ng/api/connectors/pd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(connector("Slack"))))
            .mount(&server)
            .await;

        let err = provider(&server)
            .import(TYPE, "pd")
            .await
            .expect_err("a Slack connector is not a PagerDuty one");
        assert!(err.to_string().contains("expected PagerDuty"));
    }
}

mod secret_tests {
    use super::*;

    fn text_secret() -> Value {
        json!({
            "secret": {
                "type": "SecretText",
                "identifier": "db_password",
                "name": "db_password",
                "tags": {},
                "spec": {"secretManagerIdentifier": "harnessSecretManager", "valueType": "Inline"}
            }
        })
    }

    fn winrm_secret() -> Value {
        json!({
            "secret": {
                "type": "WinRmCredentials",
                "identifier": "winrm",
                "name": "winrm",
                "tags": {},
                "spec": {
                    "port": 5985,
                    "auth": {
                        "type": "NTLM",
                        "spec": {
                            "domain": "corp",
                            "username": "admin",
                            "password": "account.winrm_pw",
                            "useSSL": false,
                            "skipCertChecks": false,
                            "useNoProfile": false
                        }
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_text_create_read_and_import() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ng/api/v2/secrets"))
            .and(body_string_contains("\"value\":\"s3cr3t\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(text_secret())))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ng/api/v2/secrets/db_password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(text_secret())))
            .mount(&server)
            .await;

        let config = doc(json!({
            "identifier": "db_password",
            "name": "db_password",
            "secret_manager_identifier": "harnessSecretManager",
            "value_type": "Inline",
            "value": "s3cr3t"
        }));

        let provider = provider(&server);
        let created = provider
            .create("harness_platform_secret_text", config.clone())
            .await
            .expect("create should succeed");
        for (key, value) in config {
            assert_eq!(created.get(&key), Some(&value), "attribute {}", key);
        }

        let read = provider
            .read("harness_platform_secret_text", created.clone())
            .await
            .expect("read should succeed")
            .expect("secret should exist");
        assert_eq!(read, created);

        let imported = provider
            .import("harness_platform_secret_text", "db_password")
            .await
            .expect("import should succeed");
        assert_eq!(imported["value_type"], json!("Inline"));
        assert!(imported.get("value").is_none());
    }

    #[tokio::test]
    async fn test_winrm_create_and_import() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ng/api/v2/secrets"))
            .and(body_string_contains("\"type\":\"WinRmCredentials\""))
            .and(body_string_contains("\"type\":\"NTLM\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(winrm_secret())))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ng/api/v2/secrets/winrm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(winrm_secret())))
            .mount(&server)
            .await;

        let config = doc(json!({
            "identifier": "winrm",
            "name": "winrm",
            "ntlm": [{"domain": "corp", "username": "admin", "password_ref": "account.winrm_pw"}]
        }));

        let provider = provider(&server);
        let created = provider
            .create("harness_platform_secret_winrm", config)
            .await
            .expect("create should succeed");
        assert_eq!(created["port"], json!(5985));
        assert_eq!(created["ntlm"][0]["password_ref"], json!("account.winrm_pw"));
        assert!(created.get("kerberos").is_none());

        let imported = provider
            .import("harness_platform_secret_winrm", "winrm")
            .await
            .expect("import should succeed");
        assert_eq!(imported["ntlm"], created["ntlm"]);
    }

    #[tokio::test]
    async fn test_winrm_without_scheme_sends_nothing() {
        let server = MockServer::start().await;

        let err = provider(&server)
            .create(
                "harness_platform_secret_winrm",
                doc(json!({"identifier": "winrm", "name": "winrm"})),
            )
            .await
            .expect_err("an authentication scheme is required");
        assert!(err.to_string().contains("Exactly one of ntlm or kerberos"));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}

mod input_set_tests {
    use super::*;

    const TYPE: &str = "harness_platform_input_set";

    fn config() -> Document {
        doc(json!({
            "identifier": "nightly",
            "name": "nightly",
            "org_id": "default",
            "project_id": "proj",
            "pipeline_id": "build",
            "tags": ["team:ci"],
            "yaml": "inputSet:\n  identifier: nightly\n"
        }))
    }

    async fn mount(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/orgs/default/projects/proj/input-sets"))
            .and(query_param("pipeline", "build"))
            .and(body_string_contains("\"slug\":\"nightly\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/orgs/default/projects/proj/input-sets/nightly"))
            .and(query_param("pipeline", "build"))
            .and(header("Harness-Account", ACCOUNT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "slug": "nightly",
                "name": "nightly",
                "org": "default",
                "project": "proj",
                "tags": {"team": "ci"},
                "input_set_yaml": "inputSet:\n  identifier: nightly\n"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_then_read_round_trip() {
        let server = MockServer::start().await;
        mount(&server).await;

        let provider = provider(&server);
        let created = provider.create(TYPE, config()).await.expect("create should succeed");
        for (key, value) in config() {
            assert_eq!(created.get(&key), Some(&value), "attribute {}", key);
        }

        let read = provider
            .read(TYPE, created.clone())
            .await
            .expect("read should succeed")
            .expect("input set should exist");
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_import_pipeline_child_id() {
        let server = MockServer::start().await;
        mount(&server).await;

        let imported = provider(&server)
            .import(TYPE, "default/proj/build/nightly")
            .await
            .expect("import should succeed");
        for (key, value) in config() {
            assert_eq!(imported.get(&key), Some(&value), "attribute {}", key);
        }
    }
}

mod service_override_tests {
    use super::*;

    const TYPE: &str = "harness_platform_environment_service_overrides";
    const OVERRIDES_PATH: &str = "/ng/api/environmentsV2/serviceOverrides";

    fn overrides() -> Value {
        json!({
            "orgIdentifier": "default",
            "projectIdentifier": "proj",
            "environmentRef": "qa",
            "serviceRef": "checkout",
            "yaml": "serviceOverrides:\n  variables: []\n"
        })
    }

    #[tokio::test]
    async fn test_upsert_then_import() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(OVERRIDES_PATH))
            .and(body_string_contains("\"environmentIdentifier\":\"qa\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(overrides())))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(OVERRIDES_PATH))
            .and(query_param("environmentIdentifier", "qa"))
            .and(query_param("serviceIdentifier", "checkout"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(json!({"content": [overrides()]}))))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let created = provider
            .create(
                TYPE,
                doc(json!({
                    "org_id": "default",
                    "project_id": "proj",
                    "env_id": "qa",
                    "service_id": "checkout",
                    "yaml": "serviceOverrides:\n  variables: []\n"
                })),
            )
            .await
            .expect("create should succeed");
        assert_eq!(created["id"], json!("checkout-qa"));
        assert_eq!(created["identifier"], json!("checkout-qa"));

        let imported = provider
            .import(TYPE, "default/proj/qa/checkout")
            .await
            .expect("import should succeed");
        assert_eq!(imported, created);
    }

    #[tokio::test]
    async fn test_empty_page_is_gone() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OVERRIDES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(ng(json!({"content": []}))))
            .mount(&server)
            .await;

        let state = doc(json!({"id": "checkout-qa", "env_id": "qa", "service_id": "checkout"}));
        let read = provider(&server).read(TYPE, state).await.expect("read should succeed");
        assert!(read.is_none());
    }
}

mod gitx_webhook_tests {
    use super::*;

    const TYPE: &str = "harness_platform_gitx_webhook";

    fn webhook(identifier: &str) -> Value {
        json!({
            "webhook_identifier": identifier,
            "webhook_name": "hook",
            "repo_name": "infra",
            "connector_ref": "account.github",
            "folder_paths": [".harness"],
            "is_enabled": true
        })
    }

    #[tokio::test]
    async fn test_create_reads_back_and_imports() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/orgs/default/gitx-webhooks"))
            .and(header("Harness-Account", ACCOUNT))
            .and(body_string_contains("\"webhook_identifier\":\"hook\""))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"webhook_identifier": "hook"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/orgs/default/gitx-webhooks/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(webhook("hook")))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let created = provider
            .create(
                TYPE,
                doc(json!({
                    "identifier": "hook",
                    "name": "hook",
                    "org_id": "default",
                    "repo_name": "infra",
                    "connector_ref": "account.github",
                    "folder_paths": [".harness"]
                })),
            )
            .await
            .expect("create should succeed");
        assert_eq!(created["is_enabled"], json!(true));
        assert_eq!(created["org_id"], json!("default"));

        let imported = provider.import(TYPE, "default/hook").await.expect("import should succeed");
        assert_eq!(imported, created);
    }

    #[tokio::test]
    async fn test_blank_identifier_is_gone() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/gitx-webhooks/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(webhook("")))
            .mount(&server)
            .await;

        let state = doc(json!({"id": "hook", "identifier": "hook", "name": "hook"}));
        let read = provider(&server).read(TYPE, state).await.expect("read should succeed");
        assert!(read.is_none());
    }
}

mod gitops_tests {
    use super::*;

    #[tokio::test]
    async fn test_repo_cred_lookup() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gitops/api/v1/agents/agent1/repocreds/github"))
            .and(query_param("accountIdentifier", ACCOUNT))
            .and(query_param("orgIdentifier", "default"))
            .and(header("x-api-key", "pat.key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accountIdentifier": ACCOUNT,
                "agentIdentifier": "agent1",
                "identifier": "github",
                "repoCreds": {"url": "https://github.com/acme", "type": "git", "username": "bot"}
            })))
            .mount(&server)
            .await;

        let found = provider(&server)
            .read_data_source(
                "harness_platform_gitops_repo_cred",
                doc(json!({
                    "account_id": ACCOUNT,
                    "agent_id": "agent1",
                    "identifier": "github",
                    "org_id": "default"
                })),
            )
            .await
            .expect("lookup should succeed");
        assert_eq!(found["id"], json!("github"));
        assert_eq!(found["creds"][0]["url"], json!("https://github.com/acme"));
        assert_eq!(found["creds"][0]["username"], json!("bot"));
    }

    #[tokio::test]
    async fn test_app_project_lookup() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gitops/api/v1/agents/agent1/projects/default"))
            .and(query_param("accountIdentifier", ACCOUNT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"name": "default", "namespace": "argocd"},
                "spec": {"sourceRepos": ["*"]}
            })))
            .mount(&server)
            .await;

        let found = provider(&server)
            .read_data_source(
                "harness_platform_gitops_app_project",
                doc(json!({"agent_id": "agent1", "query_name": "default"})),
            )
            .await
            .expect("lookup should succeed");
        assert_eq!(found["id"], json!("default"));
        assert_eq!(found["account_id"], json!(ACCOUNT));
        assert_eq!(found["project"][0]["metadata"][0]["namespace"], json!("argocd"));
    }
}
