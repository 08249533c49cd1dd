//! Integration tests using wiremock to simulate the identity and
//! introspection services.

use async_trait::async_trait;
use inspector_client::error::UnauthorizedReason;
use inspector_client::identity::{AuthRequest, IdentityBackend, IdentityInfo, Session};
use inspector_client::metadata::RequestMetadata;
use inspector_client::{Client, ClientConfig, Error, IntrospectionService, RuleSpec};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Hands out `token-1`, `token-2`, ... and counts how often it was asked.
struct CountingIdentity {
    management_url: String,
    calls: AtomicUsize,
    fail_after: Option<usize>,
}

impl CountingIdentity {
    fn new(management_url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            management_url: management_url.into(),
            calls: AtomicUsize::new(0),
            fail_after: None,
        })
    }

    fn failing_after(management_url: impl Into<String>, calls: usize) -> Arc<Self> {
        Arc::new(Self {
            management_url: management_url.into(),
            calls: AtomicUsize::new(0),
            fail_after: Some(calls),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityBackend for CountingIdentity {
    async fn authenticate(&self, request: &AuthRequest) -> inspector_client::Result<Session> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_after.is_some_and(|limit| call > limit) {
            return Err(Error::Authentication("identity service unavailable".into()));
        }
        Ok(Session {
            auth_token: format!("token-{}", call),
            expires_at: None,
            management_url: Url::parse(&self.management_url)?,
            region: request.config.region.clone(),
            endpoint_type: request.config.effective_endpoint_type(),
            service: None,
            identity: IdentityInfo {
                user_name: request.config.username.clone(),
                ..Default::default()
            },
        })
    }
}

async fn connect(identity: Arc<CountingIdentity>) -> Client {
    Client::builder()
        .auth_url("http://identity.invalid:5000")
        .credentials("admin", "secret")
        .identity_backend(identity)
        .connect()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_negotiates_version_and_sends_request() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("X-Auth-Token", "token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "versions": [
                {"id": "v1", "status": "CURRENT"},
                {"id": "v2", "status": "SUPPORTED"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/introspection/abc"))
        .and(header("X-Auth-Token", "token-1"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"finished": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(mock_server.uri());
    let mut client = connect(identity.clone()).await;
    assert_eq!(client.path_prefix(), "/v1");

    let response = client.get_introspection("abc").await.unwrap();
    assert_eq!(response.data, Some(json!({"finished": true})));
    assert_eq!(response.attempts, 1);
    assert_eq!(identity.calls(), 1);
}

#[tokio::test]
async fn test_versioned_management_url_skips_discovery() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"versions": []})))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rules": []})))
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1/", mock_server.uri()));
    let mut client = connect(identity).await;
    assert_eq!(client.path_prefix(), "/v1");

    let response = client.list_rules().await.unwrap();
    assert_eq!(response.data, Some(json!({"rules": []})));
}

#[tokio::test]
async fn test_unsupported_version_fails_construction() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(300).set_body_json(json!({
            "versions": {"values": [{"id": "v2", "status": "CURRENT"}]}
        })))
        .mount(&mock_server)
        .await;

    let result = Client::builder()
        .auth_url("http://identity.invalid:5000")
        .identity_backend(CountingIdentity::new(mock_server.uri()))
        .connect()
        .await;

    match result {
        Err(Error::UnsupportedVersion {
            pattern,
            advertised,
        }) => {
            assert_eq!(pattern, "v1");
            assert_eq!(advertised, vec!["v2".to_string()]);
        }
        other => panic!("Expected UnsupportedVersion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_expired_token_reauthenticates_once() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/introspection/abc"))
        .and(header("X-Auth-Token", "token-1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/introspection/abc"))
        .and(header("X-Auth-Token", "token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"finished": false})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity.clone()).await;
    let old_token = client.session().auth_token.clone();

    let response = client.get_introspection("abc").await.unwrap();

    assert_eq!(response.data, Some(json!({"finished": false})));
    assert_eq!(response.attempts, 2);
    assert!(response.was_retried());
    assert_eq!(identity.calls(), 2);
    assert_ne!(client.session().auth_token, old_token);
    assert_eq!(client.session().auth_token, "token-2");
}

#[tokio::test]
async fn test_second_unauthorized_propagates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity.clone()).await;

    let result = client.list_rules().await;

    match result {
        Err(Error::Unauthorized {
            reason,
            raw_response,
        }) => {
            assert_eq!(reason, UnauthorizedReason::TokenExpired);
            assert_eq!(raw_response, "token expired");
        }
        other => panic!("Expected Unauthorized, got {:?}", other),
    }
    assert_eq!(identity.calls(), 2);
}

#[tokio::test]
async fn test_bad_credentials_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad username or password"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity.clone()).await;

    let result = client.list_rules().await;

    assert!(matches!(
        result,
        Err(Error::Unauthorized {
            reason: UnauthorizedReason::BadCredentials,
            ..
        })
    ));
    assert_eq!(identity.calls(), 1);
}

#[tokio::test]
async fn test_reauthentication_failure_propagates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::failing_after(format!("{}/v1", mock_server.uri()), 1);
    let mut client = connect(identity.clone()).await;

    let result = client.list_rules().await;

    assert!(matches!(result, Err(Error::Authentication(_))));
    assert_eq!(identity.calls(), 2);
    assert_eq!(client.session().auth_token, "token-1");
}

#[tokio::test]
async fn test_not_found_for_any_method() {
    let mock_server = MockServer::start().await;

    Mock::given(path("/v1/rules/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Rule missing not found"))
        .mount(&mock_server)
        .await;
    Mock::given(path("/v1/introspection/missing/abort"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Node missing not found"))
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity).await;

    for result in [
        client.get_rules("missing").await,
        client.delete_rules("missing").await,
        client.abort_introspection("missing").await,
    ] {
        match result {
            Err(Error::NotFound {
                status,
                raw_response,
                ..
            }) => {
                assert_eq!(status.as_u16(), 404);
                assert!(raw_response.ends_with("not found"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_other_http_errors_are_preserved() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/introspection/busy"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_string("Node busy")
                .insert_header("x-openstack-request-id", "req-1"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity.clone()).await;

    match client.create_introspection("busy", None).await {
        Err(Error::HttpError {
            status,
            raw_response,
            headers,
        }) => {
            assert_eq!(status.as_u16(), 409);
            assert_eq!(raw_response, "Node busy");
            assert_eq!(headers["x-openstack-request-id"], "req-1");
        }
        other => panic!("Expected HttpError, got {:?}", other),
    }
    assert_eq!(identity.calls(), 1);
}

#[tokio::test]
async fn test_server_error_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Unavailable"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity).await;

    let err = client.list_rules().await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(err.raw_response(), Some("Unavailable"));
}

#[tokio::test]
async fn test_invalid_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity).await;

    match client.list_rules().await {
        Err(Error::DeserializationFailed {
            raw_response,
            serde_error,
            status,
        }) => {
            assert_eq!(status.as_u16(), 200);
            assert_eq!(raw_response, "invalid json");
            assert!(serde_error.contains("expected"));
        }
        other => panic!("Expected DeserializationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_body_passes_through() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity).await;

    let response = client.delete_rules_all().await.unwrap();
    assert_eq!(response.status.as_u16(), 204);
    assert!(response.data.is_none());
    assert!(response.raw_body.is_empty());
}

#[tokio::test]
async fn test_unexpected_success_status_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/introspection/n-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity).await;

    match client.create_introspection("n-1", None).await {
        Err(Error::HttpError { status, .. }) => assert_eq!(status.as_u16(), 200),
        other => panic!("Expected HttpError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_caller_headers_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/rules"))
        .and(header("X-Auth-Token", "token-1"))
        .and(header("X-OpenStack-Ironic-Inspector-API-Version", "1.6"))
        .and(body_partial_json(json!({"description": "small nodes"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"uuid": "r-1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .and(header("X-Auth-Token", "override"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rules": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity).await;

    let metadata = RequestMetadata::new(http::Method::POST, "rules")
        .with_header("X-OpenStack-Ironic-Inspector-API-Version", "1.6")
        .unwrap()
        .expecting([201]);
    let rule = RuleSpec::new(vec![], vec![]).with_description("small nodes");
    let response = client
        .request(metadata, Some(serde_json::to_value(&rule).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({"uuid": "r-1"})));

    let metadata = RequestMetadata::new(http::Method::GET, "rules")
        .with_header("X-Auth-Token", "override")
        .unwrap();
    client.request(metadata, None).await.unwrap();
}

#[tokio::test]
async fn test_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/introspection"))
        .and(wiremock::matchers::query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"introspection": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let identity = CountingIdentity::new(format!("{}/v1", mock_server.uri()));
    let mut client = connect(identity).await;

    let metadata =
        RequestMetadata::new(http::Method::GET, "introspection").with_query_param("limit", "10");
    let response = client.request(metadata, None).await.unwrap();

    #[derive(serde::Deserialize)]
    struct Listing {
        introspection: Vec<serde_json::Value>,
    }
    let listing = response.decode::<Listing>().unwrap();
    assert!(listing.data.introspection.is_empty());
}

fn keystone_token_body(management_url: &str) -> serde_json::Value {
    json!({
        "token": {
            "expires_at": "2030-01-01T00:00:00.000000Z",
            "user": {"id": "u-1", "name": "admin"},
            "project": {"id": "p-1", "name": "admin"},
            "catalog": [
                {
                    "type": "baremetal-introspection",
                    "name": "ironic-inspector",
                    "id": "svc-1",
                    "endpoints": [
                        {"interface": "admin", "region_id": "RegionOne", "url": "http://admin.invalid:5050"},
                        {"interface": "public", "region_id": "RegionOne", "url": management_url}
                    ]
                }
            ]
        }
    })
}

fn keystone_config(mock_server: &MockServer) -> ClientConfig {
    ClientConfig::from_json(&format!(
        r#"{{
            "auth_url": "{}",
            "username": "admin",
            "api_key": "secret",
            "project_name": "admin",
            "region": "RegionOne"
        }}"#,
        mock_server.uri()
    ))
    .unwrap()
}

#[tokio::test]
async fn test_keystone_password_authentication() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let management_url = format!("{}/v1", mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .and(body_partial_json(json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {"user": {"name": "admin", "password": "secret"}}
                },
                "scope": {"project": {"name": "admin"}}
            }
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("X-Subject-Token", "ks-token")
                .set_body_json(keystone_token_body(&management_url)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/introspection/abc/data"))
        .and(header("X-Auth-Token", "ks-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cpus": 8})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client = Client::connect(keystone_config(&mock_server)).await.unwrap();

    let session = client.session();
    assert_eq!(session.auth_token, "ks-token");
    assert_eq!(session.management_url.as_str(), management_url);
    assert_eq!(session.identity.project_id.as_deref(), Some("p-1"));
    assert_eq!(
        session.service.as_ref().and_then(|s| s.name.as_deref()),
        Some("ironic-inspector")
    );

    let response = client.get_introspection_details("abc").await.unwrap();
    assert_eq!(response.data, Some(json!({"cpus": 8})));
}

#[tokio::test]
async fn test_keystone_rejects_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(ResponseTemplate::new(401).set_body_string("The request you have made requires authentication."))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = Client::connect(keystone_config(&mock_server)).await;
    assert!(matches!(result, Err(Error::Authentication(_))));
}

#[tokio::test]
async fn test_keystone_reauthentication() {
    let mock_server = MockServer::start().await;
    let management_url = format!("{}/v1", mock_server.uri());
    let issued = Arc::new(AtomicUsize::new(0));
    let issued_clone = issued.clone();
    let token_body = keystone_token_body(&management_url);

    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = issued_clone.fetch_add(1, Ordering::SeqCst) + 1;
            ResponseTemplate::new(201)
                .insert_header("X-Subject-Token", format!("ks-{}", count).as_str())
                .set_body_json(&token_body)
        })
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .and(header("X-Auth-Token", "ks-1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .and(header("X-Auth-Token", "ks-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rules": []})))
        .mount(&mock_server)
        .await;

    let mut client = Client::connect(keystone_config(&mock_server)).await.unwrap();
    let response = client.list_rules().await.unwrap();

    assert_eq!(response.attempts, 2);
    assert_eq!(issued.load(Ordering::SeqCst), 2);
    assert_eq!(client.session().auth_token, "ks-2");
}

#[tokio::test]
async fn test_presupplied_token_skips_identity_service() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .and(header("X-Auth-Token", "preissued"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rules": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig {
        auth_url: Some(mock_server.uri()),
        auth_token: Some("preissued".into()),
        management_url: Some(format!("{}/v1", mock_server.uri())),
        ..Default::default()
    };
    let mut client = Client::connect(config).await.unwrap();
    client.list_rules().await.unwrap();
}

#[tokio::test]
async fn test_presupplied_token_cannot_be_refreshed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client = Client::builder()
        .auth_url(mock_server.uri())
        .auth_token("preissued")
        .management_url(format!("{}/v1", mock_server.uri()))
        .connect()
        .await
        .unwrap();

    assert!(matches!(
        client.list_rules().await,
        Err(Error::Authentication(_))
    ));
}

#[tokio::test]
async fn test_missing_auth_url() {
    let result = Client::connect(ClientConfig::default()).await;
    assert!(matches!(result, Err(Error::ConfigurationError(_))));
}
