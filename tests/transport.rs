//! Transport behavior against a mock registry: digest cache, bearer replay
//! after 401, and content digest resolution.

mod common;

use common::{CONFIG_DIGEST, MANIFEST_DIGEST, RecordingResolver, client_for, config_json, manifest_json, transport_with};
use registry_viewer::digest::DigestUtils;
use registry_viewer::registry::auth::TokenServiceResolver;
use registry_viewer::registry::transport::{CredentialsMode, TransportRequest};
use registry_viewer::{Logger, RegistryClient, Transport};
use reqwest::StatusCode;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHALLENGE: &str =
    r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:team/app:pull""#;

#[tokio::test]
async fn test_digest_addressed_get_served_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/team/app/blobs/{}", CONFIG_DIGEST)))
        .respond_with(ResponseTemplate::new(200).set_body_json(config_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let first = client.get_config_blob("team/app", CONFIG_DIGEST).await.expect("first fetch");
    let second = client.get_config_blob("team/app", CONFIG_DIGEST).await.expect("cached fetch");

    assert_eq!(first.data, second.data);
    assert_eq!(second.data.architecture.as_deref(), Some("amd64"));
}

#[tokio::test]
async fn test_cached_manifest_keeps_content_digest() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/team/app/manifests/{}", MANIFEST_DIGEST)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(manifest_json())
                .insert_header("Docker-Content-Digest", MANIFEST_DIGEST),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.get_manifest("team/app", MANIFEST_DIGEST).await.expect("first fetch");
    let cached = client.get_manifest("team/app", MANIFEST_DIGEST).await.expect("cached fetch");

    assert_eq!(cached.content_digest.as_deref(), Some(MANIFEST_DIGEST));
    assert_eq!(cached.data.layer_count(), 2);
}

#[tokio::test]
async fn test_tag_requests_always_hit_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/team/app/manifests/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest_json()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.get_manifest("team/app", "latest").await.expect("first fetch");
    client.get_manifest("team/app", "latest").await.expect("second fetch");
}

#[tokio::test]
async fn test_head_requests_are_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path(format!("/v2/team/app/blobs/{}", CONFIG_DIGEST)))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Length", "1234"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(client.check_blob_exists("team/app", CONFIG_DIGEST).await.unwrap());
    assert!(client.check_blob_exists("team/app", CONFIG_DIGEST).await.unwrap());
}

#[tokio::test]
async fn test_failed_digest_request_is_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/team/app/blobs/{}", CONFIG_DIGEST)))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(client.get_config_blob("team/app", CONFIG_DIGEST).await.is_err());
    assert!(client.get_config_blob("team/app", CONFIG_DIGEST).await.is_err());
}

#[tokio::test]
async fn test_unauthorized_replayed_once_with_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/team/app/tags/list"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "team/app",
            "tags": ["latest", "1.0"]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/team/app/tags/list"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", CHALLENGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let resolver = RecordingResolver::with_token("abc");
    let client = RegistryClient::new(mock_server.uri(), transport_with(Some(resolver.clone())));

    let tags = client
        .list_tags("team/app", &Default::default())
        .await
        .expect("authenticated listing");
    assert_eq!(tags.data.tags, Some(vec!["latest".to_string(), "1.0".to_string()]));

    let calls = resolver.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let challenge = calls[0].as_ref().expect("challenge passed to resolver");
    assert_eq!(challenge.realm, "https://auth.example.com/token");
    assert_eq!(challenge.service, "registry.example.com");
    assert_eq!(challenge.scope, "repository:team/app:pull");
}

#[tokio::test]
async fn test_second_unauthorized_returned_as_is() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", CHALLENGE))
        .expect(2)
        .mount(&mock_server)
        .await;

    let resolver = RecordingResolver::with_token("expired");
    let transport = transport_with(Some(resolver.clone()));

    let response = transport
        .send(&TransportRequest::get(format!("{}/v2/", mock_server.uri())))
        .await
        .expect("transport response");

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resolver.call_count(), 1);
}

#[tokio::test]
async fn test_include_mode_without_challenge_is_not_replayed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let resolver = RecordingResolver::with_token("abc");
    let transport = transport_with(Some(resolver.clone()));

    let request = TransportRequest::get(format!("{}/v2/", mock_server.uri())).credentials(CredentialsMode::Include);
    let response = transport.send(&request).await.expect("transport response");

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resolver.call_count(), 0);
}

#[tokio::test]
async fn test_replay_without_credential_uses_ambient_basic_auth() {
    let mock_server = MockServer::start().await;

    // admin:secret
    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "repositories": ["team/app"] })))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let resolver = RecordingResolver::without_token();
    let transport = Transport::builder()
        .with_credential_resolver(resolver.clone())
        .with_basic_auth("admin", Some("secret".to_string()))
        .with_logger(Logger::new_quiet())
        .build()
        .expect("transport");
    let client = RegistryClient::new(mock_server.uri(), Arc::new(transport));

    let catalog = client
        .list_repositories(&Default::default())
        .await
        .expect("catalog after replay");
    assert_eq!(catalog.data.repositories, Some(vec!["team/app".to_string()]));
    assert_eq!(resolver.call_count(), 1);
    assert!(resolver.calls.lock().unwrap()[0].is_none());
}

#[tokio::test]
async fn test_unauthorized_without_resolver_returned_as_is() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", CHALLENGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(!client.check_version().await);
}

#[tokio::test]
async fn test_content_digest_falls_back_to_body_hash() {
    let mock_server = MockServer::start().await;
    let body = manifest_json().to_string();

    Mock::given(method("GET"))
        .and(path("/v2/team/app/manifests/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let manifest = client.get_manifest("team/app", "latest").await.expect("manifest");

    assert_eq!(
        manifest.content_digest,
        Some(DigestUtils::compute_docker_digest(body.as_bytes()))
    );
}

#[tokio::test]
async fn test_content_digest_prefers_response_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/team/app/manifests/latest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(manifest_json())
                .insert_header("Docker-Content-Digest", MANIFEST_DIGEST),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let manifest = client.get_manifest("team/app", "latest").await.expect("manifest");
    assert_eq!(manifest.content_digest.as_deref(), Some(MANIFEST_DIGEST));
}

#[tokio::test]
async fn test_network_failure_carries_diagnostic() {
    let uri = "http://127.0.0.1:1".to_string();

    let client = RegistryClient::new(uri, transport_with(None));
    let err = client
        .list_repositories(&Default::default())
        .await
        .expect_err("request should fail");

    assert!(matches!(err, registry_viewer::RegistryError::Network { .. }));
}

#[tokio::test]
async fn test_token_service_exchange_end_to_end() {
    let mock_server = MockServer::start().await;
    let challenge = format!(
        r#"Bearer realm="{}/token",service="mock-registry",scope="registry:catalog:*""#,
        mock_server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/token"))
        .and(query_param("service", "mock-registry"))
        .and(query_param("scope", "registry:catalog:*"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "from-service",
            "expires_in": 300
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .and(header("authorization", "Bearer from-service"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "repositories": ["team/app"] })))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", challenge.as_str()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let resolver = TokenServiceResolver::new(reqwest::Client::new(), Logger::new_quiet()).with_basic_auth("admin", "secret");
    let transport = Transport::builder()
        .with_credential_resolver(Arc::new(resolver))
        .with_logger(Logger::new_quiet())
        .build()
        .expect("transport");
    let client = RegistryClient::new(mock_server.uri(), Arc::new(transport));

    let catalog = client
        .list_repositories(&Default::default())
        .await
        .expect("catalog with exchanged token");
    assert_eq!(catalog.data.repositories, Some(vec!["team/app".to_string()]));
}
