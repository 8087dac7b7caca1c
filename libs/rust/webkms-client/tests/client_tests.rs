//! HTTP-level tests for the WebKMS client.
//!
//! Validates request shape, request authentication headers and the mapping
//! of remote failures onto the error taxonomy.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::json;
use sha2::{Digest, Sha256};
use webkms_client::{
    InvocationSigner, KeyCustody, KeystoreConfig, KmsError, WebKmsClient, WebKmsConfig,
};
use wiremock::matchers::{body_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestSigner;

impl InvocationSigner for TestSigner {
    fn id(&self) -> &str {
        "did:key:z6MkTestController"
    }

    fn verification_method(&self) -> String {
        "did:key:z6MkTestController#z6MkTestController".to_string()
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }
}

fn client_for(server: &MockServer) -> WebKmsClient {
    WebKmsClient::new(WebKmsConfig::new(format!("{}/kms", server.uri()))).unwrap()
}

#[tokio::test]
async fn test_create_keystore_posts_config() {
    let server = MockServer::start().await;
    let keystore_id = format!("{}/kms/keystores/z1", server.uri());

    Mock::given(method("POST"))
        .and(path("/kms/keystores"))
        .and(body_json(json!({
            "sequence": 0,
            "controller": "did:key:z6MkTestController",
            "referenceId": "primary",
            "kmsModule": "ssm-v1"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": keystore_id,
            "sequence": 0,
            "controller": "did:key:z6MkTestController",
            "referenceId": "primary",
            "kmsModule": "ssm-v1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let config =
        KeystoreConfig::new("did:key:z6MkTestController", "ssm-v1").with_reference_id("primary");
    let keystore = client.create_keystore(&config).await.unwrap();

    assert_eq!(keystore.id, keystore_id);
    assert_eq!(keystore.reference_id.as_deref(), Some("primary"));
}

#[tokio::test]
async fn test_generate_key_is_signed() {
    let server = MockServer::start().await;
    let keystore_id = format!("{}/kms/keystores/z1", server.uri());

    Mock::given(method("POST"))
        .and(path("/kms/keystores/z1/keys"))
        .and(header_exists("authorization"))
        .and(header_exists("digest"))
        .and(header_exists("date"))
        .and(body_json(json!({ "type": "Sha256HmacKey2019" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("{keystore_id}/keys/k1"),
            "type": "Sha256HmacKey2019"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let key = client
        .generate_key(&keystore_id, "Sha256HmacKey2019", &TestSigner)
        .await
        .unwrap();

    assert_eq!(key.key_type, "Sha256HmacKey2019");
    assert!(key.id.ends_with("/keys/k1"));
}

#[tokio::test]
async fn test_sign_round_trips_base64url() {
    let server = MockServer::start().await;
    let key_id = format!("{}/kms/keystores/z1/keys/k1", server.uri());
    let data = [7u8; 32];

    Mock::given(method("POST"))
        .and(path("/kms/keystores/z1/keys/k1/sign"))
        .and(body_json(json!({ "verifyData": URL_SAFE_NO_PAD.encode(data) })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "signatureValue": URL_SAFE_NO_PAD.encode([9u8; 32])
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let signature = client.sign(&key_id, &data, &TestSigner).await.unwrap();
    assert_eq!(signature, vec![9u8; 32]);
}

#[tokio::test]
async fn test_verify_reads_verified_flag() {
    let server = MockServer::start().await;
    let key_id = format!("{}/kms/keystores/z1/keys/k1", server.uri());

    Mock::given(method("POST"))
        .and(path("/kms/keystores/z1/keys/k1/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "verified": false })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let verified = client
        .verify(&key_id, b"data", b"sig", &TestSigner)
        .await
        .unwrap();
    assert!(!verified);
}

#[tokio::test]
async fn test_forbidden_maps_to_permission_denied() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/kms/keystores"))
        .respond_with(ResponseTemplate::new(403).set_body_string("ip not allowed"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let config = KeystoreConfig::new("did:key:z6MkTestController", "ssm-v1");
    let result = client.create_keystore(&config).await;

    assert!(matches!(result, Err(KmsError::PermissionDenied(msg)) if msg.contains("ip not allowed")));
}

#[tokio::test]
async fn test_server_error_maps_to_unavailable() {
    let server = MockServer::start().await;
    let keystore_id = format!("{}/kms/keystores/z1", server.uri());

    Mock::given(method("GET"))
        .and(path("/kms/keystores/z1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.get_keystore(&keystore_id, &TestSigner).await;
    assert!(matches!(result, Err(KmsError::Unavailable(_))));
}

#[tokio::test]
async fn test_missing_keystore_maps_to_not_found() {
    let server = MockServer::start().await;
    let keystore_id = format!("{}/kms/keystores/missing", server.uri());

    Mock::given(method("GET"))
        .and(path("/kms/keystores/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.get_keystore(&keystore_id, &TestSigner).await;
    assert!(matches!(result, Err(KmsError::NotFound(_))));
}

#[tokio::test]
async fn test_malformed_signature_is_operation_error() {
    let server = MockServer::start().await;
    let key_id = format!("{}/kms/keystores/z1/keys/k1", server.uri());

    Mock::given(method("POST"))
        .and(path("/kms/keystores/z1/keys/k1/sign"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "signatureValue": "***" })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.sign(&key_id, b"data", &TestSigner).await;
    assert!(matches!(result, Err(KmsError::Operation(_))));
}
