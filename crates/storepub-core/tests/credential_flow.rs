//! Integration tests for the credential lifecycle.
//!
//! Uses wiremock for the store and identity endpoints. Covers root token
//! issuance, discharge with and without a second factor, refresh, and the
//! session flow over an encrypted on-disk store.

mod common;

use common::{create_test_client, discharge_token, requests_to, root_token};
use storepub_core::{
    CaveatId, CredentialPair, CredentialStore, Passphrase, PublishError, ScriptedPrompt, Session,
    StoreConfig,
};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACL_PATH: &str = "/dev/api/acl/";
const DISCHARGE_PATH: &str = "/api/v2/tokens/discharge";
const REFRESH_PATH: &str = "/api/v2/tokens/refresh";

fn test_store(dir: &tempfile::TempDir) -> CredentialStore {
    let passphrase = Passphrase::new("correct horse battery").unwrap();
    let config = StoreConfig {
        passphrase,
        pre_encrypted_credential: None,
        store_path: dir.path().join("credential.enc"),
    };
    CredentialStore::new(config)
}

async fn mount_issue(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(ACL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "macaroon": root_token().as_str()
        })))
        .mount(mock_server)
        .await;
}

fn second_factor_required() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(serde_json::json!({
        "code": "TWOFACTOR_REQUIRED",
        "message": "2-factor authentication required."
    }))
}

// ==================== Issuance ====================

#[tokio::test]
async fn test_issue_root_token_requests_permissions() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ACL_PATH))
        .and(body_json(serde_json::json!({
            "permissions": ["package_access", "package_push", "package_update", "package_release"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "macaroon": "AgEK"
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let root = client.issue_root_token().await.expect("issuance failed");
    assert_eq!(root.as_str(), "AgEK");
}

#[tokio::test]
async fn test_issue_root_token_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ACL_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.issue_root_token().await;
    assert!(matches!(result, Err(PublishError::TokenIssuance { .. })));
}

// ==================== Discharge ====================

#[tokio::test]
async fn test_authenticate_without_second_factor() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DISCHARGE_PATH))
        .and(body_json(serde_json::json!({
            "email": "dev@example.com",
            "password": "hunter22",
            "caveat_id": "sso-caveat"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "discharge_macaroon": "discharged"
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let prompt = ScriptedPrompt::new(["dev@example.com", "hunter22"]);
    let discharge = client
        .authenticate(&CaveatId("sso-caveat".into()), &prompt)
        .await
        .expect("authentication failed");

    assert_eq!(discharge.as_str(), "discharged");
    assert_eq!(prompt.asked(), vec!["Email", "Password"]);
}

#[tokio::test]
async fn test_authenticate_with_second_factor() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DISCHARGE_PATH))
        .and(body_partial_json(serde_json::json!({"otp": "123456"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "discharge_macaroon": "discharged-2fa"
        })))
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(DISCHARGE_PATH))
        .respond_with(second_factor_required())
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let prompt = ScriptedPrompt::new(["dev@example.com", "hunter22", "123456"]);
    let discharge = client
        .authenticate(&CaveatId("sso-caveat".into()), &prompt)
        .await
        .expect("authentication failed");

    assert_eq!(discharge.as_str(), "discharged-2fa");
    assert_eq!(
        prompt.asked(),
        vec!["Email", "Password", "Second-factor code"]
    );
    assert_eq!(requests_to(&mock_server, DISCHARGE_PATH).await, 2);
}

#[tokio::test]
async fn test_second_factor_asked_at_most_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DISCHARGE_PATH))
        .respond_with(second_factor_required())
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let prompt = ScriptedPrompt::new(["dev@example.com", "hunter22", "000000", "111111"]);
    let result = client
        .authenticate(&CaveatId("sso-caveat".into()), &prompt)
        .await;

    assert!(matches!(
        result,
        Err(PublishError::AuthenticationFailed { .. })
    ));
    assert_eq!(
        prompt.asked(),
        vec!["Email", "Password", "Second-factor code"]
    );
    assert_eq!(requests_to(&mock_server, DISCHARGE_PATH).await, 2);
}

#[tokio::test]
async fn test_wrong_password_reports_identity_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DISCHARGE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "code": "INVALID_CREDENTIALS",
            "message": "Provided email/password is not correct."
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let prompt = ScriptedPrompt::new(["dev@example.com", "wrong-password"]);
    let result = client
        .authenticate(&CaveatId("sso-caveat".into()), &prompt)
        .await;

    match result {
        Err(PublishError::AuthenticationFailed { message }) => {
            assert_eq!(message, "Provided email/password is not correct.")
        }
        other => panic!("expected AuthenticationFailed, got {:?}", other),
    }
    assert_eq!(prompt.asked(), vec!["Email", "Password"]);
}

// ==================== Refresh ====================

#[tokio::test]
async fn test_refresh_returns_new_discharge() {
    let mock_server = MockServer::start().await;
    let old = discharge_token("old");
    let new = discharge_token("new");

    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(serde_json::json!({"discharge_macaroon": old.as_str()})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "discharge_macaroon": new.as_str()
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let refreshed = client.refresh(&old).await.expect("refresh failed");
    assert_eq!(refreshed, new);
}

#[tokio::test]
async fn test_refresh_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.refresh(&discharge_token("old")).await;
    assert!(matches!(result, Err(PublishError::RefreshFailed { .. })));
}

// ==================== Session ====================

#[tokio::test]
async fn test_session_logs_in_when_store_empty() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    mount_issue(&mock_server).await;
    Mock::given(method("POST"))
        .and(path(DISCHARGE_PATH))
        .and(body_partial_json(serde_json::json!({"caveat_id": "sso-caveat"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "discharge_macaroon": discharge_token("login").as_str()
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let prompt = ScriptedPrompt::new(["dev@example.com", "hunter22"]);
    let credential = Session::new(&client, &store)
        .credential(&prompt)
        .await
        .expect("session failed");

    assert!(credential.header_value().starts_with("Macaroon root=\""));
    let saved = store.load().await.unwrap().expect("credential saved");
    assert_eq!(saved.root, root_token());
    assert_eq!(saved.discharge, discharge_token("login"));
    assert_eq!(requests_to(&mock_server, REFRESH_PATH).await, 0);
}

#[tokio::test]
async fn test_session_refreshes_stored_credential() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);
    store
        .save(&CredentialPair::new(root_token(), discharge_token("old")))
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "discharge_macaroon": discharge_token("refreshed").as_str()
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let prompt = ScriptedPrompt::new(Vec::<String>::new());
    Session::new(&client, &store)
        .credential(&prompt)
        .await
        .expect("session failed");

    let saved = store.load().await.unwrap().expect("credential saved");
    assert_eq!(saved.root, root_token());
    assert_eq!(saved.discharge, discharge_token("refreshed"));
    assert!(prompt.asked().is_empty());
    assert_eq!(requests_to(&mock_server, ACL_PATH).await, 0);
}

#[tokio::test]
async fn test_session_reauthenticates_after_refresh_failure() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);
    store
        .save(&CredentialPair::new(root_token(), discharge_token("stale")))
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(DISCHARGE_PATH))
        .and(body_partial_json(serde_json::json!({"caveat_id": "sso-caveat"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "discharge_macaroon": discharge_token("fresh").as_str()
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let prompt = ScriptedPrompt::new(["dev@example.com", "hunter22"]);
    Session::new(&client, &store)
        .credential(&prompt)
        .await
        .expect("session failed");

    let saved = store.load().await.unwrap().expect("credential saved");
    assert_eq!(saved.root, root_token());
    assert_eq!(saved.discharge, discharge_token("fresh"));
    assert_eq!(requests_to(&mock_server, ACL_PATH).await, 0);
}

#[tokio::test]
async fn test_session_failed_login_leaves_store_untouched() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    mount_issue(&mock_server).await;
    Mock::given(method("POST"))
        .and(path(DISCHARGE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "code": "INVALID_CREDENTIALS",
            "message": "Provided email/password is not correct."
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let prompt = ScriptedPrompt::new(["dev@example.com", "wrong"]);
    let result = Session::new(&client, &store).credential(&prompt).await;

    assert!(matches!(
        result,
        Err(PublishError::AuthenticationFailed { .. })
    ));
    assert!(store.load().await.unwrap().is_none());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_session_missing_identity_caveat() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);

    let foreign_root = storepub_core::Macaroon::mint("dashboard.test", "root-id", b"k")
        .add_third_party_caveat("login.elsewhere", "cid", b"vid".to_vec());
    Mock::given(method("POST"))
        .and(path(ACL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "macaroon": foreign_root.serialize()
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let prompt = ScriptedPrompt::new(["dev@example.com", "hunter22"]);
    let result = Session::new(&client, &store).login(&prompt).await;

    match result {
        Err(PublishError::CaveatNotFound { authority }) => assert_eq!(authority, "127.0.0.1"),
        other => panic!("expected CaveatNotFound, got {:?}", other),
    }
    assert!(prompt.asked().is_empty());
    assert_eq!(requests_to(&mock_server, DISCHARGE_PATH).await, 0);
}
