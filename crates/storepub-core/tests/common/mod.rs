//! Shared fixtures for the wiremock integration tests.
#![allow(dead_code)]

use std::time::Duration;

use storepub_core::{
    bind, DischargeToken, EndpointConfig, Macaroon, PollConfig, PresentableCredential, RootToken,
    StoreClient,
};
use wiremock::MockServer;

/// Identity caveat location matching a mock server's host.
pub const MOCK_AUTHORITY: &str = "127.0.0.1";

pub fn root_token() -> RootToken {
    let m = Macaroon::mint("dashboard.test", "root-id", b"root-key")
        .add_first_party_caveat("package_push = true")
        .add_third_party_caveat("a.example", "other-caveat", b"vid-a".to_vec())
        .add_third_party_caveat(MOCK_AUTHORITY, "sso-caveat", b"vid-sso".to_vec());
    RootToken::new(m.serialize())
}

pub fn discharge_token(tag: &str) -> DischargeToken {
    let m = Macaroon::mint(MOCK_AUTHORITY, "sso-caveat", tag.as_bytes())
        .add_first_party_caveat(format!("session {tag}"));
    DischargeToken::new(m.serialize())
}

pub fn credential() -> PresentableCredential {
    bind(&root_token(), &discharge_token("d1")).expect("fixture tokens bind")
}

pub fn create_test_client(mock_server: &MockServer) -> StoreClient {
    let config = EndpointConfig::default().with_base_url(mock_server.uri());
    StoreClient::new(config).expect("failed to create client")
}

pub fn fast_poll(max_attempts: u32) -> PollConfig {
    PollConfig::new(max_attempts, Duration::from_millis(10))
}

pub async fn requests_to(mock_server: &MockServer, path: &str) -> usize {
    mock_server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}

/// `Authorization` values received on `path`, in arrival order.
pub async fn authorization_sent_to(mock_server: &MockServer, path: &str) -> Vec<String> {
    mock_server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .filter_map(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .collect()
}
