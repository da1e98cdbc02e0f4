#![allow(dead_code)]

use std::path::PathBuf;

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dashclaw::{ClientConfig, DashClaw};

pub const API_KEY: &str = "test-key";
pub const AGENT_ID: &str = "agent-test";

pub fn config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig {
        base_url: server.uri(),
        api_key: API_KEY.into(),
        agent_id: AGENT_ID.into(),
        request_timeout_secs: 5,
        ..ClientConfig::default()
    };
    config.approval.timeout_secs = 5;
    config.approval.poll_interval_ms = 20;
    config.heartbeat.stop_timeout_ms = 1_000;
    config
}

pub fn client(server: &MockServer) -> DashClaw {
    DashClaw::new(config(server)).expect("test client should build")
}

pub fn client_with<F>(server: &MockServer, customize: F) -> DashClaw
where
    F: FnOnce(&mut ClientConfig),
{
    let mut config = config(server);
    customize(&mut config);
    DashClaw::new(config).expect("test client should build")
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn action_body(action_id: &str, status: &str) -> Value {
    json!({
        "action_id": action_id,
        "action": { "action_id": action_id, "status": status, "agent_id": AGENT_ID }
    })
}

/// Accept submissions and answer with `status`.
pub async fn mount_submit(server: &MockServer, action_id: &str, status: &str) {
    Mock::given(method("POST"))
        .and(path("/api/actions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(action_body(action_id, status)))
        .mount(server)
        .await;
}

pub async fn mount_guard(server: &MockServer, decision: Value) {
    Mock::given(method("POST"))
        .and(path("/api/guard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(decision))
        .mount(server)
        .await;
}

pub async fn mount_events(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/learning/recommendations/events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "created_count": 1 })))
        .mount(server)
        .await;
}

/// JSON bodies of every request received for `method_name path_name`.
pub async fn bodies(server: &MockServer, method_name: &str, path_name: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .into_iter()
        .filter(|r| r.method.as_str() == method_name && r.url.path() == path_name)
        .map(|r| serde_json::from_slice(&r.body).expect("request body is JSON"))
        .collect()
}

pub async fn submitted(server: &MockServer) -> Value {
    let mut all = bodies(server, "POST", "/api/actions").await;
    assert_eq!(all.len(), 1, "expected exactly one submission");
    all.remove(0)
}
