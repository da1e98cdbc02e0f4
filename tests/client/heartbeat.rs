use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dashclaw::heartbeat::{AgentStatus, HeartbeatReport};
use dashclaw::{TokenUsage, TokenUsageReporter};

use super::client_harness::{AGENT_ID, bodies, client, client_with};

const HEARTBEAT: &str = "/api/agents/heartbeat";
const TOKENS: &str = "/api/tokens";

async fn mount_heartbeat(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(HEARTBEAT))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "ok": status < 400 })))
        .mount(server)
        .await;
}

async fn wait_for_requests(server: &MockServer, at_least: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        let seen = bodies(server, "POST", HEARTBEAT).await.len();
        if seen >= at_least || Instant::now() >= deadline {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn single_report_carries_agent_and_task() {
    let server = MockServer::start().await;
    mount_heartbeat(&server, 200).await;

    let claw = client_with(&server, |c| c.agent_name = Some("Release Bot".into()));
    claw.heartbeat(&HeartbeatReport {
        status: AgentStatus::Busy,
        current_task_id: Some("task_9".into()),
        metadata: Some(json!({ "queue": 3 })),
    })
    .await
    .unwrap();

    let sent = bodies(&server, "POST", HEARTBEAT).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["agent_id"], AGENT_ID);
    assert_eq!(sent[0]["agent_name"], "Release Bot");
    assert_eq!(sent[0]["status"], "busy");
    assert_eq!(sent[0]["current_task_id"], "task_9");
    assert_eq!(sent[0]["metadata"]["queue"], 3);
}

#[tokio::test]
async fn direct_report_surfaces_service_errors() {
    let server = MockServer::start().await;
    mount_heartbeat(&server, 500).await;

    let err = client(&server)
        .heartbeat(&HeartbeatReport::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let server = MockServer::start().await;
    mount_heartbeat(&server, 200).await;
    let claw = client(&server);

    assert!(claw.start_heartbeat_every(Duration::from_secs(60), HeartbeatReport::default()));
    assert!(!claw.start_heartbeat_every(Duration::from_secs(60), HeartbeatReport::default()));
    assert_eq!(wait_for_requests(&server, 1).await, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(claw.stop_heartbeat().await);
    assert_eq!(bodies(&server, "POST", HEARTBEAT).await.len(), 1);
}

#[tokio::test]
async fn stop_does_not_wait_out_the_interval() {
    let server = MockServer::start().await;
    mount_heartbeat(&server, 200).await;
    let claw = client(&server);

    assert!(claw.start_heartbeat_every(Duration::from_secs(60), HeartbeatReport::default()));
    wait_for_requests(&server, 1).await;

    let started = Instant::now();
    assert!(claw.stop_heartbeat().await);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!claw.heartbeat_running());
    assert!(!claw.stop_heartbeat().await);
}

#[tokio::test]
async fn failing_reports_do_not_kill_the_worker() {
    let server = MockServer::start().await;
    mount_heartbeat(&server, 500).await;
    let claw = client(&server);

    assert!(claw.start_heartbeat_every(Duration::from_millis(20), HeartbeatReport::default()));
    let seen = wait_for_requests(&server, 3).await;
    assert!(seen >= 3, "worker stopped after {seen} reports");
    assert!(claw.heartbeat_running());
    claw.stop_heartbeat().await;
}

#[tokio::test]
async fn slow_reports_do_not_stretch_the_period() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;
    let claw = client(&server);

    assert!(claw.start_heartbeat_every(Duration::from_millis(200), HeartbeatReport::default()));
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    claw.stop_heartbeat().await;

    let seen = bodies(&server, "POST", HEARTBEAT).await.len();
    assert!(seen >= 5, "expected a fixed 200ms period, saw {seen} reports");
}

#[tokio::test]
async fn scheduler_can_restart_after_stop() {
    let server = MockServer::start().await;
    mount_heartbeat(&server, 200).await;
    let claw = client(&server);

    assert!(claw.start_heartbeat_every(Duration::from_secs(60), HeartbeatReport::default()));
    wait_for_requests(&server, 1).await;
    claw.stop_heartbeat().await;

    let report = HeartbeatReport {
        status: AgentStatus::Error,
        ..HeartbeatReport::default()
    };
    assert!(claw.start_heartbeat_every(Duration::from_secs(60), report));
    assert_eq!(wait_for_requests(&server, 2).await, 2);
    claw.stop_heartbeat().await;

    let sent = bodies(&server, "POST", HEARTBEAT).await;
    assert_eq!(sent[0]["status"], "online");
    assert_eq!(sent[1]["status"], "error");
}

#[tokio::test]
async fn token_usage_is_attributed_to_agent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKENS))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .report_token_usage(TokenUsage {
            tokens_in: 1200,
            tokens_out: 340,
            model: Some("gpt-test".into()),
            ..TokenUsage::default()
        })
        .await
        .unwrap();

    let sent = bodies(&server, "POST", TOKENS).await;
    assert_eq!(
        sent[0],
        json!({ "tokens_in": 1200, "tokens_out": 340, "model": "gpt-test", "agent_id": AGENT_ID })
    );
    server.verify().await;
}

#[tokio::test]
async fn llm_usage_without_counts_is_not_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKENS))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    client(&server).record_llm_usage(None, None, None).await;
    server.verify().await;
}

#[tokio::test]
async fn llm_usage_failures_are_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKENS))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "nope" })))
        .expect(1)
        .mount(&server)
        .await;

    let claw = client(&server);
    let reporter: &dyn TokenUsageReporter = &claw;
    reporter.record_llm_usage(Some(10), None, None).await;

    let sent = bodies(&server, "POST", TOKENS).await;
    assert_eq!(sent[0]["tokens_in"], 10);
    assert_eq!(sent[0]["tokens_out"], 0);
    server.verify().await;
}
