use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dashclaw::recommend::{AdaptedField, RecommendationFilter};
use dashclaw::{ActionDefinition, EnforcementMode};

use super::client_harness::{
    AGENT_ID, bodies, client_with, mount_events, mount_guard, mount_submit, submitted,
};

const RECOMMENDATIONS: &str = "/api/learning/recommendations";
const EVENTS: &str = "/api/learning/recommendations/events";

fn deploy() -> ActionDefinition {
    ActionDefinition::new("deploy", "Ship release").with_risk_score(90)
}

async fn mount_recommendation(server: &MockServer, confidence: Value, hints: Value) {
    Mock::given(method("GET"))
        .and(path(RECOMMENDATIONS))
        .and(query_param("action_type", "deploy"))
        .and(query_param("limit", "1"))
        .and(query_param("agent_id", AGENT_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "recommendations": [{
                "id": "rec_1",
                "action_type": "deploy",
                "confidence": confidence,
                "hints": hints
            }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn off_mode_never_fetches_recommendations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECOMMENDATIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "recommendations": [] })))
        .expect(0)
        .mount(&server)
        .await;
    mount_submit(&server, "act_1", "running").await;

    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Off);
    claw.create_action(deploy()).await.unwrap();

    let body = submitted(&server).await;
    assert_eq!(body["risk_score"], 90);
    assert!(body.get("recommendation_id").is_none());
    assert!(body.get("recommendation_applied").is_none());
    server.verify().await;
}

#[tokio::test]
async fn enforce_applies_confident_recommendation() {
    let server = MockServer::start().await;
    mount_recommendation(&server, json!(90), json!({ "preferred_risk_cap": 40 })).await;
    Mock::given(method("POST"))
        .and(path("/api/guard"))
        .and(body_partial_json(json!({ "action_type": "deploy", "risk_score": 40 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "decision": "allow" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_events(&server).await;
    mount_submit(&server, "act_2", "running").await;

    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Enforce);
    claw.create_action(deploy()).await.unwrap();

    let body = submitted(&server).await;
    assert_eq!(body["risk_score"], 40);
    assert_eq!(body["recommendation_id"], "rec_1");
    assert_eq!(body["recommendation_applied"], true);
    assert_eq!(body["recommendation_override_reason"], Value::Null);

    let events = bodies(&server, "POST", EVENTS).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], "applied");
    assert_eq!(events[0]["recommendation_id"], "rec_1");
    assert_eq!(events[0]["agent_id"], AGENT_ID);
    assert_eq!(events[0]["details"]["adapted_fields"], json!(["risk_score"]));
    assert_eq!(events[0]["details"]["confidence"], 90);
    assert_eq!(events[0]["details"]["action_type"], "deploy");
    server.verify().await;
}

#[tokio::test]
async fn warn_mode_never_auto_adapts() {
    let server = MockServer::start().await;
    mount_recommendation(&server, json!(95), json!({ "preferred_risk_cap": 40 })).await;
    mount_guard(&server, json!({ "decision": "allow" })).await;
    mount_events(&server).await;
    mount_submit(&server, "act_3", "running").await;

    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Warn);
    claw.create_action(deploy()).await.unwrap();

    let body = submitted(&server).await;
    assert_eq!(body["risk_score"], 90);
    assert_eq!(body["recommendation_applied"], false);
    assert_eq!(body["recommendation_override_reason"], "warn_mode_no_autoadapt");

    let events = bodies(&server, "POST", EVENTS).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], "overridden");
    assert_eq!(events[0]["details"]["reason"], "warn_mode_no_autoadapt");
}

#[tokio::test]
async fn low_confidence_is_overridden_without_probing_guard() {
    let server = MockServer::start().await;
    mount_recommendation(&server, json!(50), json!({ "preferred_risk_cap": 40 })).await;
    Mock::given(method("POST"))
        .and(path("/api/guard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "decision": "allow" })))
        .expect(0)
        .mount(&server)
        .await;
    mount_events(&server).await;
    mount_submit(&server, "act_4", "running").await;

    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Enforce);
    claw.create_action(deploy()).await.unwrap();

    let body = submitted(&server).await;
    assert_eq!(body["risk_score"], 90);
    assert_eq!(body["recommendation_applied"], false);
    assert_eq!(
        body["recommendation_override_reason"],
        "confidence_below_threshold:50<70"
    );
    server.verify().await;
}

#[tokio::test]
async fn non_numeric_confidence_counts_as_zero() {
    let server = MockServer::start().await;
    mount_recommendation(&server, json!("very sure"), json!({ "preferred_risk_cap": 40 })).await;
    mount_events(&server).await;
    mount_submit(&server, "act_5", "running").await;

    let claw = client_with(&server, |c| {
        c.auto_recommend = EnforcementMode::Enforce;
        c.recommendation_confidence_min = 65.5;
    });
    claw.create_action(deploy()).await.unwrap();

    let body = submitted(&server).await;
    assert_eq!(
        body["recommendation_override_reason"],
        "confidence_below_threshold:0<65.5"
    );
}

#[tokio::test]
async fn restrictive_guard_probe_overrides_recommendation() {
    let server = MockServer::start().await;
    mount_recommendation(&server, json!(88), json!({ "preferred_risk_cap": 40, "prefer_reversible": true })).await;
    mount_guard(&server, json!({ "decision": "require_approval", "reasons": ["needs review"] })).await;
    mount_events(&server).await;
    mount_submit(&server, "act_6", "running").await;

    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Enforce);
    claw.create_action(deploy()).await.unwrap();

    let body = submitted(&server).await;
    assert_eq!(body["risk_score"], 90);
    assert!(body.get("reversible").is_none());
    assert_eq!(
        body["recommendation_override_reason"],
        "guard_restrictive:require_approval"
    );

    let events = bodies(&server, "POST", EVENTS).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], "overridden");
}

#[tokio::test]
async fn unreachable_guard_probe_does_not_block_adaptation() {
    let server = MockServer::start().await;
    mount_recommendation(&server, json!(90), json!({ "preferred_risk_cap": 40 })).await;
    Mock::given(method("POST"))
        .and(path("/api/guard"))
        .respond_with(ResponseTemplate::new(503).set_body_string("guard offline"))
        .expect(1)
        .mount(&server)
        .await;
    mount_events(&server).await;
    mount_submit(&server, "act_11", "running").await;

    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Enforce);
    let response = claw.create_action(deploy()).await.unwrap();
    assert_eq!(response.resolved_action_id(), Some("act_11"));

    let body = submitted(&server).await;
    assert_eq!(body["risk_score"], 40);
    assert_eq!(body["recommendation_applied"], true);

    let events = bodies(&server, "POST", EVENTS).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], "applied");
    server.verify().await;
}

#[tokio::test]
async fn telemetry_failure_never_blocks_submission() {
    let server = MockServer::start().await;
    mount_recommendation(&server, json!(90), json!({ "confidence_floor": 75 })).await;
    mount_guard(&server, json!({ "decision": "allow" })).await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_submit(&server, "act_7", "running").await;

    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Enforce);
    claw.create_action(deploy().with_confidence(30)).await.unwrap();

    let body = submitted(&server).await;
    assert_eq!(body["confidence"], 75);
    assert_eq!(body["recommendation_applied"], true);
    server.verify().await;
}

#[tokio::test]
async fn fetch_failure_submits_action_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECOMMENDATIONS))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    mount_submit(&server, "act_8", "running").await;

    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Enforce);
    claw.create_action(deploy()).await.unwrap();

    let body = submitted(&server).await;
    assert_eq!(body["risk_score"], 90);
    assert!(body.get("recommendation_id").is_none());
    server.verify().await;
}

#[tokio::test]
async fn no_recommendation_means_no_telemetry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECOMMENDATIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "recommendations": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    mount_submit(&server, "act_9", "running").await;

    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Enforce);
    claw.create_action(deploy()).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn observer_receives_candidate_adaptation() {
    let server = MockServer::start().await;
    mount_recommendation(&server, json!(92), json!({ "preferred_risk_cap": 30, "prefer_reversible": true })).await;
    mount_guard(&server, json!({ "decision": "allow" })).await;
    mount_events(&server).await;
    mount_submit(&server, "act_10", "running").await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let claw = client_with(&server, |c| c.auto_recommend = EnforcementMode::Warn)
        .with_recommendation_observer(move |adaptation| {
            sink.lock().unwrap().push(adaptation.adapted_fields.clone());
        });
    claw.create_action(deploy()).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![vec![AdaptedField::RiskScore, AdaptedField::Reversible]]
    );
}

#[tokio::test]
async fn listing_passes_filter_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECOMMENDATIONS))
        .and(query_param("agent_id", "other-agent"))
        .and(query_param("lookback_days", "14"))
        .and(query_param("track_events", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "recommendations": [{ "id": "rec_a", "confidence": 61 }, { "id": "rec_b", "confidence": 40 }],
            "total": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let list = client_with(&server, |_| {})
        .get_recommendations(&RecommendationFilter {
            agent_id: Some("other-agent".into()),
            lookback_days: Some(14),
            ..RecommendationFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(list.recommendations.len(), 2);
    assert_eq!(list.recommendations[0].id, "rec_a");
    server.verify().await;
}
