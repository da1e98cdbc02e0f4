//! The governed client: every action passes recommendation adaptation, the
//! guard gate and signing before submission, and may then wait on approval.

mod track;
mod usage;

pub use track::TrackedAction;
pub use usage::{TokenUsage, TokenUsageReporter};

use crate::action::{
    ActionDefinition, ActionList, ActionOutcome, ActionPayload, ActionResponse, ApprovalDecision,
};
use crate::approval::ApprovalWaiter;
use crate::config::{ClientConfig, HitlMode};
use crate::error::Result;
use crate::guard::{GuardContext, GuardDecision, GuardDecisionFilter, GuardDecisionPage, GuardGate};
use crate::heartbeat::{HeartbeatReport, HeartbeatScheduler};
use crate::recommend::{
    Adaptation, RecommendationAdapter, RecommendationEvent, RecommendationFilter, RecommendationList,
};
use crate::signing::{PayloadSigner, SIGNATURE_FIELD, sign_payload};
use crate::transport::Transport;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const ACTIONS_PATH: [&str; 2] = ["api", "actions"];

#[derive(Serialize)]
struct SignedPayload<'a> {
    #[serde(flatten)]
    payload: &'a ActionPayload<'a>,
    #[serde(rename = "_signature")]
    signature: String,
}

#[derive(Serialize)]
struct ApprovalBody<'a> {
    decision: ApprovalDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<&'a str>,
}

pub struct DashClaw {
    config: ClientConfig,
    transport: Arc<Transport>,
    guard: GuardGate,
    recommender: RecommendationAdapter,
    signer: Option<PayloadSigner>,
    waiter: ApprovalWaiter,
    heartbeat: HeartbeatScheduler,
}

impl DashClaw {
    /// Validate `config` and build the client.
    ///
    /// A signing key that cannot be loaded is logged and the client runs
    /// unsigned.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let transport = Arc::new(Transport::new(
            &config.base_url,
            &config.api_key,
            config.request_timeout(),
        )?);

        let signer = config.signing_key_path.as_deref().and_then(|path| {
            PayloadSigner::from_pem_file(path)
                .map_err(|e| {
                    tracing::warn!(
                        path = %path.display(),
                        "signing key unavailable, actions will be sent unsigned: {e}"
                    );
                })
                .ok()
        });

        let guard = GuardGate::new(Arc::clone(&transport), &config.agent_id, config.guard_mode);
        let recommender = RecommendationAdapter::new(
            Arc::clone(&transport),
            &config.agent_id,
            config.auto_recommend,
            config.recommendation_confidence_min,
        );
        let waiter = ApprovalWaiter::from_config(Arc::clone(&transport), &config.approval);
        let heartbeat = HeartbeatScheduler::new(
            Arc::clone(&transport),
            &config.agent_id,
            config.agent_name.clone(),
            config.heartbeat.stop_timeout(),
        );

        Ok(Self {
            config,
            transport,
            guard,
            recommender,
            signer,
            waiter,
            heartbeat,
        })
    }

    #[must_use]
    pub fn with_guard_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&GuardDecision) + Send + Sync + 'static,
    {
        self.guard.set_observer(Arc::new(observer));
        self
    }

    #[must_use]
    pub fn with_recommendation_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Adaptation) + Send + Sync + 'static,
    {
        self.recommender.set_observer(Arc::new(observer));
        self
    }

    #[must_use]
    pub fn with_signer(mut self, signer: PayloadSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_signing(&self) -> bool {
        self.signer.is_some()
    }

    // ── Action submission ────────────────────────────────────────

    /// Adapt, guard, sign and submit an action.
    ///
    /// With `hitl_mode = wait`, a `pending_approval` response is followed by
    /// the approval wait and its resolution is returned instead.
    pub async fn create_action(&self, action: ActionDefinition) -> Result<ActionResponse> {
        let adaptation = self.recommender.adapt(action, &self.guard).await;
        let action = adaptation.action;

        self.guard.check(&action).await?;

        let payload = ActionPayload {
            agent_id: &self.config.agent_id,
            agent_name: self.config.agent_name.as_deref(),
            swarm_id: self.config.swarm_id.as_deref(),
            action: &action,
        };

        let response: ActionResponse = match sign_payload(self.signer.as_ref(), &payload) {
            Some(signature) => {
                tracing::debug!(field = SIGNATURE_FIELD, "action payload signed");
                let signed = SignedPayload {
                    payload: &payload,
                    signature,
                };
                self.transport.post(&ACTIONS_PATH, &[], &signed).await?
            }
            None => self.transport.post(&ACTIONS_PATH, &[], &payload).await?,
        };

        if response.is_pending_approval() && self.config.hitl_mode == HitlMode::Wait {
            match response.resolved_action_id() {
                Some(action_id) => return self.waiter.wait(action_id).await,
                None => tracing::warn!("pending action returned without an action_id; not waiting"),
            }
        }

        Ok(response)
    }

    /// `PATCH /api/actions/{id}`; `timestamp_end` defaults to now.
    pub async fn update_outcome(&self, action_id: &str, mut outcome: ActionOutcome) -> Result<ActionResponse> {
        if outcome.timestamp_end.is_none() {
            outcome.timestamp_end = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        Ok(self
            .transport
            .patch(&["api", "actions", action_id], &outcome)
            .await?)
    }

    pub async fn get_action(&self, action_id: &str) -> Result<ActionResponse> {
        Ok(self
            .transport
            .get(&["api", "actions", action_id], &[])
            .await?)
    }

    // ── Approvals ────────────────────────────────────────────────

    /// Record an operator verdict. `decision` must be `allow` or `deny`.
    pub async fn approve_action(
        &self,
        action_id: &str,
        decision: &str,
        reasoning: Option<&str>,
    ) -> Result<ActionResponse> {
        let body = ApprovalBody {
            decision: ApprovalDecision::parse(decision)?,
            reasoning,
        };
        Ok(self
            .transport
            .post(&["api", "actions", action_id, "approve"], &[], &body)
            .await?)
    }

    pub async fn get_pending_approvals(&self, limit: u32, offset: u32) -> Result<ActionList> {
        let query = [
            ("status", "pending_approval".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        Ok(self.transport.get(&ACTIONS_PATH, &query).await?)
    }

    pub async fn wait_for_approval(&self, action_id: &str) -> Result<ActionResponse> {
        self.waiter.wait(action_id).await
    }

    // ── Guard ────────────────────────────────────────────────────

    /// Evaluate a context directly, without enforcement.
    pub async fn guard(&self, context: &GuardContext, include_signals: bool) -> Result<GuardDecision> {
        Ok(self.guard.evaluate(context, include_signals).await?)
    }

    pub async fn get_guard_decisions(&self, filter: &GuardDecisionFilter) -> Result<GuardDecisionPage> {
        Ok(self.guard.decisions(filter).await?)
    }

    // ── Recommendations ──────────────────────────────────────────

    pub async fn get_recommendations(&self, filter: &RecommendationFilter) -> Result<RecommendationList> {
        Ok(self.recommender.list(filter).await?)
    }

    pub async fn record_recommendation_event(&self, event: &RecommendationEvent) -> Result<Value> {
        Ok(self.recommender.record_event(event).await?)
    }

    // ── Liveness ─────────────────────────────────────────────────

    pub async fn heartbeat(&self, report: &HeartbeatReport) -> Result<Value> {
        Ok(self.heartbeat.report(report).await?)
    }

    /// Start periodic reports at the configured interval.
    pub fn start_heartbeat(&self, report: HeartbeatReport) -> bool {
        self.heartbeat.start(self.config.heartbeat.interval(), report)
    }

    pub fn start_heartbeat_every(&self, interval: Duration, report: HeartbeatReport) -> bool {
        self.heartbeat.start(interval, report)
    }

    pub async fn stop_heartbeat(&self) -> bool {
        self.heartbeat.stop().await
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    // ── Token usage ──────────────────────────────────────────────

    pub async fn report_token_usage(&self, usage: TokenUsage) -> Result<Value> {
        Ok(self.post_token_usage(&usage).await?)
    }
}

impl std::fmt::Debug for DashClaw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashClaw")
            .field("base_url", &self.transport.base_url())
            .field("agent_id", &self.config.agent_id)
            .field("guard_mode", &self.config.guard_mode)
            .field("auto_recommend", &self.config.auto_recommend)
            .field("hitl_mode", &self.config.hitl_mode)
            .field("signing", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

