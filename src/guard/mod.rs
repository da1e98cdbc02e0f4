//! Pre-flight policy check against the remote guard.
//!
//! The gate fails open: if the guard cannot be reached the action proceeds
//! as though no guard were configured. Only an enforce-mode `block` or
//! `require_approval` decision stops a submission.

mod types;

pub use types::{Decision, GuardContext, GuardDecision};

use crate::action::ActionDefinition;
use crate::config::EnforcementMode;
use crate::error::{ClawError, TransportError};
use crate::observer::{Observer, notify};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

const GUARD_PATH: [&str; 2] = ["api", "guard"];

/// Query for the guard decision audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardDecisionFilter {
    pub decision: Option<Decision>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for GuardDecisionFilter {
    fn default() -> Self {
        Self {
            decision: None,
            limit: 20,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardDecisionPage {
    #[serde(default)]
    pub decisions: Vec<Value>,
    #[serde(default)]
    pub total: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct GuardGate {
    transport: Arc<Transport>,
    agent_id: String,
    mode: EnforcementMode,
    observer: Option<Observer<GuardDecision>>,
}

impl GuardGate {
    pub fn new(transport: Arc<Transport>, agent_id: impl Into<String>, mode: EnforcementMode) -> Self {
        Self {
            transport,
            agent_id: agent_id.into(),
            mode,
            observer: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Observer<GuardDecision>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_observer(&mut self, observer: Observer<GuardDecision>) {
        self.observer = Some(observer);
    }

    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    /// `POST /api/guard`. The context's `agent_id` defaults to this client's.
    pub async fn evaluate(
        &self,
        context: &GuardContext,
        include_signals: bool,
    ) -> Result<GuardDecision, TransportError> {
        let body = if context.agent_id.is_some() {
            context.clone()
        } else {
            GuardContext {
                agent_id: Some(self.agent_id.clone()),
                ..context.clone()
            }
        };
        let query = if include_signals {
            vec![("include_signals", "true".to_string())]
        } else {
            Vec::new()
        };
        self.transport.post(&GUARD_PATH, &query, &body).await
    }

    /// Run the configured check for an action about to be submitted.
    ///
    /// Returns the decision when one was obtained. Errors only with
    /// [`ClawError::GuardBlocked`] in enforce mode.
    pub async fn check(&self, action: &ActionDefinition) -> Result<Option<GuardDecision>, ClawError> {
        if self.mode.is_off() {
            return Ok(None);
        }

        let decision = match self.evaluate(&GuardContext::from_action(action), false).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(
                    action_type = %action.action_type,
                    "guard check failed (proceeding): {e}"
                );
                return Ok(None);
            }
        };

        if let Some(observer) = &self.observer {
            notify("guard", observer.as_ref(), &decision);
        }

        if !decision.is_blocked() {
            return Ok(Some(decision));
        }

        match self.mode {
            EnforcementMode::Enforce => Err(ClawError::GuardBlocked(Box::new(decision))),
            EnforcementMode::Warn | EnforcementMode::Off => {
                tracing::warn!(
                    decision = %decision.decision,
                    action_type = %action.action_type,
                    "guard {}: {}. Proceeding in warn mode.",
                    decision.decision,
                    decision.reason_summary()
                );
                Ok(Some(decision))
            }
        }
    }

    /// Evaluate without enforcing, for the recommendation adapter. Runs
    /// whatever the gate's mode; failures yield `None`.
    pub async fn probe(&self, action: &ActionDefinition) -> Option<GuardDecision> {
        match self.evaluate(&GuardContext::from_action(action), false).await {
            Ok(decision) => Some(decision),
            Err(e) => {
                tracing::warn!(
                    action_type = %action.action_type,
                    "recommendation guard probe failed: {e}"
                );
                None
            }
        }
    }

    /// `GET /api/guard`: recent decisions for this agent.
    pub async fn decisions(&self, filter: &GuardDecisionFilter) -> Result<GuardDecisionPage, TransportError> {
        let mut query = vec![
            ("agent_id", self.agent_id.clone()),
            ("limit", filter.limit.to_string()),
            ("offset", filter.offset.to_string()),
        ];
        if let Some(decision) = filter.decision {
            query.push(("decision", decision.to_string()));
        }
        self.transport.get(&GUARD_PATH, &query).await
    }
}

impl std::fmt::Debug for GuardGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardGate")
            .field("agent_id", &self.agent_id)
            .field("mode", &self.mode)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}
