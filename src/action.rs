//! Wire types for submitted actions and their lifecycle.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ── Action definition ────────────────────────────────────────────

/// A decision an agent wants to take, as built by the caller.
///
/// Known fields are typed; anything else the service accepts goes into
/// `extensions`, which is flattened into the submitted JSON. Unset optional
/// fields are omitted from the payload entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionDefinition {
    pub action_type: String,
    pub declared_goal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systems_touched: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversible: Option<bool>,
    /// 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u8>,
    /// 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    /// Set only by the recommendation adapter.
    #[serde(flatten)]
    pub recommendation: Option<RecommendationAnnotation>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ActionDefinition {
    pub fn new(action_type: impl Into<String>, declared_goal: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            declared_goal: declared_goal.into(),
            ..Self::default()
        }
    }

    pub fn with_risk_score(mut self, risk_score: u8) -> Self {
        self.risk_score = Some(risk_score.min(100));
        self
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence.min(100));
        self
    }

    pub fn with_reversible(mut self, reversible: bool) -> Self {
        self.reversible = Some(reversible);
        self
    }

    pub fn with_systems<I, S>(mut self, systems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.systems_touched = Some(systems.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Whether there is an action type to look recommendations up by.
    pub fn has_action_type(&self) -> bool {
        !self.action_type.trim().is_empty()
    }
}

/// Recommendation bookkeeping carried on a submitted action.
///
/// Built only through [`applied`](Self::applied) or
/// [`overridden`](Self::overridden): an applied recommendation never carries
/// an override reason. The reason serializes as `null` when applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendationAnnotation {
    recommendation_id: String,
    recommendation_applied: bool,
    recommendation_override_reason: Option<String>,
}

impl RecommendationAnnotation {
    pub fn applied(recommendation_id: impl Into<String>) -> Self {
        Self {
            recommendation_id: recommendation_id.into(),
            recommendation_applied: true,
            recommendation_override_reason: None,
        }
    }

    pub fn overridden(recommendation_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            recommendation_id: recommendation_id.into(),
            recommendation_applied: false,
            recommendation_override_reason: Some(reason.into()),
        }
    }

    pub fn recommendation_id(&self) -> &str {
        &self.recommendation_id
    }

    pub fn is_applied(&self) -> bool {
        self.recommendation_applied
    }

    pub fn override_reason(&self) -> Option<&str> {
        self.recommendation_override_reason.as_deref()
    }
}

/// Body of `POST /api/actions`, and the exact value that gets signed.
#[derive(Debug, Serialize)]
pub struct ActionPayload<'a> {
    pub agent_id: &'a str,
    pub agent_name: Option<&'a str>,
    pub swarm_id: Option<&'a str>,
    #[serde(flatten)]
    pub action: &'a ActionDefinition,
}

// ── Server-side lifecycle ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Running,
    PendingApproval,
    Completed,
    Failed,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::PendingApproval => "pending_approval",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The server's view of an action. Only the lifecycle fields are typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default)]
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of submit, fetch and approval-wait calls: `{action_id, action, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<SubmittedAction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionResponse {
    pub fn status(&self) -> Option<ActionStatus> {
        self.action.as_ref().map(|a| a.status)
    }

    /// `action_id` from the envelope, falling back to the nested action.
    pub fn resolved_action_id(&self) -> Option<&str> {
        self.action_id
            .as_deref()
            .or_else(|| self.action.as_ref().and_then(|a| a.action_id.as_deref()))
    }

    pub fn is_pending_approval(&self) -> bool {
        self.status() == Some(ActionStatus::PendingApproval)
    }
}

/// Page of `GET /api/actions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionList {
    #[serde(default)]
    pub actions: Vec<SubmittedAction>,
    #[serde(default)]
    pub total: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Operator verdict for `POST /api/actions/{id}/approve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Allow,
    Deny,
}

impl ApprovalDecision {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(ConfigError::InvalidDecision(other.to_string())),
        }
    }
}

// ── Outcome reporting ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Body of `PATCH /api/actions/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OutcomeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_created: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
    /// RFC 3339; filled with the current time when left unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_end: Option<String>,
}

impl ActionOutcome {
    pub fn completed(duration_ms: u64) -> Self {
        Self {
            status: Some(OutcomeStatus::Completed),
            duration_ms: Some(duration_ms),
            ..Self::default()
        }
    }

    pub fn failed(duration_ms: u64, error_message: impl Into<String>) -> Self {
        Self {
            status: Some(OutcomeStatus::Failed),
            duration_ms: Some(duration_ms),
            error_message: Some(error_message.into()),
            ..Self::default()
        }
    }
}
