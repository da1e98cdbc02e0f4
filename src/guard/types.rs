use crate::action::ActionDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    #[default]
    Allow,
    Warn,
    Block,
    RequireApproval,
    /// A decision this client does not recognise; never restrictive.
    #[serde(other)]
    Unknown,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Warn => "warn",
            Self::Block => "block",
            Self::RequireApproval => "require_approval",
            Self::Unknown => "unknown",
        }
    }

    /// `block` and `require_approval` stop an enforce-mode submission.
    pub fn is_restrictive(self) -> bool {
        matches!(self, Self::Block | Self::RequireApproval)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a remote guard evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardDecision {
    #[serde(default)]
    pub decision: Decision,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub matched_policies: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    /// Present only when the evaluation asked for signals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GuardDecision {
    pub fn is_blocked(&self) -> bool {
        self.decision.is_restrictive()
    }

    pub fn reason_summary(&self) -> String {
        if self.reasons.is_empty() {
            "no reason".to_string()
        } else {
            self.reasons.join("; ")
        }
    }
}

/// The subset of an action the guard evaluates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuardContext {
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systems_touched: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_goal: Option<String>,
    /// Filled with the client's agent when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GuardContext {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            ..Self::default()
        }
    }

    pub fn from_action(action: &ActionDefinition) -> Self {
        Self {
            action_type: action.action_type.clone(),
            risk_score: action.risk_score,
            systems_touched: action.systems_touched.clone(),
            reversible: action.reversible,
            declared_goal: Some(action.declared_goal.clone()),
            agent_id: None,
            extra: Map::new(),
        }
    }
}
