use crate::action::ActionDefinition;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A server-derived suggestion for one action type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    /// 0-100. Anything non-numeric on the wire reads as 0.
    #[serde(default, deserialize_with = "coerce_number")]
    pub confidence: f64,
    #[serde(default)]
    pub hints: RecommendationHints,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Adaptation hints. A hint of the wrong JSON type is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationHints {
    #[serde(default, deserialize_with = "number_only", skip_serializing_if = "Option::is_none")]
    pub preferred_risk_cap: Option<f64>,
    #[serde(default, deserialize_with = "bool_only", skip_serializing_if = "Option::is_none")]
    pub prefer_reversible: Option<bool>,
    #[serde(default, deserialize_with = "number_only", skip_serializing_if = "Option::is_none")]
    pub confidence_floor: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationList {
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Query for `GET /api/learning/recommendations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationFilter {
    /// Defaults to the client's agent.
    pub agent_id: Option<String>,
    pub action_type: Option<String>,
    pub limit: Option<u32>,
    pub include_inactive: bool,
    pub track_events: bool,
    pub include_metrics: bool,
    pub lookback_days: Option<u32>,
}

impl Default for RecommendationFilter {
    fn default() -> Self {
        Self {
            agent_id: None,
            action_type: None,
            limit: None,
            include_inactive: false,
            track_events: true,
            include_metrics: false,
            lookback_days: None,
        }
    }
}

impl RecommendationFilter {
    pub fn for_action_type(action_type: impl Into<String>) -> Self {
        Self {
            action_type: Some(action_type.into()),
            ..Self::default()
        }
    }

    pub(crate) fn to_query(&self, default_agent: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![(
            "agent_id",
            self.agent_id.clone().unwrap_or_else(|| default_agent.to_string()),
        )];
        if let Some(action_type) = &self.action_type {
            query.push(("action_type", action_type.clone()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if self.include_inactive {
            query.push(("include_inactive", "true".into()));
        }
        if self.track_events {
            query.push(("track_events", "true".into()));
        }
        if self.include_metrics {
            query.push(("include_metrics", "true".into()));
        }
        if let Some(days) = self.lookback_days {
            query.push(("lookback_days", days.to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Fetched,
    Applied,
    Overridden,
    Outcome,
}

/// Telemetry about how a recommendation was used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_id: Option<String>,
    pub event_type: EventType,
    /// Defaults to the client's agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl RecommendationEvent {
    pub fn new(recommendation_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            recommendation_id: Some(recommendation_id.into()),
            event_type,
            agent_id: None,
            action_id: None,
            details: Map::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptedField {
    RiskScore,
    Reversible,
    Confidence,
}

impl AdaptedField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RiskScore => "risk_score",
            Self::Reversible => "reversible",
            Self::Confidence => "confidence",
        }
    }
}

/// Result of running an action through the recommendation adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Adaptation {
    pub action: ActionDefinition,
    pub recommendation: Option<Recommendation>,
    /// Fields changed on `action`; empty unless the recommendation was applied
    /// (or, for the observer, would be applied).
    pub adapted_fields: Vec<AdaptedField>,
}

impl Adaptation {
    pub fn unchanged(action: ActionDefinition) -> Self {
        Self {
            action,
            recommendation: None,
            adapted_fields: Vec::new(),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.action
            .recommendation
            .as_ref()
            .is_some_and(|r| r.is_applied())
    }
}

// ── Lenient number handling ──────────────────────────────────────

/// Numbers pass through; numeric strings are parsed; everything else is 0.
fn coerce_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_confidence(&value))
}

pub(crate) fn coerce_confidence(value: &Value) -> f64 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    number.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn number_only<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_f64())
}

fn bool_only<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_bool())
}
