//! Learned-recommendation adaptation of actions before submission.
//!
//! Every path that finds a recommendation records exactly one `applied` or
//! `overridden` event. Fetch, probe and telemetry failures are logged and
//! never reach the caller.

mod hints;
mod types;

pub use hints::apply_hints;
pub use types::{
    AdaptedField, Adaptation, EventType, Recommendation, RecommendationEvent, RecommendationFilter,
    RecommendationHints, RecommendationList,
};

use crate::action::{ActionDefinition, RecommendationAnnotation};
use crate::config::{EnforcementMode, normalize_confidence_min};
use crate::error::TransportError;
use crate::guard::GuardGate;
use crate::observer::{Observer, notify};
use crate::transport::Transport;
use serde_json::{Value, json};
use std::sync::Arc;

const RECOMMENDATIONS_PATH: [&str; 3] = ["api", "learning", "recommendations"];
const EVENTS_PATH: [&str; 4] = ["api", "learning", "recommendations", "events"];

pub struct RecommendationAdapter {
    transport: Arc<Transport>,
    agent_id: String,
    mode: EnforcementMode,
    confidence_min: f64,
    observer: Option<Observer<Adaptation>>,
}

impl RecommendationAdapter {
    pub fn new(
        transport: Arc<Transport>,
        agent_id: impl Into<String>,
        mode: EnforcementMode,
        confidence_min: f64,
    ) -> Self {
        Self {
            transport,
            agent_id: agent_id.into(),
            mode,
            confidence_min: normalize_confidence_min(Some(confidence_min)),
            observer: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Observer<Adaptation>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_observer(&mut self, observer: Observer<Adaptation>) {
        self.observer = Some(observer);
    }

    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    pub fn confidence_min(&self) -> f64 {
        self.confidence_min
    }

    pub async fn list(&self, filter: &RecommendationFilter) -> Result<RecommendationList, TransportError> {
        let query = filter.to_query(&self.agent_id);
        self.transport.get(&RECOMMENDATIONS_PATH, &query).await
    }

    /// The single top-ranked recommendation for an action type.
    pub async fn fetch_top(&self, action_type: &str) -> Result<Option<Recommendation>, TransportError> {
        let filter = RecommendationFilter {
            limit: Some(1),
            ..RecommendationFilter::for_action_type(action_type)
        };
        let list = self.list(&filter).await?;
        Ok(list.recommendations.into_iter().next())
    }

    /// `POST /api/learning/recommendations/events`.
    pub async fn record_event(&self, event: &RecommendationEvent) -> Result<Value, TransportError> {
        let body = if event.agent_id.is_some() {
            event.clone()
        } else {
            RecommendationEvent {
                agent_id: Some(self.agent_id.clone()),
                ..event.clone()
            }
        };
        self.transport.post(&EVENTS_PATH, &[], &body).await
    }

    /// Fire-and-forget variant of [`record_event`](Self::record_event).
    pub async fn report_event(&self, event: RecommendationEvent) {
        if let Err(e) = self.record_event(&event).await {
            tracing::debug!(event_type = ?event.event_type, "recommendation telemetry dropped: {e}");
        }
    }

    /// Fetch hints for the action's type and decide whether to apply them.
    ///
    /// The guard probe is fed the candidate (hint-adapted) action so policy
    /// sees the values that would actually be submitted.
    pub async fn adapt(&self, action: ActionDefinition, guard: &GuardGate) -> Adaptation {
        if self.mode.is_off() || !action.has_action_type() {
            return Adaptation::unchanged(action);
        }

        let recommendation = match self.fetch_top(&action.action_type).await {
            Ok(recommendation) => recommendation,
            Err(e) => {
                tracing::warn!(
                    action_type = %action.action_type,
                    "recommendation fetch failed (proceeding): {e}"
                );
                return Adaptation::unchanged(action);
            }
        };

        let candidate = match recommendation {
            Some(recommendation) => {
                let (adapted, fields) = apply_hints(&action, &recommendation.hints);
                Adaptation {
                    action: adapted,
                    recommendation: Some(recommendation),
                    adapted_fields: fields,
                }
            }
            None => Adaptation::unchanged(action.clone()),
        };

        if let Some(observer) = &self.observer {
            notify("recommendation", observer.as_ref(), &candidate);
        }

        let Some(recommendation) = candidate.recommendation.clone() else {
            return candidate;
        };

        let confidence = recommendation.confidence;
        if confidence < self.confidence_min {
            let reason = format!(
                "confidence_below_threshold:{confidence}<{}",
                self.confidence_min
            );
            return self.overridden(action, recommendation, reason).await;
        }

        if let Some(decision) = guard.probe(&candidate.action).await {
            if decision.is_blocked() {
                let reason = format!("guard_restrictive:{}", decision.decision);
                return self.overridden(action, recommendation, reason).await;
            }
        }

        if self.mode == EnforcementMode::Warn {
            return self
                .overridden(action, recommendation, "warn_mode_no_autoadapt".to_string())
                .await;
        }

        let fields: Vec<&str> = candidate.adapted_fields.iter().map(|f| f.as_str()).collect();
        self.report_event(
            RecommendationEvent::new(&recommendation.id, EventType::Applied)
                .with_detail("action_type", action.action_type.as_str())
                .with_detail("adapted_fields", fields)
                .with_detail("confidence", json_number(confidence)),
        )
        .await;
        tracing::debug!(
            recommendation_id = %recommendation.id,
            adapted_fields = ?candidate.adapted_fields,
            "recommendation applied"
        );

        let mut applied = candidate;
        applied.action.recommendation = Some(RecommendationAnnotation::applied(&recommendation.id));
        applied
    }

    async fn overridden(
        &self,
        mut action: ActionDefinition,
        recommendation: Recommendation,
        reason: String,
    ) -> Adaptation {
        self.report_event(
            RecommendationEvent::new(&recommendation.id, EventType::Overridden)
                .with_detail("action_type", action.action_type.as_str())
                .with_detail("reason", reason.as_str()),
        )
        .await;
        tracing::debug!(
            recommendation_id = %recommendation.id,
            reason = %reason,
            "recommendation overridden"
        );

        action.recommendation = Some(RecommendationAnnotation::overridden(
            &recommendation.id,
            reason,
        ));
        Adaptation {
            action,
            recommendation: Some(recommendation),
            adapted_fields: Vec::new(),
        }
    }
}

/// Integral values go out as JSON integers.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

impl std::fmt::Debug for RecommendationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationAdapter")
            .field("agent_id", &self.agent_id)
            .field("mode", &self.mode)
            .field("confidence_min", &self.confidence_min)
            .finish_non_exhaustive()
    }
}
