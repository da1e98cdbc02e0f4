use super::types::{AdaptedField, RecommendationHints};
use crate::action::ActionDefinition;

/// Largest whole score not above `cap`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn score_at_most(cap: f64) -> u8 {
    cap.clamp(0.0, 100.0).floor() as u8
}

/// Smallest whole score not below `floor`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn score_at_least(floor: f64) -> u8 {
    floor.clamp(0.0, 100.0).ceil() as u8
}

/// Apply recommendation hints to a copy of `action`.
///
/// A field is touched only when unset, except `risk_score` (lowered when
/// above the cap) and `confidence` (raised when below the floor).
pub fn apply_hints(
    action: &ActionDefinition,
    hints: &RecommendationHints,
) -> (ActionDefinition, Vec<AdaptedField>) {
    let mut adapted = action.clone();
    let mut fields = Vec::new();

    if let Some(cap) = hints.preferred_risk_cap {
        if adapted.risk_score.is_none_or(|risk| f64::from(risk) > cap) {
            adapted.risk_score = Some(score_at_most(cap));
            fields.push(AdaptedField::RiskScore);
        }
    }

    if hints.prefer_reversible == Some(true) && adapted.reversible.is_none() {
        adapted.reversible = Some(true);
        fields.push(AdaptedField::Reversible);
    }

    if let Some(floor) = hints.confidence_floor {
        if adapted.confidence.is_none_or(|confidence| f64::from(confidence) < floor) {
            adapted.confidence = Some(score_at_least(floor));
            fields.push(AdaptedField::Confidence);
        }
    }

    (adapted, fields)
}
