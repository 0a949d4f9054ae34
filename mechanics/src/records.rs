//! Structured records exchanged across the reasoning boundary.
//!
//! Every record a reasoning worker produces (quest, event, choice set,
//! narration) has a fixed field schema. The recovery parser hands back a raw
//! JSON value; `from_recovered` validates it against the schema, applying the
//! documented fallback defaults for missing or out-of-range fields rather
//! than rejecting the turn. Records that fail even the defaulted validation
//! are rejected fail-closed.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rules::{Difficulty, RiskLevel};
use crate::state::Quest;

/// Error type for schema validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("Record does not match the {expected} schema: {detail}")]
    Mismatch {
        expected: &'static str,
        detail: String,
    },

    #[error("Record is missing required content for {expected}: {detail}")]
    MissingContent {
        expected: &'static str,
        detail: String,
    },
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

fn default_difficulty_label() -> String {
    "normal".to_string()
}

fn default_target_steps() -> u32 {
    5
}

fn default_enemy_types() -> Vec<String> {
    vec!["normal".to_string()]
}

fn default_enemy_power() -> f64 {
    5.0
}

fn default_event_type() -> String {
    "encounter".to_string()
}

/// A generated quest framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestCard {
    pub title: String,
    pub objective: String,
    #[serde(default = "default_difficulty_label")]
    pub difficulty: String,
    #[serde(default = "default_target_steps")]
    pub target_step_count: u32,
}

impl QuestCard {
    /// Validate a recovered value against this schema.
    pub fn from_recovered(value: Value) -> SchemaResult<Self> {
        let card: Self = serde_json::from_value(value).map_err(|e| SchemaError::Mismatch {
            expected: "quest",
            detail: e.to_string(),
        })?;
        if card.title.trim().is_empty() || card.objective.trim().is_empty() {
            return Err(SchemaError::MissingContent {
                expected: "quest",
                detail: "empty title or objective".into(),
            });
        }
        Ok(card)
    }

    /// Resolved difficulty; unknown labels default to normal.
    pub fn difficulty(&self) -> Difficulty {
        Difficulty::from_label(&self.difficulty)
    }

    /// Convert into session state, clamping a degenerate step count.
    pub fn into_quest(self) -> Quest {
        Quest {
            difficulty: self.difficulty(),
            target_step_count: self.target_step_count.max(1),
            title: self.title,
            objective: self.objective,
        }
    }
}

/// A generated narrative event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EventCard {
    pub title: String,
    pub description: String,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub enemy_name: String,
    #[serde(default = "default_enemy_types")]
    pub enemy_types: Vec<String>,
    #[serde(default = "default_enemy_power")]
    pub enemy_power: f64,
}

impl EventCard {
    /// Validate a recovered value against this schema. A non-finite or
    /// negative enemy power falls back to the default rather than failing:
    /// the record is narrative, the number just needs to be usable.
    pub fn from_recovered(value: Value) -> SchemaResult<Self> {
        let mut card: Self = serde_json::from_value(value).map_err(|e| SchemaError::Mismatch {
            expected: "event",
            detail: e.to_string(),
        })?;
        if card.title.trim().is_empty() {
            return Err(SchemaError::MissingContent {
                expected: "event",
                detail: "empty title".into(),
            });
        }
        if !card.enemy_power.is_finite() || card.enemy_power < 0.0 {
            card.enemy_power = default_enemy_power();
        }
        if card.enemy_types.is_empty() {
            card.enemy_types = default_enemy_types();
        }
        Ok(card)
    }
}

/// One generated option presented to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceCard {
    pub label: String,
    /// What the choice mechanically does: battle, capture, or evade.
    pub action_kind: ActionKind,
    /// Risk label as generated; resolve via `risk_level` with the choice's
    /// position for the documented positional fallback.
    #[serde(default)]
    pub risk: String,
    /// Team member the action is performed by, when the generator names one.
    #[serde(default)]
    pub target_name: String,
}

/// The closed set of mechanical actions a choice can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Battle,
    Capture,
    Evade,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Battle => write!(f, "battle"),
            Self::Capture => write!(f, "capture"),
            Self::Evade => write!(f, "evade"),
        }
    }
}

impl ChoiceCard {
    /// Resolve the risk label, falling back positionally for out-of-range
    /// labels.
    pub fn risk_level(&self, position: usize) -> RiskLevel {
        RiskLevel::from_label_or_position(&self.risk, position)
    }
}

/// A set of generated choices. Wrapped so the reasoning worker returns one
/// object rather than a bare array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceSet {
    pub choices: Vec<ChoiceCard>,
}

impl ChoiceSet {
    /// Validate a recovered value against this schema; an empty choice list
    /// is rejected fail-closed.
    pub fn from_recovered(value: Value) -> SchemaResult<Self> {
        let set: Self = serde_json::from_value(value).map_err(|e| SchemaError::Mismatch {
            expected: "choice_set",
            detail: e.to_string(),
        })?;
        if set.choices.is_empty() {
            return Err(SchemaError::MissingContent {
                expected: "choice_set",
                detail: "no choices".into(),
            });
        }
        Ok(set)
    }
}

fn default_mood() -> String {
    "neutral".to_string()
}

/// A generated narration bundle: scene or outcome text plus framing hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutcomeBundle {
    pub narration: String,
    #[serde(default = "default_mood")]
    pub mood: String,
    #[serde(default)]
    pub followup_hook: String,
}

impl OutcomeBundle {
    /// Validate a recovered value against this schema.
    pub fn from_recovered(value: Value) -> SchemaResult<Self> {
        let bundle: Self = serde_json::from_value(value).map_err(|e| SchemaError::Mismatch {
            expected: "outcome",
            detail: e.to_string(),
        })?;
        if bundle.narration.trim().is_empty() {
            return Err(SchemaError::MissingContent {
                expected: "outcome",
                detail: "empty narration".into(),
            });
        }
        Ok(bundle)
    }
}

/// Output of the validator role. Validation downgrades rather than aborts:
/// a questionable record comes back with warnings and adjusted fields, and
/// `valid` only flips when nothing usable remains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Event with unusable fields replaced, when adjustments were needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_event: Option<EventCard>,
    /// Choice set with illegal targets re-pointed, when adjustments were
    /// needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_choices: Option<Vec<ChoiceCard>>,
}

impl ValidationReport {
    /// A clean pass.
    pub fn pass() -> Self {
        Self {
            valid: true,
            warnings: Vec::new(),
            adjusted_event: None,
            adjusted_choices: None,
        }
    }

    /// Record a downgrade warning.
    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quest_defaults_applied() {
        let card = QuestCard::from_recovered(json!({
            "title": "Mistfen Crossing",
            "objective": "Reach the far shore"
        }))
        .unwrap();
        assert_eq!(card.difficulty(), Difficulty::Normal);
        assert_eq!(card.target_step_count, 5);
    }

    #[test]
    fn test_quest_rejects_empty_title() {
        let err = QuestCard::from_recovered(json!({
            "title": "  ",
            "objective": "Reach the far shore"
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::MissingContent { .. }));
    }

    #[test]
    fn test_quest_into_quest_clamps_steps() {
        let quest = QuestCard::from_recovered(json!({
            "title": "T",
            "objective": "O",
            "target_step_count": 0
        }))
        .unwrap()
        .into_quest();
        assert_eq!(quest.target_step_count, 1);
    }

    #[test]
    fn test_event_defaults() {
        let card = EventCard::from_recovered(json!({
            "title": "Ambush at the ford",
            "description": "Reeds part and something low rushes the bank."
        }))
        .unwrap();
        assert_eq!(card.enemy_types, vec!["normal".to_string()]);
        assert_eq!(card.enemy_power, 5.0);
        assert_eq!(card.event_type, "encounter");
    }

    #[test]
    fn test_event_repairs_bad_power() {
        let card = EventCard::from_recovered(json!({
            "title": "Ambush",
            "description": "d",
            "enemy_power": -3.0,
            "enemy_types": []
        }))
        .unwrap();
        assert_eq!(card.enemy_power, 5.0);
        assert_eq!(card.enemy_types, vec!["normal".to_string()]);
    }

    #[test]
    fn test_choice_set_rejects_empty() {
        let err = ChoiceSet::from_recovered(json!({"choices": []})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingContent { .. }));
    }

    #[test]
    fn test_choice_risk_positional_fallback() {
        let set = ChoiceSet::from_recovered(json!({
            "choices": [
                {"label": "Press the attack", "action_kind": "battle", "risk": "reckless"},
                {"label": "Throw a lure", "action_kind": "capture", "risk": "moderate"},
                {"label": "Slip away", "action_kind": "evade"}
            ]
        }))
        .unwrap();
        assert_eq!(set.choices[0].risk_level(0), RiskLevel::Safe);
        assert_eq!(set.choices[1].risk_level(1), RiskLevel::Moderate);
        assert_eq!(set.choices[2].risk_level(2), RiskLevel::Risky);
    }

    #[test]
    fn test_outcome_requires_narration() {
        assert!(OutcomeBundle::from_recovered(json!({"narration": ""})).is_err());
        let bundle = OutcomeBundle::from_recovered(json!({
            "narration": "The bank falls quiet again."
        }))
        .unwrap();
        assert_eq!(bundle.mood, "neutral");
    }

    #[test]
    fn test_schema_mismatch_reports_expected() {
        let err = QuestCard::from_recovered(json!([1, 2, 3])).unwrap_err();
        match err {
            SchemaError::Mismatch { expected, .. } => assert_eq!(expected, "quest"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_validation_report_downgrade() {
        let mut report = ValidationReport::pass();
        report.warn("risk label out of range, mapped by position");
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_records_serde_roundtrip() {
        let card = EventCard {
            title: "Ambush".into(),
            description: "d".into(),
            event_type: "encounter".into(),
            enemy_name: "marsh stalker".into(),
            enemy_types: vec!["water".into(), "dark".into()],
            enemy_power: 6.0,
        };
        let json = serde_json::to_string(&card).unwrap();
        let restored: EventCard = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, card);
    }
}
