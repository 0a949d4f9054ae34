//! Shared perception context threaded through agent cycles.
//!
//! A pipeline stage sees the caller-held scene (team, quest, step, style)
//! plus the accumulated artifacts of earlier stages. The context is read-only
//! by construction: agents decide from it, they never write into it.

use serde::{Deserialize, Serialize};

use quest_mechanics::records::{ActionKind, ChoiceCard, EventCard, QuestCard, ValidationReport};
use quest_mechanics::rules::RiskLevel;
use quest_mechanics::state::{Combatant, Quest};
use quest_mechanics::Payload;

/// What the orchestration layer is asking the swarm to produce this turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnRequest {
    /// Draft the quest that frames a new session.
    DraftQuest,
    /// Compose the next event, its choices, and a scene narration.
    ComposeEvent,
    /// Narrate an already-resolved mechanical outcome.
    NarrateOutcome { facts: ResolutionFacts },
}

/// Mechanical facts of a resolved choice, handed to the narrator. Produced
/// exclusively by the rules engine; the narrator dresses them, never alters
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionFacts {
    pub action: ActionKind,
    pub risk: RiskLevel,
    pub success: bool,
    pub damage_dealt: f64,
    pub score_delta: i64,
    pub enemy_name: String,
}

/// The read-only context for one agent cycle.
#[derive(Debug, Clone)]
pub struct TurnContext<'a> {
    pub team: &'a [Combatant],
    pub quest: Option<&'a Quest>,
    pub current_step: u32,
    pub seed: u64,
    pub request: TurnRequest,
    /// Artifacts accumulated from earlier pipeline stages, oldest first.
    pub artifacts: &'a [Payload],
    /// Narrative style requested by the caller.
    pub style: &'a str,
    /// Species flavor text, already resolved (possibly empty).
    pub flavor: &'a str,
}

impl<'a> TurnContext<'a> {
    /// The latest quest draft among the artifacts.
    pub fn quest_draft(&self) -> Option<&'a QuestCard> {
        self.artifacts.iter().rev().find_map(|p| match p {
            Payload::QuestDraft(card) => Some(card),
            _ => None,
        })
    }

    /// The event under construction: a validator-adjusted event wins over
    /// the original draft.
    pub fn event_draft(&self) -> Option<&'a EventCard> {
        self.artifacts.iter().rev().find_map(|p| match p {
            Payload::Validation(ValidationReport {
                adjusted_event: Some(event),
                ..
            }) => Some(event),
            Payload::EventDraft(event) => Some(event),
            _ => None,
        })
    }

    /// The choice set under construction, preferring validator adjustments.
    pub fn choice_set(&self) -> Option<&'a [ChoiceCard]> {
        self.artifacts.iter().rev().find_map(|p| match p {
            Payload::Validation(ValidationReport {
                adjusted_choices: Some(choices),
                ..
            }) => Some(choices.as_slice()),
            Payload::ChoiceSet { choices } => Some(choices.as_slice()),
            _ => None,
        })
    }

    /// The latest validation report, if a validator has run.
    pub fn validation(&self) -> Option<&'a ValidationReport> {
        self.artifacts.iter().rev().find_map(|p| match p {
            Payload::Validation(report) => Some(report),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_mechanics::records::OutcomeBundle;

    fn event(title: &str) -> EventCard {
        EventCard {
            title: title.into(),
            description: "d".into(),
            event_type: "encounter".into(),
            enemy_name: "stalker".into(),
            enemy_types: vec!["water".into()],
            enemy_power: 6.0,
        }
    }

    fn ctx<'a>(artifacts: &'a [Payload], team: &'a [Combatant]) -> TurnContext<'a> {
        TurnContext {
            team,
            quest: None,
            current_step: 0,
            seed: 1,
            request: TurnRequest::ComposeEvent,
            artifacts,
            style: "grim",
            flavor: "",
        }
    }

    #[test]
    fn test_event_draft_prefers_adjusted() {
        let artifacts = vec![
            Payload::EventDraft(event("original")),
            Payload::Validation(ValidationReport {
                valid: true,
                warnings: vec!["power clamped".into()],
                adjusted_event: Some(event("adjusted")),
                adjusted_choices: None,
            }),
        ];
        let team: Vec<Combatant> = Vec::new();
        let ctx = ctx(&artifacts, &team);
        assert_eq!(ctx.event_draft().unwrap().title, "adjusted");
    }

    #[test]
    fn test_missing_artifacts_are_none() {
        let artifacts = vec![Payload::Narration(OutcomeBundle {
            narration: "n".into(),
            mood: "neutral".into(),
            followup_hook: String::new(),
        })];
        let team: Vec<Combatant> = Vec::new();
        let ctx = ctx(&artifacts, &team);
        assert!(ctx.event_draft().is_none());
        assert!(ctx.choice_set().is_none());
        assert!(ctx.quest_draft().is_none());
    }
}
