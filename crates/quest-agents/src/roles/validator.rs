//! Validator policy.
//!
//! The only role permitted to call the rules engine, and the only one
//! forbidden to call the reasoning service — its checks stay deterministic by
//! construction. Validation downgrades rather than aborts: questionable
//! records come back with warnings and adjusted fields, and `valid` only
//! flips when nothing usable remains (no quest draft, no active team).

use async_trait::async_trait;

use quest_mechanics::analysis::ThreatPosture;
use quest_mechanics::records::{ActionKind, ChoiceCard, EventCard, ValidationReport};
use quest_mechanics::rules::typing::effectiveness_from_labels;
use quest_mechanics::rules::RiskLevel;
use quest_mechanics::state::Combatant;
use quest_mechanics::voting::Vote;
use quest_mechanics::Message;

use crate::agent::{AgentAction, AgentProfile};
use crate::context::{TurnContext, TurnRequest};
use crate::roles::{RolePolicy, VotePrompt};

/// Enemy power beyond this is treated as a generation artifact and clamped.
const MAX_ENEMY_POWER: f64 = 12.0;

pub struct ValidatorPolicy;

#[async_trait]
impl RolePolicy for ValidatorPolicy {
    fn role(&self) -> &'static str {
        "validator"
    }

    fn decide(
        &self,
        _profile: &AgentProfile,
        _memory: &[Message],
        ctx: &TurnContext<'_>,
    ) -> AgentAction {
        // A missing draft is still validated: the report flags the absence
        // rather than silently passing.
        match &ctx.request {
            TurnRequest::DraftQuest | TurnRequest::ComposeEvent => AgentAction::Validate,
            TurnRequest::NarrateOutcome { .. } => AgentAction::Wait,
        }
    }

    fn validate(&self, ctx: &TurnContext<'_>) -> Option<ValidationReport> {
        match &ctx.request {
            TurnRequest::DraftQuest => Some(validate_quest(ctx)),
            TurnRequest::ComposeEvent => Some(validate_event(ctx)),
            TurnRequest::NarrateOutcome { .. } => None,
        }
    }

    /// The validator votes for the safest (first) option, with conviction
    /// rising as the team's situation worsens.
    async fn cast_vote(&self, profile: &AgentProfile, prompt: &VotePrompt) -> Option<Vote> {
        let safest = prompt.options.first()?;
        let confidence = match prompt.posture {
            ThreatPosture::Desperate => 0.95,
            ThreatPosture::Cautious => 0.85,
            ThreatPosture::Confident => 0.7,
        };
        Some(Vote::new(
            profile.name.clone(),
            safest.clone(),
            confidence,
            profile.voting_weight,
            "lowest mechanical downside",
        ))
    }
}

fn validate_quest(ctx: &TurnContext<'_>) -> ValidationReport {
    let mut report = ValidationReport::pass();

    if ctx.team.is_empty() {
        report.valid = false;
        report.warn("cannot start a quest with an empty team");
        return report;
    }

    let Some(draft) = ctx.quest_draft() else {
        report.valid = false;
        report.warn("no quest draft to validate");
        return report;
    };

    if RiskLevel::from_label(&draft.difficulty).is_some() {
        // A risk label in the difficulty slot is a common generation slip.
        report.warn("difficulty looks like a risk label; defaulting to normal");
    } else if !matches!(draft.difficulty.to_ascii_lowercase().as_str(), "easy" | "normal" | "hard")
    {
        report.warn("unknown difficulty label; defaulting to normal");
    }

    if draft.target_step_count == 0 {
        report.warn("target step count of zero; clamped to one");
    } else if draft.target_step_count > 20 {
        report.warn("target step count is unusually long");
    }

    report
}

fn validate_event(ctx: &TurnContext<'_>) -> ValidationReport {
    let mut report = ValidationReport::pass();

    let active: Vec<&Combatant> = ctx.team.iter().filter(|c| !c.is_fainted()).collect();
    if active.is_empty() {
        report.valid = false;
        report.warn("no active team members; the turn cannot be resolved");
        return report;
    }

    let Some(event) = ctx.event_draft() else {
        report.valid = false;
        report.warn("no event draft to validate");
        return report;
    };

    let mut adjusted_event = None;
    if event.enemy_power > MAX_ENEMY_POWER {
        let mut fixed = event.clone();
        fixed.enemy_power = MAX_ENEMY_POWER;
        report.warn(format!(
            "enemy power {} clamped to {MAX_ENEMY_POWER}",
            event.enemy_power
        ));
        adjusted_event = Some(fixed);
    }

    let mut adjusted_choices = None;
    if let Some(choices) = ctx.choice_set() {
        adjusted_choices = check_choices(ctx, event, choices, &active, &mut report);
    }

    report.adjusted_event = adjusted_event;
    report.adjusted_choices = adjusted_choices;
    report
}

/// Per-choice checks. Returns an adjusted set when any choice needed fixing.
fn check_choices(
    _ctx: &TurnContext<'_>,
    event: &EventCard,
    choices: &[ChoiceCard],
    active: &[&Combatant],
    report: &mut ValidationReport,
) -> Option<Vec<ChoiceCard>> {
    let weakest = active
        .iter()
        .min_by(|a, b| {
            a.health_fraction()
                .partial_cmp(&b.health_fraction())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|c| c.name.clone())
        .unwrap_or_default();

    let mut fixed: Vec<ChoiceCard> = choices.to_vec();
    let mut touched = false;

    for (position, choice) in fixed.iter_mut().enumerate() {
        if !choice.risk.is_empty() && RiskLevel::from_label(&choice.risk).is_none() {
            let resolved = choice.risk_level(position);
            report.warn(format!(
                "choice {position} risk label {:?} out of range; mapped to {resolved}",
                choice.risk
            ));
            choice.risk = resolved.to_string();
            touched = true;
        }

        if matches!(choice.action_kind, ActionKind::Battle | ActionKind::Capture)
            && !choice.target_name.is_empty()
            && !active.iter().any(|c| c.name == choice.target_name)
        {
            report.warn(format!(
                "choice {position} targets fainted member {:?}; re-pointed to {weakest:?}",
                choice.target_name
            ));
            choice.target_name = weakest.clone();
            touched = true;
        }

        if choice.action_kind == ActionKind::Battle {
            if let Some(attacker) = active.first() {
                if let Some(attack_type) = attacker.types.first() {
                    if effectiveness_from_labels(attack_type, &event.enemy_types) == 0.0 {
                        report.warn(format!(
                            "choice {position}: {attack_type} attacks cannot touch this enemy"
                        ));
                    }
                }
            }
        }
    }

    touched.then_some(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_mechanics::records::QuestCard;
    use quest_mechanics::Payload;

    fn event(enemy_types: Vec<String>, enemy_power: f64) -> EventCard {
        EventCard {
            title: "Ambush".into(),
            description: "d".into(),
            event_type: "encounter".into(),
            enemy_name: "stalker".into(),
            enemy_types,
            enemy_power,
        }
    }

    fn choice(label: &str, kind: ActionKind, risk: &str, target: &str) -> ChoiceCard {
        ChoiceCard {
            label: label.into(),
            action_kind: kind,
            risk: risk.into(),
            target_name: target.into(),
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
            style: "",
            flavor: "",
        }
    }

    #[test]
    fn test_wiped_team_is_invalid() {
        let team = vec![Combatant::new("piko", 100.0, vec![]).with_current_health(0.0)];
        let artifacts = vec![Payload::EventDraft(event(vec!["normal".into()], 6.0))];
        let report = ValidatorPolicy.validate(&ctx(&artifacts, &team)).unwrap();
        assert!(!report.valid);
    }

    #[test]
    fn test_enemy_power_clamped() {
        let team = vec![Combatant::new("piko", 100.0, vec!["electric".into()])];
        let artifacts = vec![Payload::EventDraft(event(vec!["normal".into()], 50.0))];
        let report = ValidatorPolicy.validate(&ctx(&artifacts, &team)).unwrap();
        assert!(report.valid);
        assert_eq!(report.adjusted_event.unwrap().enemy_power, MAX_ENEMY_POWER);
    }

    #[test]
    fn test_fainted_target_repointed() {
        let team = vec![
            Combatant::new("piko", 100.0, vec!["electric".into()]),
            Combatant::new("rumble", 80.0, vec!["rock".into()]).with_current_health(0.0),
        ];
        let artifacts = vec![
            Payload::EventDraft(event(vec!["water".into()], 6.0)),
            Payload::ChoiceSet {
                choices: vec![choice("Send Rumble", ActionKind::Battle, "safe", "rumble")],
            },
        ];
        let report = ValidatorPolicy.validate(&ctx(&artifacts, &team)).unwrap();
        assert!(report.valid);
        let adjusted = report.adjusted_choices.unwrap();
        assert_eq!(adjusted[0].target_name, "piko");
        assert!(report.warnings.iter().any(|w| w.contains("fainted")));
    }

    #[test]
    fn test_out_of_range_risk_mapped() {
        let team = vec![Combatant::new("piko", 100.0, vec!["electric".into()])];
        let artifacts = vec![
            Payload::EventDraft(event(vec!["normal".into()], 6.0)),
            Payload::ChoiceSet {
                choices: vec![
                    choice("a", ActionKind::Evade, "safe", ""),
                    choice("b", ActionKind::Evade, "reckless", ""),
                ],
            },
        ];
        let report = ValidatorPolicy.validate(&ctx(&artifacts, &team)).unwrap();
        let adjusted = report.adjusted_choices.unwrap();
        assert_eq!(adjusted[1].risk, "moderate");
    }

    #[test]
    fn test_immune_matchup_warns() {
        let team = vec![Combatant::new("piko", 100.0, vec!["electric".into()])];
        let artifacts = vec![
            Payload::EventDraft(event(vec!["ground".into()], 6.0)),
            Payload::ChoiceSet {
                choices: vec![choice("Zap it", ActionKind::Battle, "safe", "")],
            },
        ];
        let report = ValidatorPolicy.validate(&ctx(&artifacts, &team)).unwrap();
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("cannot touch")));
    }

    #[test]
    fn test_quest_validation_flags_odd_labels() {
        let team = vec![Combatant::new("piko", 100.0, vec![])];
        let artifacts = vec![Payload::QuestDraft(QuestCard {
            title: "T".into(),
            objective: "O".into(),
            difficulty: "risky".into(),
            target_step_count: 5,
        })];
        let mut ctx = ctx(&artifacts, &team);
        ctx.request = TurnRequest::DraftQuest;
        let report = ValidatorPolicy.validate(&ctx).unwrap();
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("risk label")));
    }

    #[test]
    fn test_missing_draft_is_invalid() {
        let team = vec![Combatant::new("piko", 100.0, vec![])];
        let report = ValidatorPolicy.validate(&ctx(&[], &team)).unwrap();
        assert!(!report.valid);
    }

    #[tokio::test]
    async fn test_vote_tracks_posture() {
        let prompt = VotePrompt {
            question: "route?".into(),
            options: vec!["ford".into(), "cliff".into()],
            posture: ThreatPosture::Desperate,
        };
        let vote = ValidatorPolicy
            .cast_vote(&AgentProfile::new("v", "r"), &prompt)
            .await
            .unwrap();
        assert_eq!(vote.choice, "ford");
        assert_eq!(vote.confidence, 0.95);
    }
}
