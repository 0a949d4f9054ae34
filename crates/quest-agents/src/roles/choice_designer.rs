//! Choice/option designer policy.

use async_trait::async_trait;

use quest_mechanics::voting::Vote;
use quest_mechanics::Message;

use crate::agent::{AgentAction, AgentProfile, ExpectedRecord};
use crate::context::{TurnContext, TurnRequest};
use crate::prompts;
use crate::roles::{RolePolicy, VotePrompt};

/// Designs the option set for an event. Needs a drafted event to work
/// against and skips once a choice set already exists.
pub struct ChoiceDesignerPolicy;

#[async_trait]
impl RolePolicy for ChoiceDesignerPolicy {
    fn role(&self) -> &'static str {
        "choice_designer"
    }

    fn decide(
        &self,
        _profile: &AgentProfile,
        _memory: &[Message],
        ctx: &TurnContext<'_>,
    ) -> AgentAction {
        if ctx.request != TurnRequest::ComposeEvent {
            return AgentAction::Wait;
        }
        if ctx.choice_set().is_some() {
            return AgentAction::Wait;
        }
        match ctx.event_draft() {
            Some(event) => AgentAction::Generate {
                prompt: prompts::choices_prompt(ctx, event),
                expect: ExpectedRecord::Choices,
            },
            None => AgentAction::Wait,
        }
    }

    /// The choice designer votes for the middle road.
    async fn cast_vote(&self, profile: &AgentProfile, prompt: &VotePrompt) -> Option<Vote> {
        let middle = prompt.options.get(prompt.options.len() / 2)?;
        Some(Vote::new(
            profile.name.clone(),
            middle.clone(),
            0.6,
            profile.voting_weight,
            "keeps more options open",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_mechanics::records::EventCard;
    use quest_mechanics::state::Combatant;
    use quest_mechanics::Payload;

    fn event_payload() -> Payload {
        Payload::EventDraft(EventCard {
            title: "Ambush".into(),
            description: "d".into(),
            event_type: "encounter".into(),
            enemy_name: "stalker".into(),
            enemy_types: vec!["water".into()],
            enemy_power: 6.0,
        })
    }

    #[test]
    fn test_waits_without_event_draft() {
        let team = vec![Combatant::new("piko", 100.0, vec![])];
        let ctx = TurnContext {
            team: &team,
            quest: None,
            current_step: 0,
            seed: 1,
            request: TurnRequest::ComposeEvent,
            artifacts: &[],
            style: "",
            flavor: "",
        };
        let action = ChoiceDesignerPolicy.decide(&AgentProfile::new("c", "r"), &[], &ctx);
        assert!(matches!(action, AgentAction::Wait));
    }

    #[test]
    fn test_generates_choices_for_drafted_event() {
        let team = vec![Combatant::new("piko", 100.0, vec![])];
        let artifacts = vec![event_payload()];
        let ctx = TurnContext {
            team: &team,
            quest: None,
            current_step: 0,
            seed: 1,
            request: TurnRequest::ComposeEvent,
            artifacts: &artifacts,
            style: "",
            flavor: "",
        };
        let action = ChoiceDesignerPolicy.decide(&AgentProfile::new("c", "r"), &[], &ctx);
        match action {
            AgentAction::Generate { expect, prompt } => {
                assert_eq!(expect, ExpectedRecord::Choices);
                assert!(prompt.contains("Ambush"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }
}
