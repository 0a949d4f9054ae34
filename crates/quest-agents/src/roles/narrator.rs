//! Narrator policy.

use async_trait::async_trait;

use quest_mechanics::voting::Vote;
use quest_mechanics::{Message, Payload};

use crate::agent::{AgentAction, AgentProfile, ExpectedRecord};
use crate::context::{TurnContext, TurnRequest};
use crate::prompts;
use crate::roles::{RolePolicy, VotePrompt};

/// Dresses events and mechanical outcomes in prose. Runs last in the event
/// pipeline, and alone when a resolved choice needs narration.
pub struct NarratorPolicy;

#[async_trait]
impl RolePolicy for NarratorPolicy {
    fn role(&self) -> &'static str {
        "narrator"
    }

    fn decide(
        &self,
        _profile: &AgentProfile,
        _memory: &[Message],
        ctx: &TurnContext<'_>,
    ) -> AgentAction {
        match &ctx.request {
            TurnRequest::ComposeEvent => {
                let already_narrated = ctx
                    .artifacts
                    .iter()
                    .any(|p| matches!(p, Payload::Narration(_)));
                match ctx.event_draft() {
                    Some(event) if !already_narrated => AgentAction::Generate {
                        prompt: prompts::scene_prompt(ctx, event),
                        expect: ExpectedRecord::Outcome,
                    },
                    _ => AgentAction::Wait,
                }
            }
            TurnRequest::NarrateOutcome { facts } => AgentAction::Generate {
                prompt: prompts::outcome_prompt(ctx, facts),
                expect: ExpectedRecord::Outcome,
            },
            TurnRequest::DraftQuest => AgentAction::Wait,
        }
    }

    /// The narrator votes for whatever sounds best: the longest label.
    async fn cast_vote(&self, profile: &AgentProfile, prompt: &VotePrompt) -> Option<Vote> {
        let evocative = prompt.options.iter().max_by_key(|o| o.len())?;
        Some(Vote::new(
            profile.name.clone(),
            evocative.clone(),
            0.5,
            profile.voting_weight,
            "richer material to narrate",
        ))
    }
}
