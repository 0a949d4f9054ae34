//! Quest/event designer policy.

use async_trait::async_trait;

use quest_mechanics::voting::Vote;
use quest_mechanics::Message;

use crate::agent::{AgentAction, AgentProfile, ExpectedRecord};
use crate::context::{TurnContext, TurnRequest};
use crate::prompts;
use crate::roles::{RolePolicy, VotePrompt};

/// Drafts the quest framing and composes events. Skips its turn once a draft
/// already exists in the pipeline context, so re-running a stage is harmless.
pub struct QuestDesignerPolicy;

#[async_trait]
impl RolePolicy for QuestDesignerPolicy {
    fn role(&self) -> &'static str {
        "quest_designer"
    }

    fn decide(
        &self,
        _profile: &AgentProfile,
        _memory: &[Message],
        ctx: &TurnContext<'_>,
    ) -> AgentAction {
        match &ctx.request {
            TurnRequest::DraftQuest => {
                if ctx.quest_draft().is_some() {
                    return AgentAction::Wait;
                }
                AgentAction::Generate {
                    prompt: prompts::quest_prompt(ctx),
                    expect: ExpectedRecord::Quest,
                }
            }
            TurnRequest::ComposeEvent => {
                if ctx.event_draft().is_some() {
                    return AgentAction::Wait;
                }
                AgentAction::Generate {
                    prompt: prompts::event_prompt(ctx),
                    expect: ExpectedRecord::Event,
                }
            }
            TurnRequest::NarrateOutcome { .. } => AgentAction::Wait,
        }
    }

    /// The designer votes for spectacle: the boldest (last) option.
    async fn cast_vote(&self, profile: &AgentProfile, prompt: &VotePrompt) -> Option<Vote> {
        let boldest = prompt.options.last()?;
        Some(Vote::new(
            profile.name.clone(),
            boldest.clone(),
            0.7,
            profile.voting_weight,
            "the bold line makes the better story",
        ))
    }
}
