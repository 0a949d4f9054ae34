//! Role policies.
//!
//! Roles are variants of one loop contract, not behavioral subclasses: every
//! agent runs the same perceive → reason → act cycle, and a policy only
//! chooses prompts, expected schemas, and protocol stances. The validator is
//! the exception that proves the rule — it is the only role allowed to reach
//! the rules engine, and the only one forbidden to call the reasoning
//! service.

use async_trait::async_trait;

use quest_mechanics::analysis::ThreatPosture;
use quest_mechanics::negotiation::{Position, Proposal};
use quest_mechanics::records::ValidationReport;
use quest_mechanics::voting::Vote;
use quest_mechanics::Message;

use crate::agent::{Agent, AgentAction, AgentProfile};
use crate::context::TurnContext;

pub mod choice_designer;
pub mod narrator;
pub mod quest_designer;
pub mod validator;

pub use choice_designer::ChoiceDesignerPolicy;
pub use narrator::NarratorPolicy;
pub use quest_designer::QuestDesignerPolicy;
pub use validator::ValidatorPolicy;

/// The question put to agents during a voting round.
#[derive(Debug, Clone)]
pub struct VotePrompt {
    pub question: String,
    pub options: Vec<String>,
    /// Current team posture, so stances can be state-aware without touching
    /// game state directly.
    pub posture: ThreatPosture,
}

/// A role-specific policy sharing the common loop contract.
#[async_trait]
pub trait RolePolicy: Send + Sync {
    /// Stable role label for logs.
    fn role(&self) -> &'static str;

    /// Decide what to do this cycle. Must be side-effect-free with respect
    /// to the bus: the returned action is executed by the agent, never here.
    fn decide(
        &self,
        profile: &AgentProfile,
        memory: &[Message],
        ctx: &TurnContext<'_>,
    ) -> AgentAction;

    /// Rules-engine-backed validation. Only the validator implements this.
    fn validate(&self, _ctx: &TurnContext<'_>) -> Option<ValidationReport> {
        None
    }

    /// Privately compute a ballot for a voting round. `None` means the agent
    /// abstains; the tally simply proceeds without it.
    async fn cast_vote(&self, profile: &AgentProfile, prompt: &VotePrompt) -> Option<Vote> {
        let middle = prompt.options.get(prompt.options.len() / 2)?;
        Some(Vote::new(
            profile.name.clone(),
            middle.clone(),
            0.5,
            profile.voting_weight,
            "no strong preference",
        ))
    }

    /// Take a stance in a negotiation round. The default converges: back
    /// your own proposal in the opening round, then rally behind the first
    /// proposal on the table.
    fn take_position(
        &self,
        profile: &AgentProfile,
        proposals: &[Proposal],
        round: u32,
    ) -> Position {
        let supports = if round <= 1 {
            proposals
                .iter()
                .find(|p| p.author == profile.name)
                .or_else(|| proposals.first())
        } else {
            proposals.first()
        };
        Position {
            participant: profile.name.clone(),
            supports: supports.map(|p| p.author.clone()).unwrap_or_default(),
            revised: None,
        }
    }
}

/// Expertise tags shared by every standard agent so protocol broadcasts
/// reach the whole table.
const PROTOCOL_TAGS: [&str; 2] = ["vote", "negotiation"];

fn with_protocol_tags(tags: &[&str]) -> Vec<String> {
    tags.iter()
        .chain(PROTOCOL_TAGS.iter())
        .map(|s| s.to_string())
        .collect()
}

/// The quest/event designer agent.
pub fn quest_designer() -> Agent {
    let mut profile = AgentProfile::new("quest_designer", "quest framing and event design")
        .with_can_initiate(true);
    profile.expertise = with_protocol_tags(&["quest", "event"]);
    Agent::new(profile, Box::new(QuestDesignerPolicy))
}

/// The choice/option designer agent.
pub fn choice_designer() -> Agent {
    let mut profile = AgentProfile::new("choice_designer", "player option design");
    profile.expertise = with_protocol_tags(&["event", "choices"]);
    Agent::new(profile, Box::new(ChoiceDesignerPolicy))
}

/// The validator agent.
pub fn validator() -> Agent {
    let mut profile = AgentProfile::new("validator", "mechanical validation");
    profile.expertise = with_protocol_tags(&["quest", "event", "rules"]);
    Agent::new(profile, Box::new(ValidatorPolicy))
}

/// The narrator agent.
pub fn narrator() -> Agent {
    let mut profile = AgentProfile::new("narrator", "scene and outcome narration");
    profile.expertise = with_protocol_tags(&["event", "narration"]);
    Agent::new(profile, Box::new(NarratorPolicy))
}

/// The standard four-agent table.
pub fn standard_agents() -> Vec<Agent> {
    vec![quest_designer(), choice_designer(), validator(), narrator()]
}
