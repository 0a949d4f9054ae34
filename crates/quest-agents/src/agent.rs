//! Agent abstraction: a perception → reason → act loop around a role policy.
//!
//! Each invocation walks the lifecycle `Idle → Perceiving → Reasoning →
//! Acting → Idle`; transitions are guarded and logged so a misbehaving driver
//! is caught instead of silently skipping a phase. Agents hold a bounded
//! rolling memory of received messages — they are never the system of record
//! for game state.

use std::fmt;
use std::time::Instant;

use tracing::debug;

use quest_mechanics::records::{ChoiceSet, EventCard, OutcomeBundle, QuestCard, SchemaError};
use quest_mechanics::recovery::{recover_json, RecoveryError};
use quest_mechanics::voting::Vote;
use quest_mechanics::{Message, Payload};

use crate::context::TurnContext;
use crate::reasoning::{ReasoningError, ReasoningService};
use crate::roles::RolePolicy;

/// Default bound on an agent's rolling memory.
const DEFAULT_MEMORY_CAPACITY: usize = 32;

/// The lifecycle states of one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Idle,
    Perceiving,
    Reasoning,
    Acting,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Perceiving => write!(f, "Perceiving"),
            Self::Reasoning => write!(f, "Reasoning"),
            Self::Acting => write!(f, "Acting"),
        }
    }
}

/// The lifecycle is a strict cycle; anything else is a driver bug.
fn is_legal_transition(from: LifecycleState, to: LifecycleState) -> bool {
    use LifecycleState::*;
    matches!(
        (from, to),
        (Idle, Perceiving) | (Perceiving, Reasoning) | (Reasoning, Acting) | (Acting, Idle)
    )
}

/// Error returned when a driver attempts an illegal lifecycle transition.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal lifecycle transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// One recorded lifecycle transition.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub elapsed_ms: u64,
}

/// Error type for agent cycles.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Lifecycle(#[from] IllegalTransition),

    #[error("Reasoning call failed: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("Output recovery failed: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Recovered record failed validation: {0}")]
    Schema(#[from] SchemaError),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Static description of an agent.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    /// Unique name; the bus routing key.
    pub name: String,
    /// Free-text domain description.
    pub role: String,
    /// Topic tags used for broadcast relevance filtering.
    pub expertise: Vec<String>,
    /// Weight of this agent's ballots.
    pub voting_weight: f64,
    /// Whether the agent may open a conversation unprompted.
    pub can_initiate: bool,
    /// Bound on the rolling message memory.
    pub memory_capacity: usize,
}

impl AgentProfile {
    /// Create a profile with default weight and memory bounds.
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            expertise: Vec::new(),
            voting_weight: 1.0,
            can_initiate: false,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }

    pub fn with_expertise(mut self, expertise: &[&str]) -> Self {
        self.expertise = expertise.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_voting_weight(mut self, weight: f64) -> Self {
        self.voting_weight = weight;
        self
    }

    pub fn with_can_initiate(mut self, can_initiate: bool) -> Self {
        self.can_initiate = can_initiate;
        self
    }

    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity.max(1);
        self
    }
}

/// What a reasoning step decided to do.
#[derive(Debug, Clone)]
pub enum AgentAction {
    /// Call the reasoning service and recover a record of the given shape.
    Generate {
        prompt: String,
        expect: ExpectedRecord,
    },
    /// Run rules-engine-backed validation over the turn context.
    Validate,
    /// Emit a ballot.
    Vote {
        choice: String,
        confidence: f64,
        reasoning: String,
    },
    /// Emit a pre-built bus message.
    Emit { message: Message },
    /// Nothing to do this round.
    Wait,
}

/// The record shape a `Generate` action expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedRecord {
    Quest,
    Event,
    Choices,
    Outcome,
}

/// Everything an `act` step may touch outside the agent itself.
pub struct AgentDeps<'a> {
    pub reasoning: &'a dyn ReasoningService,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// The result of one full agent cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    /// Structured artifact produced this cycle, if any.
    pub artifact: Option<Payload>,
    /// Messages to publish once the round completes.
    pub messages: Vec<Message>,
    /// Set when the cycle determined that later pipeline stages are moot.
    pub stop_pipeline: bool,
}

/// A named, typed worker: profile + policy + bounded memory.
pub struct Agent {
    pub profile: AgentProfile,
    policy: Box<dyn RolePolicy>,
    memory: Vec<Message>,
    state: LifecycleState,
    transitions: Vec<TransitionRecord>,
    created_at: Instant,
}

impl Agent {
    /// Construct an agent from a profile and a role policy.
    pub fn new(profile: AgentProfile, policy: Box<dyn RolePolicy>) -> Self {
        Self {
            profile,
            policy,
            memory: Vec::new(),
            state: LifecycleState::Idle,
            transitions: Vec::new(),
            created_at: Instant::now(),
        }
    }

    /// The agent's routing name.
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// The role policy, for protocol steps (votes, negotiation positions)
    /// that run outside the perceive/reason/act cycle.
    pub fn policy(&self) -> &dyn RolePolicy {
        self.policy.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The rolling message memory, oldest first.
    pub fn memory(&self) -> &[Message] {
        &self.memory
    }

    /// The lifecycle transition log.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    fn advance(&mut self, to: LifecycleState) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.state, to) {
            return Err(IllegalTransition {
                from: self.state,
                to,
            });
        }
        self.transitions.push(TransitionRecord {
            from: self.state,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
        });
        debug!(agent = %self.profile.name, from = %self.state, to = %to, "Lifecycle transition");
        self.state = to;
        Ok(())
    }

    /// Merge newly addressed messages into memory, deduplicating by id and
    /// evicting oldest-first beyond capacity.
    fn perceive(&mut self, inbox: Vec<Message>) {
        for message in inbox {
            if self.memory.iter().any(|m| m.id == message.id) {
                continue;
            }
            self.memory.push(message);
        }
        let capacity = self.profile.memory_capacity;
        if self.memory.len() > capacity {
            let excess = self.memory.len() - capacity;
            self.memory.drain(..excess);
        }
    }

    /// Role-specific decision. Side-effect-free with respect to the bus: it
    /// only decides, it never sends.
    fn reason(&self, ctx: &TurnContext<'_>) -> AgentAction {
        self.policy.decide(&self.profile, &self.memory, ctx)
    }

    /// Execute a decision.
    async fn act(
        &mut self,
        action: AgentAction,
        ctx: &TurnContext<'_>,
        deps: &AgentDeps<'_>,
    ) -> AgentResult<CycleOutcome> {
        match action {
            AgentAction::Generate { prompt, expect } => {
                let raw = deps
                    .reasoning
                    .complete(&prompt, deps.max_tokens, deps.temperature)
                    .await?;
                let value = recover_json(&raw)?;
                let artifact = match expect {
                    ExpectedRecord::Quest => Payload::QuestDraft(QuestCard::from_recovered(value)?),
                    ExpectedRecord::Event => Payload::EventDraft(EventCard::from_recovered(value)?),
                    ExpectedRecord::Choices => {
                        let set = ChoiceSet::from_recovered(value)?;
                        Payload::ChoiceSet {
                            choices: set.choices,
                        }
                    }
                    ExpectedRecord::Outcome => {
                        Payload::Narration(OutcomeBundle::from_recovered(value)?)
                    }
                };
                debug!(agent = %self.profile.name, artifact = artifact.label(), "Generated");
                Ok(CycleOutcome {
                    artifact: Some(artifact),
                    ..Default::default()
                })
            }
            AgentAction::Validate => {
                let report = self.policy.validate(ctx);
                let stop_pipeline = report.as_ref().is_some_and(|r| !r.valid);
                Ok(CycleOutcome {
                    artifact: report.map(Payload::Validation),
                    stop_pipeline,
                    ..Default::default()
                })
            }
            AgentAction::Vote {
                choice,
                confidence,
                reasoning,
            } => {
                let ballot = Vote::new(
                    self.profile.name.clone(),
                    choice,
                    confidence,
                    self.profile.voting_weight,
                    reasoning,
                );
                let message = Message::vote(self.profile.name.clone(), "vote", ballot.clone());
                Ok(CycleOutcome {
                    artifact: Some(Payload::Ballot(ballot)),
                    messages: vec![message],
                    ..Default::default()
                })
            }
            AgentAction::Emit { message } => Ok(CycleOutcome {
                messages: vec![message],
                ..Default::default()
            }),
            AgentAction::Wait => Ok(CycleOutcome::default()),
        }
    }

    /// One full perceive → reason → act cycle.
    pub async fn run_cycle(
        &mut self,
        inbox: Vec<Message>,
        ctx: &TurnContext<'_>,
        deps: &AgentDeps<'_>,
    ) -> AgentResult<CycleOutcome> {
        self.advance(LifecycleState::Perceiving)?;
        self.perceive(inbox);
        self.advance(LifecycleState::Reasoning)?;
        let action = self.reason(ctx);
        self.advance(LifecycleState::Acting)?;
        let result = self.act(action, ctx, deps).await;
        // The agent returns to Idle even when the act failed, so the session
        // can continue with its other agents.
        self.advance(LifecycleState::Idle)?;
        result
    }
}
