//! Agent layer of the narrative quest swarm.
//!
//! Wraps the deterministic `quest-mechanics` core with:
//! - the agent abstraction (perceive → reason → act over a role policy);
//! - the four standard roles: quest/event designer, choice designer,
//!   validator, narrator;
//! - a caller-owned orchestrator driving pipelines, parallel rounds,
//!   deadline-bounded voting, and bounded negotiation;
//! - the session command surface (start / advance / resolve / progress);
//! - clients for the external reasoning service and species provider.
//!
//! Everything touching the reasoning service fails loudly; everything
//! touching the rules engine or the bus degrades to documented defaults.

pub mod agent;
pub mod config;
pub mod context;
pub mod orchestrator;
pub mod prompts;
pub mod reasoning;
pub mod roles;
pub mod session;
pub mod species;

pub use agent::{Agent, AgentAction, AgentError, AgentProfile, CycleOutcome, LifecycleState};
pub use config::{AgentsConfig, ReasoningEndpoint, SpeciesEndpoint};
pub use context::{ResolutionFacts, TurnContext, TurnRequest};
pub use orchestrator::{
    Orchestrator, OrchestratorError, PipelineRun, RoundOutcome, SceneInput, VoteRound,
};
pub use reasoning::{HttpReasoningService, ReasoningError, ReasoningService};
pub use roles::{standard_agents, RolePolicy, VotePrompt};
pub use session::{
    ChoiceResolution, EventTurn, GameOverReason, OutcomeRecord, QuestSession, SessionError,
    SessionProgress, TurnDelta,
};
pub use species::{HttpSpeciesProvider, SpeciesInfo, SpeciesProvider};
