//! Deterministic core of the narrative quest swarm.
//!
//! This crate holds everything the orchestration layer must be able to trust
//! without trusting the reasoning workers:
//!
//! - a pure, seeded rules engine for battle/capture/damage resolution and
//!   type effectiveness;
//! - a staged structured-output recovery parser for malformed generated text;
//! - the fixed record schemas exchanged across the reasoning boundary;
//! - message types, the routing bus, and a passive interaction log;
//! - the voting and negotiation protocol math.
//!
//! Nothing here calls the reasoning service; the agent layer lives in the
//! `quest-agents` crate and builds on these primitives.

pub mod analysis;
pub mod bus;
pub mod negotiation;
pub mod records;
pub mod recovery;
pub mod rules;
pub mod state;
pub mod voting;

pub use bus::{BusError, InteractionLog, Message, MessageBus, MessageKind, Payload, Priority, Recipient};
pub use negotiation::{NegotiationOutcome, Position, Proposal};
pub use records::{
    ActionKind, ChoiceCard, ChoiceSet, EventCard, OutcomeBundle, QuestCard, SchemaError,
    ValidationReport,
};
pub use recovery::{recover_json, RecoveryError};
pub use rules::{
    apply_damage, compute_battle, compute_capture, type_effectiveness, BattleOutcome,
    CaptureOutcome, Difficulty, RiskLevel, RulesError, SeededRng, TypeId,
};
pub use state::{Combatant, GameState, Quest};
pub use voting::{tally, Vote, VotingError, VotingResult};
