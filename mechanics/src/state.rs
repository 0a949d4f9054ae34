//! Caller-held session state.
//!
//! Sessions are ephemeral values: state enters every orchestration call by
//! value and leaves as a new derived value. Nothing here is a system of
//! record — the rules engine's pure functions are the only legal mutators,
//! and they return fresh values instead of mutating in place.

use serde::{Deserialize, Serialize};

use crate::rules::{Difficulty, SeededRng};

/// One member of the player's team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub name: String,
    /// External species id, used only for prompt flavor lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species_id: Option<u32>,
    pub max_health: f64,
    pub current_health: f64,
    /// Elemental type labels; parsed into `TypeId` at the point of use.
    pub types: Vec<String>,
}

impl Combatant {
    /// Create a combatant at full health.
    pub fn new(name: impl Into<String>, max_health: f64, types: Vec<String>) -> Self {
        Self {
            name: name.into(),
            species_id: None,
            max_health,
            current_health: max_health,
            types,
        }
    }

    /// Set the current health, clamped to `[0, max_health]`.
    pub fn with_current_health(mut self, health: f64) -> Self {
        self.current_health = health.clamp(0.0, self.max_health);
        self
    }

    /// Attach an external species id.
    pub fn with_species(mut self, id: u32) -> Self {
        self.species_id = Some(id);
        self
    }

    /// Whether this combatant is out of the fight.
    pub fn is_fainted(&self) -> bool {
        self.current_health <= 0.0
    }

    /// Remaining health as a fraction of the maximum.
    pub fn health_fraction(&self) -> f64 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            self.current_health / self.max_health
        }
    }
}

/// The quest framing a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub title: String,
    pub objective: String,
    pub difficulty: Difficulty,
    pub target_step_count: u32,
}

/// One session's complete game state. Passed by value into every
/// orchestration call; the orchestration layer reads and validates it but
/// never silently mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub team: Vec<Combatant>,
    pub current_step: u32,
    pub cumulative_score: i64,
    pub seed: u64,
    pub quest: Quest,
}

impl GameState {
    /// Start-of-session state.
    pub fn new(team: Vec<Combatant>, seed: u64, quest: Quest) -> Self {
        Self {
            team,
            current_step: 0,
            cumulative_score: 0,
            seed,
            quest,
        }
    }

    /// Whether every team member has fainted.
    pub fn team_defeated(&self) -> bool {
        self.team.iter().all(Combatant::is_fainted)
    }

    /// Whether the session has reached a terminal condition.
    pub fn is_over(&self) -> bool {
        self.team_defeated() || self.current_step >= self.quest.target_step_count
    }

    /// The seed for the next turn: the generator state after one step of the
    /// recurrence, so consecutive turns draw from disjoint positions of the
    /// same deterministic stream.
    pub fn next_seed(&self) -> u64 {
        let mut rng = SeededRng::new(self.seed);
        rng.next_f64();
        rng.state()
    }
}
