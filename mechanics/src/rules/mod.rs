//! Deterministic rules engine: battle, capture, and damage resolution.
//!
//! Every function here is pure and takes an explicit seed; identical inputs
//! always produce identical outputs. This is the system's reproducibility
//! guarantee — mechanical outcomes are trusted even though narrative text is
//! not. The engine assumes pre-validated game inputs (a fainted combatant is
//! never a legal target; enforcing that is the validator role's job) and only
//! errors on malformed numerics.

use serde::{Deserialize, Serialize};

use crate::state::Combatant;

pub mod rng;
pub mod typing;

pub use rng::SeededRng;
pub use typing::{type_effectiveness, TypeId};

/// Error type for rules-engine operations. Game-logic violations are not
/// representable here on purpose: callers validate before invoking.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RulesError {
    #[error("Malformed numeric input for {field}: {value}")]
    MalformedInput { field: &'static str, value: f64 },
}

/// Result type for rules-engine operations.
pub type RulesResult<T> = Result<T, RulesError>;

/// How much risk a choice carries. Affects hit chance, damage, and capture
/// odds through fixed multiplier tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Moderate,
    Risky,
}

impl RiskLevel {
    /// Multiplier applied to the computed hit chance.
    pub fn hit_multiplier(self) -> f64 {
        match self {
            Self::Safe => 0.9,
            Self::Moderate => 0.75,
            Self::Risky => 0.55,
        }
    }

    /// Multiplier applied to raw damage.
    pub fn damage_multiplier(self) -> f64 {
        match self {
            Self::Safe => 0.75,
            Self::Moderate => 1.05,
            Self::Risky => 1.5,
        }
    }

    /// Multiplier applied to the base capture chance.
    pub fn capture_multiplier(self) -> f64 {
        match self {
            Self::Safe => 0.25,
            Self::Moderate => 0.45,
            Self::Risky => 0.70,
        }
    }

    /// Position in the canonical safe → moderate → risky ordering.
    pub fn index(self) -> usize {
        match self {
            Self::Safe => 0,
            Self::Moderate => 1,
            Self::Risky => 2,
        }
    }

    /// Parse a generated risk label. Labels are matched case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "safe" | "low" => Some(Self::Safe),
            "moderate" | "medium" => Some(Self::Moderate),
            "risky" | "high" => Some(Self::Risky),
            _ => None,
        }
    }

    /// Parse a generated risk label, falling back to the documented
    /// positional default mapping when the label is out of range.
    pub fn from_label_or_position(label: &str, position: usize) -> Self {
        Self::from_label(label).unwrap_or_else(|| match position % 3 {
            0 => Self::Safe,
            1 => Self::Moderate,
            _ => Self::Risky,
        })
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Moderate => write!(f, "moderate"),
            Self::Risky => write!(f, "risky"),
        }
    }
}

/// Quest difficulty. Scales damage output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Multiplier applied to raw damage.
    pub fn damage_multiplier(self) -> f64 {
        match self {
            Self::Easy => 0.9,
            Self::Normal => 1.15,
            Self::Hard => 1.45,
        }
    }

    /// Parse a generated difficulty label; unknown labels map to `Normal`,
    /// the documented default.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Normal,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Normal => write!(f, "normal"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// Outcome of a battle resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    /// Whether the attack connected.
    pub success: bool,
    /// Damage dealt to the target, rounded to a whole number. Zero on a miss.
    pub damage_dealt: f64,
    /// Score awarded for the turn.
    pub score_delta: i64,
}

/// Outcome of a capture attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOutcome {
    /// Whether the target was captured.
    pub success: bool,
    /// Score awarded for the attempt.
    pub score_delta: i64,
}

/// Score awarded for a missed attack. A participation floor so a whiffed
/// risky play still moves the session score.
const MISS_SCORE: i64 = 5;

fn check_power(field: &'static str, value: f64) -> RulesResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(RulesError::MalformedInput { field, value });
    }
    Ok(value)
}

/// The shared success roll: one seeded draw decided against `chance`.
///
/// Succeeds when the draw lands in the upper `chance`-sized region of the
/// unit interval, so a chance of 1.0 always hits and 0.0 never does.
fn seeded_success(rng: &mut SeededRng, chance: f64) -> bool {
    rng.next_f64() >= 1.0 - chance
}

/// Resolve a battle action.
///
/// Hit chance is `clamp(0.75 + 0.05 * (player - enemy), 0.1, 1.0)` scaled by
/// the risk hit multiplier. Damage is `(20 + 1.8 * player)` scaled by the
/// risk and difficulty damage multipliers and a seeded variance in
/// `[0.8, 1.2]`. The hit draw is consumed first, the variance draw second;
/// both are always consumed so the stream position is input-independent.
pub fn compute_battle(
    player_power: f64,
    enemy_power: f64,
    risk: RiskLevel,
    seed: u64,
    difficulty: Difficulty,
) -> RulesResult<BattleOutcome> {
    let player_power = check_power("player_power", player_power)?;
    let enemy_power = check_power("enemy_power", enemy_power)?;

    let hit_chance =
        (0.75 + 0.05 * (player_power - enemy_power)).clamp(0.1, 1.0) * risk.hit_multiplier();

    let mut rng = SeededRng::new(seed);
    let success = seeded_success(&mut rng, hit_chance);
    let variance = 0.8 + rng.next_f64() * 0.4;

    let raw_damage = (20.0 + 1.8 * player_power)
        * risk.damage_multiplier()
        * difficulty.damage_multiplier()
        * variance;
    let damage_dealt = if success { raw_damage.round() } else { 0.0 };

    let score_delta = if success {
        (damage_dealt * 0.75).round() as i64
    } else {
        MISS_SCORE
    };

    tracing::debug!(
        player_power,
        enemy_power,
        risk = %risk,
        difficulty = %difficulty,
        hit_chance,
        success,
        damage_dealt,
        "Battle resolved"
    );

    Ok(BattleOutcome {
        success,
        damage_dealt,
        score_delta,
    })
}

/// Resolve a capture attempt.
///
/// Base chance is `0.45 - 0.02 * target + 0.01 * actor`, scaled by the risk
/// capture multiplier and clamped to `[0.05, 1.0]`. One seeded draw decides.
pub fn compute_capture(
    target_power: f64,
    actor_power: f64,
    risk: RiskLevel,
    seed: u64,
) -> RulesResult<CaptureOutcome> {
    let target_power = check_power("target_power", target_power)?;
    let actor_power = check_power("actor_power", actor_power)?;

    let chance = ((0.45 - 0.02 * target_power + 0.01 * actor_power) * risk.capture_multiplier())
        .clamp(0.05, 1.0);

    let mut rng = SeededRng::new(seed);
    let success = seeded_success(&mut rng, chance);

    let score_delta = if success {
        (30.0 * (1.0 + risk.index() as f64 * 0.5)).round() as i64
    } else {
        0
    };

    tracing::debug!(
        target_power,
        actor_power,
        risk = %risk,
        chance,
        success,
        "Capture resolved"
    );

    Ok(CaptureOutcome {
        success,
        score_delta,
    })
}

/// Apply damage to a combatant, returning the updated value. Health floors
/// at zero; the input is untouched.
pub fn apply_damage(combatant: &Combatant, amount: f64) -> RulesResult<Combatant> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(RulesError::MalformedInput {
            field: "amount",
            value: amount,
        });
    }

    let mut updated = combatant.clone();
    updated.current_health = (combatant.current_health - amount).max(0.0);
    Ok(updated)
}
