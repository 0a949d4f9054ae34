//! Team-status heuristics shared by prompt construction and validation.
//!
//! These are read-only summaries of caller-held state; nothing here feeds
//! back into mechanical outcomes except through the validator's explicit
//! checks.

use serde::{Deserialize, Serialize};

use crate::state::Combatant;

/// Health per point of power: a 100-HP combatant contributes power 5.
const HEALTH_PER_POWER: f64 = 20.0;

/// Power contributed by a single combatant, derived from max health.
pub fn member_power(combatant: &Combatant) -> f64 {
    combatant.max_health / HEALTH_PER_POWER
}

/// Mean power across active (non-fainted) members; zero for a wiped team.
pub fn team_power(team: &[Combatant]) -> f64 {
    let active: Vec<&Combatant> = team.iter().filter(|c| !c.is_fainted()).collect();
    if active.is_empty() {
        return 0.0;
    }
    active.iter().map(|c| member_power(c)).sum::<f64>() / active.len() as f64
}

/// Coarse stance the team can afford, used to steer prompt tone and choice
/// risk suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatPosture {
    Confident,
    Cautious,
    Desperate,
}

impl std::fmt::Display for ThreatPosture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confident => write!(f, "confident"),
            Self::Cautious => write!(f, "cautious"),
            Self::Desperate => write!(f, "desperate"),
        }
    }
}

/// A snapshot of team condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamStatus {
    pub healthy: usize,
    pub injured: usize,
    pub critical: usize,
    pub fainted: usize,
    pub average_health_fraction: f64,
    /// Active member with the lowest health fraction, if any survive.
    pub weakest_active: Option<String>,
    pub posture: ThreatPosture,
}

impl TeamStatus {
    /// Assess a team. Thresholds: above 70% health is healthy, above 30% is
    /// injured, anything above zero is critical.
    pub fn assess(team: &[Combatant]) -> Self {
        let mut healthy = 0;
        let mut injured = 0;
        let mut critical = 0;
        let mut fainted = 0;
        let mut weakest: Option<(&Combatant, f64)> = None;

        for member in team {
            let fraction = member.health_fraction();
            if member.is_fainted() {
                fainted += 1;
                continue;
            }
            if fraction > 0.7 {
                healthy += 1;
            } else if fraction > 0.3 {
                injured += 1;
            } else {
                critical += 1;
            }
            if weakest.map_or(true, |(_, f)| fraction < f) {
                weakest = Some((member, fraction));
            }
        }

        let active = team.len() - fainted;
        let average_health_fraction = if team.is_empty() {
            0.0
        } else {
            team.iter().map(Combatant::health_fraction).sum::<f64>() / team.len() as f64
        };

        let posture = if active == 0
            || average_health_fraction < 0.3
            || (active == 1 && team.len() > 1)
        {
            ThreatPosture::Desperate
        } else if average_health_fraction >= 0.6 && fainted == 0 {
            ThreatPosture::Confident
        } else {
            ThreatPosture::Cautious
        };

        Self {
            healthy,
            injured,
            critical,
            fainted,
            average_health_fraction,
            weakest_active: weakest.map(|(c, _)| c.name.clone()),
            posture,
        }
    }

    /// One-line digest for prompts and logs.
    pub fn digest(&self) -> String {
        format!(
            "{} healthy, {} injured, {} critical, {} fainted ({:.0}% average health, {})",
            self.healthy,
            self.injured,
            self.critical,
            self.fainted,
            self.average_health_fraction * 100.0,
            self.posture
        )
    }
}
