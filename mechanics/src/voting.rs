//! Weighted voting protocol math.
//!
//! The orchestrator collects ballots; this module only tallies. The winner is
//! the option with the highest sum of confidence × weight. Consensus is
//! declared when the winning option's weight share strictly exceeds 70% of
//! the weight of *received* votes — late or silent agents are excluded from
//! the denominator once the collection deadline fires, so a partial round can
//! still reach consensus.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Consensus threshold over received weight.
pub const CONSENSUS_THRESHOLD: f64 = 0.70;

/// Error type for tally operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VotingError {
    #[error("No votes received")]
    NoVotes,
}

/// Result type for tally operations.
pub type TallyResult<T> = Result<T, VotingError>;

/// One agent's ballot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub agent_name: String,
    pub choice: String,
    /// Confidence in `[0, 1]`; clamped at construction.
    pub confidence: f64,
    pub weight: f64,
    pub reasoning: String,
}

impl Vote {
    /// Create a ballot, clamping confidence into the unit interval.
    pub fn new(
        agent_name: impl Into<String>,
        choice: impl Into<String>,
        confidence: f64,
        weight: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            choice: choice.into(),
            confidence: confidence.clamp(0.0, 1.0),
            weight,
            reasoning: reasoning.into(),
        }
    }
}

/// Derived outcome of a tally. Never stored — recompute from the ballots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingResult {
    pub winner: String,
    pub consensus: bool,
    /// Total confidence × weight across all received ballots.
    pub total_confidence: f64,
}

/// Tally received ballots.
///
/// Score ties break deterministically toward the lexicographically smaller
/// choice so replays agree.
pub fn tally(votes: &[Vote]) -> TallyResult<VotingResult> {
    if votes.is_empty() {
        return Err(VotingError::NoVotes);
    }

    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut weights: HashMap<&str, f64> = HashMap::new();
    let mut total_weight = 0.0;
    let mut total_confidence = 0.0;

    for vote in votes {
        let contribution = vote.confidence * vote.weight;
        *scores.entry(vote.choice.as_str()).or_insert(0.0) += contribution;
        *weights.entry(vote.choice.as_str()).or_insert(0.0) += vote.weight;
        total_weight += vote.weight;
        total_confidence += contribution;
    }

    let winner = scores
        .iter()
        .max_by(|a, b| {
            a.1.partial_cmp(b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Reverse the name ordering so the smaller choice wins ties.
                .then_with(|| b.0.cmp(a.0))
        })
        .map(|(choice, _)| choice.to_string())
        .unwrap_or_default();

    let winner_weight = weights.get(winner.as_str()).copied().unwrap_or(0.0);
    let consensus = total_weight > 0.0 && winner_weight > CONSENSUS_THRESHOLD * total_weight;

    debug!(
        %winner,
        consensus,
        ballots = votes.len(),
        winner_weight,
        total_weight,
        "Tally complete"
    );

    Ok(VotingResult {
        winner,
        consensus,
        total_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(agent: &str, choice: &str, confidence: f64, weight: f64) -> Vote {
        Vote::new(agent, choice, confidence, weight, "because")
    }

    #[test]
    fn test_winner_by_weighted_confidence() {
        let votes = vec![
            vote("a", "fight", 0.9, 1.0),
            vote("b", "flee", 0.4, 1.0),
            vote("c", "flee", 0.3, 1.0),
        ];
        let result = tally(&votes).unwrap();
        assert_eq!(result.winner, "fight");
        assert!((result.total_confidence - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_two_of_three_is_not_consensus() {
        // 2/3 of equal weight = 66.7%, below the strict 70% threshold.
        let votes = vec![
            vote("a", "x", 0.8, 1.0),
            vote("b", "x", 0.8, 1.0),
            vote("c", "y", 0.8, 1.0),
        ];
        let result = tally(&votes).unwrap();
        assert_eq!(result.winner, "x");
        assert!(!result.consensus);
    }

    #[test]
    fn test_unanimous_is_consensus() {
        let votes = vec![
            vote("a", "x", 0.5, 1.0),
            vote("b", "x", 0.6, 1.0),
            vote("c", "x", 0.7, 1.0),
        ];
        assert!(tally(&votes).unwrap().consensus);
    }

    #[test]
    fn test_consensus_ignores_silent_agents() {
        // Only two of an orchestration's agents responded; the denominator is
        // what arrived, so 2/2 declares consensus on the smaller pool.
        let votes = vec![vote("a", "x", 0.9, 1.0), vote("b", "x", 0.8, 1.0)];
        assert!(tally(&votes).unwrap().consensus);
    }

    #[test]
    fn test_weight_shifts_winner() {
        let votes = vec![
            vote("lead", "x", 0.6, 3.0), // 1.8
            vote("a", "y", 0.8, 1.0),    // 0.8
            vote("b", "y", 0.8, 1.0),    // 1.6
        ];
        let result = tally(&votes).unwrap();
        assert_eq!(result.winner, "x");
        // 3.0 of 5.0 weight = 60%: no consensus despite winning.
        assert!(!result.consensus);
    }

    #[test]
    fn test_tie_breaks_lexicographically() {
        let votes = vec![vote("a", "beta", 0.5, 1.0), vote("b", "alpha", 0.5, 1.0)];
        assert_eq!(tally(&votes).unwrap().winner, "alpha");
    }

    #[test]
    fn test_empty_ballots_error() {
        assert!(matches!(tally(&[]), Err(VotingError::NoVotes)));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let v = Vote::new("a", "x", 1.7, 1.0, "sure");
        assert_eq!(v.confidence, 1.0);
        let v = Vote::new("a", "x", -0.2, 1.0, "unsure");
        assert_eq!(v.confidence, 0.0);
    }
}
