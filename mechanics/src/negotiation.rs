//! Multi-round negotiation protocol state.
//!
//! Pure round bookkeeping: the orchestrator broadcasts proposals and collects
//! positions; this module evaluates support. Consensus requires at least 70%
//! of participants behind one proposal. Negotiation is bounded by round
//! count, never wall-clock time, and always terminates: an unresolved run
//! falls back to the first proposal with `agreed = false`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fraction of participants that must back one proposal.
pub const AGREEMENT_THRESHOLD: f64 = 0.70;

/// A proposal on the table, keyed by its author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub author: String,
    pub content: String,
}

impl Proposal {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
        }
    }
}

/// One participant's stance in a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub participant: String,
    /// Author of the proposal this participant backs this round.
    pub supports: String,
    /// Replacement for the participant's own proposal, applied after the
    /// round is evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised: Option<String>,
}

/// Evaluation of a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundVerdict {
    /// Author of the most-supported proposal.
    pub leading: String,
    /// Number of participants backing it.
    pub support: usize,
    /// Whether the threshold was met.
    pub consensus: bool,
}

/// Terminal outcome of a negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationOutcome {
    pub agreed: bool,
    pub proposal: Proposal,
    pub rounds_used: u32,
}

/// Evaluate one round of positions against the participant count.
///
/// Support ties break toward the lexicographically smaller author so replays
/// agree. Positions referencing unknown proposals still count as support for
/// that name; the orchestrator filters them if it cares.
pub fn evaluate_round(positions: &[Position], participant_count: usize) -> Option<RoundVerdict> {
    if positions.is_empty() || participant_count == 0 {
        return None;
    }

    let mut support: HashMap<&str, usize> = HashMap::new();
    for position in positions {
        *support.entry(position.supports.as_str()).or_insert(0) += 1;
    }

    let (leading, count) = support
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(author, count)| (author.to_string(), *count))?;

    let consensus = count as f64 >= AGREEMENT_THRESHOLD * participant_count as f64;

    debug!(
        %leading,
        support = count,
        participant_count,
        consensus,
        "Round evaluated"
    );

    Some(RoundVerdict {
        leading,
        support: count,
        consensus,
    })
}

/// Apply revisions collected in a round to the proposal table.
pub fn apply_revisions(proposals: &mut [Proposal], positions: &[Position]) {
    for position in positions {
        if let Some(revised) = &position.revised {
            if let Some(proposal) = proposals
                .iter_mut()
                .find(|p| p.author == position.participant)
            {
                proposal.content = revised.clone();
            }
        }
    }
}

/// The deterministic fallback when rounds are exhausted: the first proposal,
/// not a participant vote.
pub fn fallback_outcome(initial: &[Proposal], rounds_used: u32) -> Option<NegotiationOutcome> {
    initial.first().map(|proposal| NegotiationOutcome {
        agreed: false,
        proposal: proposal.clone(),
        rounds_used,
    })
}
