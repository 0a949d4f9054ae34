//! Voting, negotiation, and parallel-round protocol behavior, driven through
//! the orchestrator with purpose-built policies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use quest_agents::agent::{Agent, AgentAction, AgentProfile};
use quest_agents::context::{TurnContext, TurnRequest};
use quest_agents::orchestrator::{Orchestrator, SceneInput};
use quest_agents::reasoning::{ReasoningError, ReasoningResult, ReasoningService};
use quest_agents::roles::{RolePolicy, VotePrompt};
use quest_mechanics::analysis::ThreatPosture;
use quest_mechanics::negotiation::{Position, Proposal};
use quest_mechanics::state::Combatant;
use quest_mechanics::voting::Vote;
use quest_mechanics::{Message, Payload};

/// No test here should ever reach the reasoning service.
struct UnreachableReasoning;

#[async_trait]
impl ReasoningService for UnreachableReasoning {
    async fn complete(&self, _: &str, _: u32, _: f64) -> ReasoningResult<String> {
        Err(ReasoningError::RequestFailed(
            "protocol tests must not call the reasoning service".into(),
        ))
    }
}

/// Always votes for a fixed choice.
struct FixedVotePolicy {
    choice: &'static str,
    confidence: f64,
}

#[async_trait]
impl RolePolicy for FixedVotePolicy {
    fn role(&self) -> &'static str {
        "fixed_voter"
    }

    fn decide(&self, _: &AgentProfile, _: &[Message], _: &TurnContext<'_>) -> AgentAction {
        AgentAction::Wait
    }

    async fn cast_vote(&self, profile: &AgentProfile, _: &VotePrompt) -> Option<Vote> {
        Some(Vote::new(
            profile.name.clone(),
            self.choice,
            self.confidence,
            profile.voting_weight,
            "fixed",
        ))
    }
}

/// Never answers inside any reasonable deadline.
struct SleepyVotePolicy;

#[async_trait]
impl RolePolicy for SleepyVotePolicy {
    fn role(&self) -> &'static str {
        "sleepy_voter"
    }

    fn decide(&self, _: &AgentProfile, _: &[Message], _: &TurnContext<'_>) -> AgentAction {
        AgentAction::Wait
    }

    async fn cast_vote(&self, profile: &AgentProfile, _: &VotePrompt) -> Option<Vote> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Some(Vote::new(profile.name.clone(), "late", 1.0, 1.0, "overslept"))
    }
}

/// Refuses to back anyone but itself, every round.
struct StubbornPolicy;

#[async_trait]
impl RolePolicy for StubbornPolicy {
    fn role(&self) -> &'static str {
        "stubborn"
    }

    fn decide(&self, _: &AgentProfile, _: &[Message], _: &TurnContext<'_>) -> AgentAction {
        AgentAction::Wait
    }

    fn take_position(&self, profile: &AgentProfile, _: &[Proposal], _: u32) -> Position {
        Position {
            participant: profile.name.clone(),
            supports: profile.name.clone(),
            revised: None,
        }
    }
}

/// Uses the trait's default converging stance.
struct AgreeablePolicy;

#[async_trait]
impl RolePolicy for AgreeablePolicy {
    fn role(&self) -> &'static str {
        "agreeable"
    }

    fn decide(&self, _: &AgentProfile, _: &[Message], _: &TurnContext<'_>) -> AgentAction {
        AgentAction::Wait
    }
}

/// Sends one direct message to a peer on its first cycle, then waits.
struct EmitOncePolicy {
    peer: &'static str,
    sent: AtomicBool,
}

#[async_trait]
impl RolePolicy for EmitOncePolicy {
    fn role(&self) -> &'static str {
        "emitter"
    }

    fn decide(
        &self,
        profile: &AgentProfile,
        _: &[Message],
        _: &TurnContext<'_>,
    ) -> AgentAction {
        if self.sent.swap(true, Ordering::SeqCst) {
            return AgentAction::Wait;
        }
        AgentAction::Emit {
            message: Message::request(
                profile.name.clone(),
                self.peer,
                "round",
                Payload::Note {
                    text: format!("hello from {}", profile.name),
                },
            ),
        }
    }
}

fn agent(name: &str, policy: Box<dyn RolePolicy>) -> Agent {
    let mut profile = AgentProfile::new(name, "test");
    profile.expertise = vec!["vote".into(), "negotiation".into(), "round".into()];
    Agent::new(profile, policy)
}

fn orchestrator(agents: Vec<Agent>) -> Orchestrator {
    let mut orchestrator = Orchestrator::new(Arc::new(UnreachableReasoning));
    for a in agents {
        orchestrator.register(a).unwrap();
    }
    orchestrator
}

fn prompt() -> VotePrompt {
    VotePrompt {
        question: "Which route?".into(),
        options: vec!["ford".into(), "cliff".into()],
        posture: ThreatPosture::Cautious,
    }
}

#[tokio::test]
async fn test_two_of_three_votes_is_not_consensus() {
    let mut orch = orchestrator(vec![
        agent("a", Box::new(FixedVotePolicy { choice: "x", confidence: 0.8 })),
        agent("b", Box::new(FixedVotePolicy { choice: "x", confidence: 0.8 })),
        agent("c", Box::new(FixedVotePolicy { choice: "y", confidence: 0.8 })),
    ]);

    let round = orch.run_vote(prompt(), Duration::from_secs(5)).await.unwrap();
    assert_eq!(round.result.winner, "x");
    // 2/3 of equal weight is 66.7%: below the 70% bar.
    assert!(!round.result.consensus);
    assert!(!round.timed_out);
    assert_eq!(round.ballots.len(), 3);
}

#[tokio::test]
async fn test_unanimous_vote_is_consensus() {
    let mut orch = orchestrator(vec![
        agent("a", Box::new(FixedVotePolicy { choice: "x", confidence: 0.6 })),
        agent("b", Box::new(FixedVotePolicy { choice: "x", confidence: 0.7 })),
        agent("c", Box::new(FixedVotePolicy { choice: "x", confidence: 0.8 })),
    ]);

    let round = orch.run_vote(prompt(), Duration::from_secs(5)).await.unwrap();
    assert!(round.result.consensus);
}

#[tokio::test(start_paused = true)]
async fn test_vote_deadline_produces_partial_tally() {
    let mut orch = orchestrator(vec![
        agent("a", Box::new(FixedVotePolicy { choice: "x", confidence: 0.9 })),
        agent("b", Box::new(FixedVotePolicy { choice: "x", confidence: 0.9 })),
        agent("slow", Box::new(SleepyVotePolicy)),
    ]);

    let round = orch
        .run_vote(prompt(), Duration::from_millis(200))
        .await
        .unwrap();

    // The sleeper is excluded from the denominator: 2/2 received weight.
    assert!(round.timed_out);
    assert_eq!(round.ballots.len(), 2);
    assert!(round.result.consensus);
}

#[tokio::test]
async fn test_vote_ballots_land_on_the_bus() {
    let mut orch = orchestrator(vec![
        agent("a", Box::new(FixedVotePolicy { choice: "x", confidence: 0.9 })),
        agent("b", Box::new(FixedVotePolicy { choice: "y", confidence: 0.4 })),
    ]);

    let _ = orch.run_vote(prompt(), Duration::from_secs(5)).await.unwrap();
    let log = orch.bus().log();
    assert_eq!(
        log.of_kind(quest_mechanics::MessageKind::Vote).count(),
        2
    );
}

#[tokio::test]
async fn test_negotiation_converges_with_agreeable_parties() {
    let mut orch = orchestrator(vec![
        agent("a", Box::new(AgreeablePolicy)),
        agent("b", Box::new(AgreeablePolicy)),
        agent("c", Box::new(AgreeablePolicy)),
    ]);

    let initial = vec![
        Proposal::new("a", "cross at the ford"),
        Proposal::new("b", "wait for nightfall"),
        Proposal::new("c", "scale the cliff"),
    ];
    let outcome = orch.run_negotiation(initial, 5).await.unwrap();

    assert!(outcome.agreed);
    assert_eq!(outcome.proposal.author, "a");
    assert!(outcome.rounds_used <= 2);
}

#[tokio::test]
async fn test_negotiation_exhaustion_falls_back_to_first_proposal() {
    let mut orch = orchestrator(vec![
        agent("a", Box::new(StubbornPolicy)),
        agent("b", Box::new(StubbornPolicy)),
        agent("c", Box::new(StubbornPolicy)),
    ]);

    let initial = vec![
        Proposal::new("a", "cross at the ford"),
        Proposal::new("b", "wait for nightfall"),
        Proposal::new("c", "scale the cliff"),
    ];
    let outcome = orch.run_negotiation(initial, 4).await.unwrap();

    // Deterministic fallback, never a hang, never a null.
    assert!(!outcome.agreed);
    assert_eq!(outcome.rounds_used, 4);
    assert_eq!(outcome.proposal.content, "cross at the ford");
}

#[tokio::test]
async fn test_negotiation_with_zero_rounds_still_terminates() {
    let mut orch = orchestrator(vec![agent("a", Box::new(StubbornPolicy))]);
    let outcome = orch
        .run_negotiation(vec![Proposal::new("a", "only plan")], 0)
        .await
        .unwrap();
    assert!(!outcome.agreed);
    assert_eq!(outcome.rounds_used, 0);
}

#[tokio::test]
async fn test_parallel_round_isolates_mailboxes() {
    let mut orch = orchestrator(vec![
        agent(
            "alice",
            Box::new(EmitOncePolicy {
                peer: "bob",
                sent: AtomicBool::new(false),
            }),
        ),
        agent(
            "bob",
            Box::new(EmitOncePolicy {
                peer: "alice",
                sent: AtomicBool::new(false),
            }),
        ),
    ]);

    let team = vec![Combatant::new("piko", 100.0, vec![])];
    let scene = SceneInput {
        team: &team,
        quest: None,
        current_step: 0,
        seed: 1,
        request: TurnRequest::ComposeEvent,
        style: "",
        flavor: "",
    };

    let outcomes = orch.run_parallel_round(&scene).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    // Effects were withheld until the round completed: both messages are
    // pending now, so neither agent saw the other's message mid-round.
    assert_eq!(orch.bus().pending("alice"), 1);
    assert_eq!(orch.bus().pending("bob"), 1);

    // The next round drains them.
    let _ = orch.run_parallel_round(&scene).await.unwrap();
    assert_eq!(orch.bus().pending("alice"), 0);
    assert_eq!(orch.bus().pending("bob"), 0);
}
