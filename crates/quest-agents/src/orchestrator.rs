//! Message-bus orchestrator.
//!
//! A caller-owned, per-session instance — never a global. It owns the agent
//! registry and the bus, and drives the four coordination shapes the game
//! needs: sequential pipelines, fully-parallel rounds, weighted voting with a
//! deadline, and bounded multi-round negotiation.
//!
//! Vote collection is a rendezvous, not a poll: ballots arrive over a
//! future-set raced against a single deadline, and whatever arrived by the
//! deadline is tallied as a partial result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use quest_mechanics::negotiation::{
    apply_revisions, evaluate_round, fallback_outcome, NegotiationOutcome, Proposal,
};
use quest_mechanics::state::{Combatant, Quest};
use quest_mechanics::voting::{tally, Vote, VotingError, VotingResult};
use quest_mechanics::{BusError, Message, MessageBus, Payload, Priority};

use crate::agent::{Agent, AgentDeps, AgentError, AgentResult, CycleOutcome};
use crate::context::{TurnContext, TurnRequest};
use crate::reasoning::ReasoningService;
use crate::roles::VotePrompt;

/// Default generation budget per completion call.
const DEFAULT_MAX_TOKENS: u32 = 900;
/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f64 = 0.8;

/// Error type for orchestration.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Agent {name} failed: {source}")]
    Agent {
        name: String,
        #[source]
        source: AgentError,
    },

    #[error(transparent)]
    Voting(#[from] VotingError),

    #[error("Negotiation requires at least one proposal from a registered agent")]
    NoProposals,
}

/// Result type for orchestration.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// The caller-held scene a pipeline or round runs against.
#[derive(Debug, Clone)]
pub struct SceneInput<'a> {
    pub team: &'a [Combatant],
    pub quest: Option<&'a Quest>,
    pub current_step: u32,
    pub seed: u64,
    pub request: TurnRequest,
    pub style: &'a str,
    pub flavor: &'a str,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    /// Artifacts accumulated across stages, oldest first.
    pub artifacts: Vec<Payload>,
    /// Whether a stage short-circuited the rest.
    pub stopped_early: bool,
}

/// One agent's slot in a parallel round.
#[derive(Debug)]
pub struct RoundOutcome {
    pub agent: String,
    pub result: AgentResult<CycleOutcome>,
}

/// Result of a voting round.
#[derive(Debug, Clone)]
pub struct VoteRound {
    pub result: VotingResult,
    pub ballots: Vec<Vote>,
    /// Whether the deadline fired before every agent answered.
    pub timed_out: bool,
}

/// The per-session orchestrator.
pub struct Orchestrator {
    agents: Vec<Agent>,
    bus: MessageBus,
    reasoning: Arc<dyn ReasoningService>,
    max_tokens: u32,
    temperature: f64,
}

impl Orchestrator {
    /// Create an orchestrator around a reasoning-service handle.
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self {
            agents: Vec::new(),
            bus: MessageBus::new(),
            reasoning,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Override the generation budget handed to agents.
    pub fn with_generation_limits(mut self, max_tokens: u32, temperature: f64) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Register an agent with the orchestrator and the bus.
    pub fn register(&mut self, agent: Agent) -> OrchestratorResult<()> {
        self.bus
            .register(agent.name(), agent.profile.expertise.clone())?;
        self.agents.push(agent);
        Ok(())
    }

    /// Registered agent names, in registration order.
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    /// The bus, for log inspection and external taps.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    fn agent_index(&self, name: &str) -> OrchestratorResult<usize> {
        self.agents
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| OrchestratorError::UnknownAgent(name.to_string()))
    }

    /// Run the named agents in sequence, threading accumulated artifacts
    /// into each later stage's perception context. A stage may short-circuit
    /// the remainder.
    pub async fn run_pipeline(
        &mut self,
        stages: &[&str],
        scene: &SceneInput<'_>,
    ) -> OrchestratorResult<PipelineRun> {
        let mut run = PipelineRun::default();

        for stage in stages {
            let idx = self.agent_index(stage)?;
            let inbox = self.bus.drain(stage)?;
            let ctx = TurnContext {
                team: scene.team,
                quest: scene.quest,
                current_step: scene.current_step,
                seed: scene.seed,
                request: scene.request.clone(),
                artifacts: &run.artifacts,
                style: scene.style,
                flavor: scene.flavor,
            };
            let deps = AgentDeps {
                reasoning: &*self.reasoning,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            };

            debug!(stage, pending = inbox.len(), "Pipeline stage starting");
            let outcome = self.agents[idx]
                .run_cycle(inbox, &ctx, &deps)
                .await
                .map_err(|source| OrchestratorError::Agent {
                    name: stage.to_string(),
                    source,
                })?;

            for message in outcome.messages {
                self.bus.publish(message)?;
            }
            if let Some(artifact) = outcome.artifact {
                debug!(stage, artifact = artifact.label(), "Stage produced artifact");
                run.artifacts.push(artifact);
            }
            if outcome.stop_pipeline {
                warn!(stage, "Pipeline short-circuited");
                run.stopped_early = true;
                break;
            }
        }

        Ok(run)
    }

    /// Run every registered agent's cycle concurrently. Message effects are
    /// withheld until the round completes, so agents in the same round never
    /// see each other's traffic (round-isolated mailboxes). A failing agent
    /// fails its own slot, not the round.
    pub async fn run_parallel_round(
        &mut self,
        scene: &SceneInput<'_>,
    ) -> OrchestratorResult<Vec<RoundOutcome>> {
        // Snapshot every inbox up front; anything published mid-round lands
        // in the next round's perception.
        let mut inboxes: HashMap<String, Vec<Message>> = HashMap::new();
        for name in self.bus.agent_names() {
            inboxes.insert(name.clone(), self.bus.drain(&name)?);
        }

        let artifacts: Vec<Payload> = Vec::new();
        let ctx = TurnContext {
            team: scene.team,
            quest: scene.quest,
            current_step: scene.current_step,
            seed: scene.seed,
            request: scene.request.clone(),
            artifacts: &artifacts,
            style: scene.style,
            flavor: scene.flavor,
        };
        let deps = AgentDeps {
            reasoning: &*self.reasoning,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let futures: Vec<_> = self
            .agents
            .iter_mut()
            .map(|agent| {
                let inbox = inboxes.remove(agent.name()).unwrap_or_default();
                let ctx = &ctx;
                let deps = &deps;
                async move {
                    let name = agent.name().to_string();
                    let result = agent.run_cycle(inbox, ctx, deps).await;
                    RoundOutcome {
                        agent: name,
                        result,
                    }
                }
            })
            .collect();

        let mut outcomes = futures::future::join_all(futures).await;

        // Publish the round's message effects only now.
        for outcome in &mut outcomes {
            if let Ok(cycle) = &mut outcome.result {
                for message in std::mem::take(&mut cycle.messages) {
                    self.bus.publish(message)?;
                }
            }
        }

        info!(agents = outcomes.len(), "Parallel round complete");
        Ok(outcomes)
    }

    /// Broadcast a question, collect private ballots until every agent has
    /// answered or the deadline fires, and tally whatever arrived.
    pub async fn run_vote(
        &mut self,
        prompt: VotePrompt,
        timeout: Duration,
    ) -> OrchestratorResult<VoteRound> {
        self.bus.publish(
            Message::broadcast(
                "orchestrator",
                "vote",
                Payload::VoteRequest {
                    question: prompt.question.clone(),
                    options: prompt.options.clone(),
                },
            )
            .with_priority(Priority::High),
        )?;

        let expected = self.agents.len();
        let mut ballots: Vec<Vote> = Vec::new();
        let mut abstained = 0usize;
        let mut timed_out = false;

        {
            let prompt = &prompt;
            let mut pending: FuturesUnordered<_> = self
                .agents
                .iter()
                .map(|agent| async move { agent.policy().cast_vote(&agent.profile, prompt).await })
                .collect();

            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);

            while ballots.len() + abstained < expected {
                tokio::select! {
                    maybe = pending.next() => match maybe {
                        Some(Some(vote)) => ballots.push(vote),
                        Some(None) => abstained += 1,
                        None => break,
                    },
                    _ = &mut deadline => {
                        warn!(
                            received = ballots.len(),
                            expected,
                            "Vote deadline elapsed; tallying partial ballots"
                        );
                        timed_out = true;
                        break;
                    }
                }
            }
        }

        for ballot in &ballots {
            self.bus
                .publish(Message::vote(ballot.agent_name.clone(), "vote", ballot.clone()))?;
        }

        let result = tally(&ballots)?;
        info!(
            winner = %result.winner,
            consensus = result.consensus,
            ballots = ballots.len(),
            timed_out,
            "Vote complete"
        );

        Ok(VoteRound {
            result,
            ballots,
            timed_out,
        })
    }

    /// Run bounded multi-round negotiation over the given proposals.
    ///
    /// Participants are the registered agents that authored a proposal. Each
    /// round broadcasts the table, collects every participant's stance, and
    /// checks for ≥70% agreement; revisions apply between rounds. Exhausting
    /// the round budget falls back to the first proposal with `agreed =
    /// false` — the protocol always terminates with a usable proposal.
    pub async fn run_negotiation(
        &mut self,
        initial: Vec<Proposal>,
        max_rounds: u32,
    ) -> OrchestratorResult<NegotiationOutcome> {
        let participants: Vec<String> = self
            .agents
            .iter()
            .filter(|a| initial.iter().any(|p| p.author == a.name()))
            .map(|a| a.name().to_string())
            .collect();
        if participants.is_empty() {
            return Err(OrchestratorError::NoProposals);
        }

        let mut proposals = initial.clone();

        for round in 1..=max_rounds {
            for proposal in &proposals {
                self.bus.publish(Message::negotiation(
                    proposal.author.clone(),
                    "negotiation",
                    Payload::ProposalOffer(proposal.clone()),
                ))?;
            }

            let mut positions = Vec::new();
            for agent in &self.agents {
                if !participants.iter().any(|p| p == agent.name()) {
                    continue;
                }
                positions.push(agent.policy().take_position(&agent.profile, &proposals, round));
            }

            for position in &positions {
                self.bus.publish(Message::negotiation(
                    position.participant.clone(),
                    "negotiation",
                    Payload::PositionUpdate(position.clone()),
                ))?;
            }

            if let Some(verdict) = evaluate_round(&positions, participants.len()) {
                debug!(round, leading = %verdict.leading, support = verdict.support, "Negotiation round");
                if verdict.consensus {
                    let winner = proposals
                        .iter()
                        .find(|p| p.author == verdict.leading)
                        .cloned()
                        .unwrap_or_else(|| proposals[0].clone());
                    info!(round, author = %winner.author, "Negotiation agreed");
                    return Ok(NegotiationOutcome {
                        agreed: true,
                        proposal: winner,
                        rounds_used: round,
                    });
                }
            }

            apply_revisions(&mut proposals, &positions);
        }

        warn!(max_rounds, "Negotiation unresolved; falling back to first proposal");
        fallback_outcome(&initial, max_rounds).ok_or(OrchestratorError::NoProposals)
    }
}
