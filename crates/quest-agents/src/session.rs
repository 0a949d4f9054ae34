//! Inbound command surface: start, advance, resolve, progress.
//!
//! Sessions are caller-held values. Every command takes game state by value
//! or reference and returns new derived values; nothing is persisted and no
//! partial state is ever committed on a failed turn. Narrative content comes
//! from the agent pipelines; every mechanical consequence is computed
//! exclusively by the rules engine.

use std::sync::Arc;

use tracing::info;

use quest_mechanics::analysis::team_power;
use quest_mechanics::records::{ActionKind, ChoiceCard, EventCard, OutcomeBundle};
use quest_mechanics::rules::{apply_damage, compute_battle, compute_capture, RulesError};
use quest_mechanics::state::{Combatant, GameState, Quest};
use quest_mechanics::Payload;

use crate::context::{ResolutionFacts, TurnRequest};
use crate::orchestrator::{Orchestrator, OrchestratorError, SceneInput};
use crate::reasoning::ReasoningService;
use crate::roles::standard_agents;
use crate::species::{flavor_with_failsafe, SpeciesProvider};

/// Seed used when the caller does not supply one. Fixed so an unseeded
/// session is still replayable from its transcript.
const DEFAULT_SEED: u64 = 151_151;

/// Score awarded for slipping past an event without engaging.
const EVADE_SCORE: i64 = 5;

/// Error type for session commands.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot run a session with an empty team")]
    EmptyTeam,

    #[error("The session is already over")]
    SessionOver,

    #[error("The swarm produced no {expected}")]
    MissingArtifact { expected: &'static str },

    #[error("Turn rejected by validation: {warnings:?}")]
    InvalidTurn { warnings: Vec<String> },

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// Result type for session commands.
pub type SessionResult<T> = Result<T, SessionError>;

/// The advance-event response: an event, its scene narration, and choices.
#[derive(Debug, Clone)]
pub struct EventTurn {
    pub event: EventCard,
    pub narration: String,
    pub choices: Vec<ChoiceCard>,
    /// Validator downgrades carried through for the caller's UI.
    pub warnings: Vec<String>,
}

/// The mechanical and narrative record of one resolved choice.
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    pub facts: ResolutionFacts,
    pub narration: OutcomeBundle,
    pub warnings: Vec<String>,
}

/// The resolve-choice response.
#[derive(Debug, Clone)]
pub struct ChoiceResolution {
    pub outcome: OutcomeRecord,
    pub updated_team: Vec<Combatant>,
    pub session_over: bool,
}

/// What a resolved turn contributes to the next state.
#[derive(Debug, Clone)]
pub struct TurnDelta {
    pub updated_team: Vec<Combatant>,
    pub score_delta: i64,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    TeamDefeated,
    QuestComplete,
}

/// Result of advancing the session clock.
#[derive(Debug, Clone)]
pub enum SessionProgress {
    Advanced(GameState),
    GameOver {
        final_score: i64,
        reason: GameOverReason,
    },
}

/// One game session's orchestration runtime: the standard agent table plus
/// the outbound service handles. Constructed per session, discarded with it.
pub struct QuestSession {
    orchestrator: Orchestrator,
    species: Option<Arc<dyn SpeciesProvider>>,
    style: String,
}

impl QuestSession {
    /// Build a session runtime with the standard four agents.
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        style: impl Into<String>,
    ) -> SessionResult<Self> {
        let mut orchestrator = Orchestrator::new(reasoning);
        for agent in standard_agents() {
            orchestrator.register(agent)?;
        }
        Ok(Self {
            orchestrator,
            species: None,
            style: style.into(),
        })
    }

    /// Attach a species provider for prompt flavor.
    pub fn with_species(mut self, species: Arc<dyn SpeciesProvider>) -> Self {
        self.species = Some(species);
        self
    }

    /// The orchestrator, for protocol runs (votes, negotiation) and log
    /// inspection.
    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    async fn flavor_for(&self, team: &[Combatant]) -> String {
        let lead = team.iter().find(|c| !c.is_fainted());
        flavor_with_failsafe(self.species.as_deref(), lead.and_then(|c| c.species_id)).await
    }

    /// Start a session: draft and validate the quest framing for a team.
    /// Returns the quest; the caller composes it into a `GameState`.
    pub async fn start_session(
        &mut self,
        team: &[Combatant],
        seed: Option<u64>,
    ) -> SessionResult<Quest> {
        if team.is_empty() {
            return Err(SessionError::EmptyTeam);
        }
        let seed = seed.unwrap_or(DEFAULT_SEED);
        let flavor = self.flavor_for(team).await;

        let scene = SceneInput {
            team,
            quest: None,
            current_step: 0,
            seed,
            request: TurnRequest::DraftQuest,
            style: &self.style,
            flavor: &flavor,
        };
        let run = self
            .orchestrator
            .run_pipeline(&["quest_designer", "validator"], &scene)
            .await?;

        let warnings = validation_warnings(&run.artifacts);
        if run.stopped_early {
            return Err(SessionError::InvalidTurn { warnings });
        }

        let quest = run
            .artifacts
            .into_iter()
            .find_map(|p| match p {
                Payload::QuestDraft(card) => Some(card),
                _ => None,
            })
            .ok_or(SessionError::MissingArtifact { expected: "quest" })?
            .into_quest();

        info!(title = %quest.title, steps = quest.target_step_count, "Session started");
        Ok(quest)
    }

    /// Compose the next event: event draft, choices, validation, narration.
    pub async fn advance_event(&mut self, state: &GameState) -> SessionResult<EventTurn> {
        if state.is_over() {
            return Err(SessionError::SessionOver);
        }
        let flavor = self.flavor_for(&state.team).await;

        let scene = SceneInput {
            team: &state.team,
            quest: Some(&state.quest),
            current_step: state.current_step,
            seed: state.seed,
            request: TurnRequest::ComposeEvent,
            style: &self.style,
            flavor: &flavor,
        };
        let run = self
            .orchestrator
            .run_pipeline(
                &["quest_designer", "choice_designer", "validator", "narrator"],
                &scene,
            )
            .await?;

        let warnings = validation_warnings(&run.artifacts);
        if run.stopped_early {
            return Err(SessionError::InvalidTurn { warnings });
        }

        let mut event = None;
        let mut choices = None;
        let mut narration = None;
        for artifact in &run.artifacts {
            match artifact {
                Payload::EventDraft(card) => event = Some(card.clone()),
                Payload::ChoiceSet { choices: set } => choices = Some(set.clone()),
                Payload::Validation(report) => {
                    if let Some(adjusted) = &report.adjusted_event {
                        event = Some(adjusted.clone());
                    }
                    if let Some(adjusted) = &report.adjusted_choices {
                        choices = Some(adjusted.clone());
                    }
                }
                Payload::Narration(bundle) => narration = Some(bundle.narration.clone()),
                _ => {}
            }
        }

        let event = event.ok_or(SessionError::MissingArtifact { expected: "event" })?;
        let choices = choices.ok_or(SessionError::MissingArtifact { expected: "choices" })?;
        let narration = narration.ok_or(SessionError::MissingArtifact {
            expected: "narration",
        })?;

        info!(
            step = state.current_step,
            event = %event.title,
            choices = choices.len(),
            "Event composed"
        );
        Ok(EventTurn {
            event,
            narration,
            choices,
            warnings,
        })
    }

    /// Resolve a chosen action. Mechanics come from the rules engine against
    /// the session seed; the narrator only dresses the computed facts.
    /// `position` is the choice's index in the presented set, used for the
    /// documented positional risk fallback.
    pub async fn resolve_choice(
        &mut self,
        state: &GameState,
        event: &EventCard,
        choice: &ChoiceCard,
        position: usize,
    ) -> SessionResult<ChoiceResolution> {
        let active_count = state.team.iter().filter(|c| !c.is_fainted()).count();
        if active_count == 0 {
            return Err(SessionError::SessionOver);
        }

        let risk = choice.risk_level(position);
        let player_power = team_power(&state.team);
        let mut warnings = Vec::new();
        let mut updated_team = state.team.clone();

        let facts = match choice.action_kind {
            ActionKind::Battle => {
                let outcome = compute_battle(
                    player_power,
                    event.enemy_power,
                    risk,
                    state.seed,
                    state.quest.difficulty,
                )?;
                if !outcome.success {
                    // A whiffed engagement invites a counterblow on the
                    // lead active member.
                    let retaliation = (10.0 + 2.0 * event.enemy_power).round();
                    if let Some(idx) = updated_team.iter().position(|c| !c.is_fainted()) {
                        updated_team[idx] = apply_damage(&updated_team[idx], retaliation)?;
                        warnings.push(format!(
                            "{} took {} damage in the counterattack",
                            updated_team[idx].name, retaliation
                        ));
                    }
                }
                ResolutionFacts {
                    action: ActionKind::Battle,
                    risk,
                    success: outcome.success,
                    damage_dealt: outcome.damage_dealt,
                    score_delta: outcome.score_delta,
                    enemy_name: event.enemy_name.clone(),
                }
            }
            ActionKind::Capture => {
                let outcome =
                    compute_capture(event.enemy_power, player_power, risk, state.seed)?;
                ResolutionFacts {
                    action: ActionKind::Capture,
                    risk,
                    success: outcome.success,
                    damage_dealt: 0.0,
                    score_delta: outcome.score_delta,
                    enemy_name: event.enemy_name.clone(),
                }
            }
            ActionKind::Evade => ResolutionFacts {
                action: ActionKind::Evade,
                risk,
                success: true,
                damage_dealt: 0.0,
                score_delta: EVADE_SCORE,
                enemy_name: event.enemy_name.clone(),
            },
        };

        let flavor = self.flavor_for(&updated_team).await;
        let scene = SceneInput {
            team: &updated_team,
            quest: Some(&state.quest),
            current_step: state.current_step,
            seed: state.seed,
            request: TurnRequest::NarrateOutcome {
                facts: facts.clone(),
            },
            style: &self.style,
            flavor: &flavor,
        };
        let run = self.orchestrator.run_pipeline(&["narrator"], &scene).await?;
        let narration = run
            .artifacts
            .into_iter()
            .find_map(|p| match p {
                Payload::Narration(bundle) => Some(bundle),
                _ => None,
            })
            .ok_or(SessionError::MissingArtifact {
                expected: "narration",
            })?;

        let session_over = updated_team.iter().all(Combatant::is_fainted);
        info!(
            action = %facts.action,
            success = facts.success,
            score = facts.score_delta,
            session_over,
            "Choice resolved"
        );

        Ok(ChoiceResolution {
            outcome: OutcomeRecord {
                facts,
                narration,
                warnings,
            },
            updated_team,
            session_over,
        })
    }

    /// Advance the session clock with a resolved turn. Pure bookkeeping —
    /// no agent or service calls.
    pub fn advance_state(&self, state: &GameState, turn: TurnDelta) -> SessionProgress {
        let next = GameState {
            team: turn.updated_team,
            current_step: state.current_step + 1,
            cumulative_score: state.cumulative_score + turn.score_delta,
            seed: state.next_seed(),
            quest: state.quest.clone(),
        };

        if next.team_defeated() {
            return SessionProgress::GameOver {
                final_score: next.cumulative_score,
                reason: GameOverReason::TeamDefeated,
            };
        }
        if next.current_step >= next.quest.target_step_count {
            return SessionProgress::GameOver {
                final_score: next.cumulative_score,
                reason: GameOverReason::QuestComplete,
            };
        }
        SessionProgress::Advanced(next)
    }
}

fn validation_warnings(artifacts: &[Payload]) -> Vec<String> {
    artifacts
        .iter()
        .flat_map(|p| match p {
            Payload::Validation(report) => report.warnings.clone(),
            _ => Vec::new(),
        })
        .collect()
}
