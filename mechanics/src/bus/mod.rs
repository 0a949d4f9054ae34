//! Message bus: direct queues, filtered broadcast, and an observation tap.
//!
//! The bus owns one bounded FIFO queue per registered agent. A direct message
//! lands in exactly one queue; a broadcast is fanned out to every agent whose
//! declared expertise contains the message's topic tag — unconditionally for
//! `Critical` priority. Published traffic is also recorded by the attached
//! interaction log and mirrored on a broadcast tap for external observers.
//!
//! The orchestrator is the bus's single driver: it publishes between agent
//! cycles and drains an agent's queue into its perception step. Round
//! isolation for parallel execution is the orchestrator's job — it simply
//! withholds publication until the round completes.

use std::collections::{HashMap, VecDeque};

use tokio::sync::broadcast;
use tracing::{debug, warn};

pub mod log;
pub mod types;

pub use log::{InteractionLog, LogEntry, LogStats};
pub use types::{Message, MessageKind, Payload, Priority, Recipient};

/// Capacity of the observation tap.
const TAP_CAPACITY: usize = 256;

/// Default bound on each agent's pending queue.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Error type for bus operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Where a published message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub delivered_to: Vec<String>,
}

struct Registration {
    expertise: Vec<String>,
    queue: VecDeque<Message>,
}

/// The per-session message bus.
pub struct MessageBus {
    agents: HashMap<String, Registration>,
    /// Registration order, kept for deterministic broadcast fan-out.
    order: Vec<String>,
    queue_capacity: usize,
    tap: broadcast::Sender<Message>,
    log: InteractionLog,
}

impl MessageBus {
    /// Create a bus with default bounds.
    pub fn new() -> Self {
        let (tap, _) = broadcast::channel(TAP_CAPACITY);
        Self {
            agents: HashMap::new(),
            order: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            tap,
            log: InteractionLog::default(),
        }
    }

    /// Override the per-agent queue bound.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Register an agent and its expertise tags.
    pub fn register(&mut self, name: impl Into<String>, expertise: Vec<String>) -> BusResult<()> {
        let name = name.into();
        if self.agents.contains_key(&name) {
            return Err(BusError::DuplicateAgent(name));
        }
        debug!(agent = %name, ?expertise, "Agent registered");
        self.order.push(name.clone());
        self.agents.insert(
            name,
            Registration {
                expertise,
                queue: VecDeque::new(),
            },
        );
        Ok(())
    }

    /// Registered agent names in registration order.
    pub fn agent_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Publish a message, routing it to the matching queues.
    pub fn publish(&mut self, message: Message) -> BusResult<DeliveryReceipt> {
        let delivered_to = match &message.to {
            Recipient::Agent(name) => {
                if !self.agents.contains_key(name) {
                    return Err(BusError::UnknownAgent(name.clone()));
                }
                vec![name.clone()]
            }
            Recipient::All => self
                .order
                .iter()
                .filter(|name| *name != &message.from)
                .filter(|name| {
                    message.priority == Priority::Critical
                        || self.agents[*name]
                            .expertise
                            .iter()
                            .any(|tag| tag == &message.topic)
                })
                .cloned()
                .collect(),
        };

        for name in &delivered_to {
            let registration = self
                .agents
                .get_mut(name)
                .ok_or_else(|| BusError::UnknownAgent(name.clone()))?;
            if registration.queue.len() >= self.queue_capacity {
                warn!(agent = %name, "Queue full, evicting oldest message");
                registration.queue.pop_front();
            }
            registration.queue.push_back(message.clone());
        }

        self.log.record(&message, &delivered_to);

        // Mirror on the tap; no receivers is fine.
        let _ = self.tap.send(message.clone());

        debug!(
            id = %message.id,
            from = %message.from,
            kind = %message.kind,
            topic = %message.topic,
            receivers = delivered_to.len(),
            "Message published"
        );

        Ok(DeliveryReceipt { delivered_to })
    }

    /// Empty an agent's pending queue.
    pub fn drain(&mut self, name: &str) -> BusResult<Vec<Message>> {
        let registration = self
            .agents
            .get_mut(name)
            .ok_or_else(|| BusError::UnknownAgent(name.to_string()))?;
        Ok(registration.queue.drain(..).collect())
    }

    /// Number of messages pending for an agent.
    pub fn pending(&self, name: &str) -> usize {
        self.agents.get(name).map_or(0, |r| r.queue.len())
    }

    /// Subscribe to the observation tap.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tap.subscribe()
    }

    /// The interaction log recorded so far.
    pub fn log(&self) -> &InteractionLog {
        &self.log
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
