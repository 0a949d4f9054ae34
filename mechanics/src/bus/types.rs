//! Message types for inter-agent communication.
//!
//! Messages are immutable once published; the bus only appends. Every
//! response carries a back-reference to the request it answers, enforced at
//! construction. Payloads are a closed set of tagged variants validated at
//! the bus boundary rather than opaque blobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::negotiation::{Position, Proposal};
use crate::records::{ChoiceCard, EventCard, OutcomeBundle, QuestCard, ValidationReport};
use crate::voting::Vote;

/// Who a message is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    /// A single named agent.
    Agent(String),
    /// Every registered agent whose expertise matches the topic.
    All,
}

/// The communication pattern a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Response,
    Broadcast,
    Vote,
    Negotiation,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Response => write!(f, "response"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::Vote => write!(f, "vote"),
            Self::Negotiation => write!(f, "negotiation"),
        }
    }
}

/// Delivery priority. `Critical` broadcasts bypass expertise filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// The closed set of message payloads, one variant per (kind, topic) family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    QuestDraft(QuestCard),
    EventDraft(EventCard),
    ChoiceSet { choices: Vec<ChoiceCard> },
    Validation(ValidationReport),
    Narration(OutcomeBundle),
    VoteRequest { question: String, options: Vec<String> },
    Ballot(Vote),
    ProposalOffer(Proposal),
    PositionUpdate(Position),
    Note { text: String },
}

impl Payload {
    /// Short tag for logging and filtering.
    pub fn label(&self) -> &'static str {
        match self {
            Self::QuestDraft(_) => "quest_draft",
            Self::EventDraft(_) => "event_draft",
            Self::ChoiceSet { .. } => "choice_set",
            Self::Validation(_) => "validation",
            Self::Narration(_) => "narration",
            Self::VoteRequest { .. } => "vote_request",
            Self::Ballot(_) => "ballot",
            Self::ProposalOffer(_) => "proposal_offer",
            Self::PositionUpdate(_) => "position_update",
            Self::Note { .. } => "note",
        }
    }
}

/// The unit of inter-agent communication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: Recipient,
    pub kind: MessageKind,
    pub priority: Priority,
    /// Topic tag used for broadcast relevance filtering.
    pub topic: String,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
    pub requires_response: bool,
    /// The request this message answers. Always present for responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

impl Message {
    fn base(
        from: impl Into<String>,
        to: Recipient,
        kind: MessageKind,
        topic: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: from.into(),
            to,
            kind,
            priority: Priority::default(),
            topic: topic.into(),
            payload,
            created_at: Utc::now(),
            requires_response: false,
            in_reply_to: None,
        }
    }

    /// A direct request to one agent.
    pub fn request(
        from: impl Into<String>,
        to: impl Into<String>,
        topic: impl Into<String>,
        payload: Payload,
    ) -> Self {
        let mut msg = Self::base(
            from,
            Recipient::Agent(to.into()),
            MessageKind::Request,
            topic,
            payload,
        );
        msg.requires_response = true;
        msg
    }

    /// A response to a prior request. The back-reference is mandatory.
    pub fn response(
        from: impl Into<String>,
        to: impl Into<String>,
        in_reply_to: impl Into<String>,
        topic: impl Into<String>,
        payload: Payload,
    ) -> Self {
        let mut msg = Self::base(
            from,
            Recipient::Agent(to.into()),
            MessageKind::Response,
            topic,
            payload,
        );
        msg.in_reply_to = Some(in_reply_to.into());
        msg
    }

    /// A broadcast to every expertise-matching agent.
    pub fn broadcast(from: impl Into<String>, topic: impl Into<String>, payload: Payload) -> Self {
        Self::base(from, Recipient::All, MessageKind::Broadcast, topic, payload)
    }

    /// A ballot emitted during a voting round.
    pub fn vote(from: impl Into<String>, topic: impl Into<String>, ballot: Vote) -> Self {
        Self::base(
            from,
            Recipient::All,
            MessageKind::Vote,
            topic,
            Payload::Ballot(ballot),
        )
    }

    /// A negotiation-protocol message.
    pub fn negotiation(
        from: impl Into<String>,
        topic: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self::base(from, Recipient::All, MessageKind::Negotiation, topic, payload)
    }

    /// Override the default priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(text: &str) -> Payload {
        Payload::Note { text: text.into() }
    }

    #[test]
    fn test_request_requires_response() {
        let msg = Message::request("designer", "validator", "event", note("check this"));
        assert_eq!(msg.kind, MessageKind::Request);
        assert!(msg.requires_response);
        assert_eq!(msg.to, Recipient::Agent("validator".into()));
        assert!(msg.in_reply_to.is_none());
    }

    #[test]
    fn test_response_carries_back_reference() {
        let request = Message::request("designer", "validator", "event", note("check"));
        let response = Message::response(
            "validator",
            "designer",
            request.id.clone(),
            "event",
            note("checked"),
        );
        assert_eq!(response.in_reply_to.as_deref(), Some(request.id.as_str()));
        assert_eq!(response.kind, MessageKind::Response);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Message::broadcast("x", "t", note("1"));
        let b = Message::broadcast("x", "t", note("2"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_priority_builder() {
        let msg = Message::broadcast("x", "alert", note("!")).with_priority(Priority::Critical);
        assert_eq!(msg.priority, Priority::Critical);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_payload_serde_tagging() {
        let json = serde_json::to_string(&note("hi")).unwrap();
        assert!(json.contains("\"type\":\"note\""));
        let restored: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.label(), "note");
    }

    #[test]
    fn test_message_serde_roundtrip() {
        let msg = Message::vote(
            "narrator",
            "route",
            Vote::new("narrator", "north", 0.8, 1.0, "shorter"),
        );
        let json = serde_json::to_string(&msg).unwrap();
        let restored: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, msg);
    }
}
