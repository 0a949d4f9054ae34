//! Passive interaction log.
//!
//! A bounded recorder of all published traffic, kept for observability and
//! replay. It listens; it never routes, and nothing reads it on the hot
//! path. Entries evict oldest-first once the bound is reached so a long
//! session cannot grow without limit.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Message, MessageKind, Priority, Recipient};

/// Default bound on retained entries.
const DEFAULT_CAPACITY: usize = 512;

/// One recorded exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message_id: String,
    pub from: String,
    pub to: Recipient,
    pub kind: MessageKind,
    pub priority: Priority,
    pub topic: String,
    pub payload_label: String,
    pub delivered_to: Vec<String>,
}

/// Aggregate statistics over the retained window.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LogStats {
    pub total: usize,
    pub by_kind: HashMap<String, usize>,
    pub by_sender: HashMap<String, usize>,
    pub broadcasts: usize,
    pub responses: usize,
    pub undelivered: usize,
}

/// The bounded recorder.
pub struct InteractionLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    /// Total observed, including evicted entries.
    observed: usize,
}

impl InteractionLog {
    /// Create a log with an explicit bound.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            observed: 0,
        }
    }

    /// Record one published message and where it landed.
    pub fn record(&mut self, message: &Message, delivered_to: &[String]) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.observed += 1;
        self.entries.push_back(LogEntry {
            at: message.created_at,
            message_id: message.id.clone(),
            from: message.from.clone(),
            to: message.to.clone(),
            kind: message.kind,
            priority: message.priority,
            topic: message.topic.clone(),
            payload_label: message.payload.label().to_string(),
            delivered_to: delivered_to.to_vec(),
        });
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether anything has been retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total messages observed over the session, including evicted ones.
    pub fn observed(&self) -> usize {
        self.observed
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Entries an agent sent or received.
    pub fn for_agent<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a LogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.from == name || e.delivered_to.iter().any(|d| d == name))
    }

    /// Entries of a given kind.
    pub fn of_kind(&self, kind: MessageKind) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Aggregate statistics over the retained window.
    pub fn summary(&self) -> LogStats {
        let mut stats = LogStats {
            total: self.entries.len(),
            ..Default::default()
        };
        for entry in &self.entries {
            *stats.by_kind.entry(entry.kind.to_string()).or_insert(0) += 1;
            *stats.by_sender.entry(entry.from.clone()).or_insert(0) += 1;
            if entry.to == Recipient::All {
                stats.broadcasts += 1;
            }
            if entry.kind == MessageKind::Response {
                stats.responses += 1;
            }
            if entry.delivered_to.is_empty() {
                stats.undelivered += 1;
            }
        }
        stats
    }
}

impl Default for InteractionLog {
    fn default() -> Self {
        Self::bounded(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::types::Payload;

    fn note_msg(from: &str, to: &str, text: &str) -> Message {
        Message::request(from, to, "t", Payload::Note { text: text.into() })
    }

    fn record(log: &mut InteractionLog, from: &str, to: &str) {
        let msg = note_msg(from, to, "x");
        log.record(&msg, &[to.to_string()]);
    }

    #[test]
    fn test_record_and_query() {
        let mut log = InteractionLog::default();
        record(&mut log, "a", "b");
        record(&mut log, "b", "c");
        record(&mut log, "c", "a");

        assert_eq!(log.len(), 3);
        assert_eq!(log.for_agent("a").count(), 2);
        assert_eq!(log.of_kind(MessageKind::Request).count(), 3);
        assert_eq!(log.of_kind(MessageKind::Vote).count(), 0);
    }

    #[test]
    fn test_bound_evicts_oldest() {
        let mut log = InteractionLog::bounded(2);
        record(&mut log, "first", "b");
        record(&mut log, "second", "b");
        record(&mut log, "third", "b");

        assert_eq!(log.len(), 2);
        assert_eq!(log.observed(), 3);
        let senders: Vec<&str> = log.entries().map(|e| e.from.as_str()).collect();
        assert_eq!(senders, vec!["second", "third"]);
    }

    #[test]
    fn test_summary_counts() {
        let mut log = InteractionLog::default();
        record(&mut log, "a", "b");
        let broadcast = Message::broadcast("a", "t", Payload::Note { text: "hi".into() });
        log.record(&broadcast, &[]);

        let stats = log.summary();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(stats.undelivered, 1);
        assert_eq!(stats.by_sender.get("a"), Some(&2));
    }
}
