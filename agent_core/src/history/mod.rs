//! History Log - a bounded, append-only record of what happened.
//!
//! The log is a FIFO ring buffer: once it holds `max_length` entries, the
//! oldest entry is dropped for every new one, regardless of what it was.

use chrono::{DateTime, Utc};
use sandbox_rules::{Action, AgentId, Emotion};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;
use uuid::Uuid;

use crate::policy::ResponseType;

/// Default number of entries kept.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Number of entries rendered by [`HistoryLog::summarize`].
pub const SUMMARY_ENTRIES: usize = 10;

/// Summary length used when building agent context.
pub const CONTEXT_SUMMARY_CHARS: usize = 1000;

/// Entry categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Action,
    StateChange,
    NpcResponse,
    System,
    Environment,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Action => "action",
            HistoryKind::StateChange => "state_change",
            HistoryKind::NpcResponse => "npc_response",
            HistoryKind::System => "system",
            HistoryKind::Environment => "environment",
        }
    }
}

/// What an entry records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    Action {
        action: Action,
    },
    #[serde(rename_all = "camelCase")]
    StateChange {
        description: String,
        #[serde(default)]
        changes: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    NpcResponse {
        npc_id: AgentId,
        response_type: ResponseType,
        content: String,
        #[serde(default)]
        emotion: Option<Emotion>,
        /// Action that triggered the response.
        #[serde(default)]
        action_id: Option<String>,
    },
    System {
        message: String,
    },
    Environment {
        description: String,
    },
}

impl HistoryEvent {
    pub fn kind(&self) -> HistoryKind {
        match self {
            HistoryEvent::Action { .. } => HistoryKind::Action,
            HistoryEvent::StateChange { .. } => HistoryKind::StateChange,
            HistoryEvent::NpcResponse { .. } => HistoryKind::NpcResponse,
            HistoryEvent::System { .. } => HistoryKind::System,
            HistoryEvent::Environment { .. } => HistoryKind::Environment,
        }
    }
}

/// A timestamped history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: HistoryEvent,
}

impl HistoryEntry {
    pub fn kind(&self) -> HistoryKind {
        self.event.kind()
    }

    /// The agent who acted: the actor of an action, or the responding NPC.
    pub fn actor(&self) -> Option<&AgentId> {
        match &self.event {
            HistoryEvent::Action { action } => Some(action.actor_id()),
            HistoryEvent::NpcResponse { npc_id, .. } => Some(npc_id),
            _ => None,
        }
    }

    pub fn speaker(&self) -> &str {
        match &self.event {
            HistoryEvent::Action { action } => action.actor_id().as_str(),
            HistoryEvent::NpcResponse { npc_id, .. } => npc_id.as_str(),
            HistoryEvent::StateChange { .. } => "state",
            HistoryEvent::System { .. } => "system",
            HistoryEvent::Environment { .. } => "environment",
        }
    }

    pub fn content(&self) -> &str {
        match &self.event {
            HistoryEvent::Action { action } => action.content(),
            HistoryEvent::StateChange { description, .. } => description,
            HistoryEvent::NpcResponse { content, .. } => content,
            HistoryEvent::System { message } => message,
            HistoryEvent::Environment { description } => description,
        }
    }

    /// One-line rendering: `[kind] speaker: content`.
    pub fn render(&self) -> String {
        format!("[{}] {}: {}", self.kind().as_str(), self.speaker(), self.content())
    }
}

/// Bounded FIFO event log.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    max_length: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryLog {
    pub fn new(max_length: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Stamp and append an event, dropping the oldest entries past capacity.
    pub fn add(&mut self, event: HistoryEvent) -> &HistoryEntry {
        let entry = HistoryEntry {
            id: format!("hist_{}", Uuid::new_v4().simple()),
            timestamp: Utc::now(),
            event,
        };
        debug!(id = %entry.id, kind = entry.kind().as_str(), "history entry added");
        self.push(entry)
    }

    fn push(&mut self, entry: HistoryEntry) -> &HistoryEntry {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_length {
            self.entries.pop_front();
        }
        &self.entries[self.entries.len() - 1]
    }

    pub fn record_action(&mut self, action: &Action) -> &HistoryEntry {
        self.add(HistoryEvent::Action {
            action: action.clone(),
        })
    }

    pub fn record_state_change(
        &mut self,
        description: impl Into<String>,
        changes: serde_json::Value,
    ) -> &HistoryEntry {
        self.add(HistoryEvent::StateChange {
            description: description.into(),
            changes,
        })
    }

    pub fn record_npc_response(
        &mut self,
        npc_id: AgentId,
        response_type: ResponseType,
        content: impl Into<String>,
        emotion: Option<Emotion>,
        action_id: Option<String>,
    ) -> &HistoryEntry {
        self.add(HistoryEvent::NpcResponse {
            npc_id,
            response_type,
            content: content.into(),
            emotion,
            action_id,
        })
    }

    pub fn record_system(&mut self, message: impl Into<String>) -> &HistoryEntry {
        self.add(HistoryEvent::System {
            message: message.into(),
        })
    }

    pub fn record_environment(&mut self, description: impl Into<String>) -> &HistoryEntry {
        self.add(HistoryEvent::Environment {
            description: description.into(),
        })
    }

    /// The last `n` entries, oldest first.
    pub fn get_recent(&self, n: usize) -> Vec<&HistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    pub fn get_by_type(&self, kind: HistoryKind) -> Vec<&HistoryEntry> {
        self.entries.iter().filter(|e| e.kind() == kind).collect()
    }

    /// Entries where `id` is the acting agent or the responding NPC.
    pub fn get_by_actor(&self, id: &AgentId) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.actor() == Some(id))
            .collect()
    }

    /// Entries with `start <= timestamp <= end`.
    pub fn get_by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect()
    }

    /// Render the most recent entries, one per line, keeping at most
    /// `max_chars` characters from the end.
    ///
    /// Truncation drops whole lines from the front: after cutting, anything
    /// before the first newline is discarded so no entry is shown partially.
    /// If the tail holds no newline at all it is kept as cut.
    pub fn summarize(&self, max_chars: usize) -> String {
        let text = self
            .get_recent(SUMMARY_ENTRIES)
            .iter()
            .map(|e| e.render())
            .collect::<Vec<_>>()
            .join("\n");

        let total = text.chars().count();
        if total <= max_chars {
            return text;
        }

        let tail: String = text.chars().skip(total - max_chars).collect();
        match tail.find('\n') {
            Some(idx) => tail[idx + 1..].to_string(),
            None => tail,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Swap in a full set of entries, keeping only the newest `max_length`.
    pub fn replace_entries(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) {
        self.entries.clear();
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_rules::{ActionTarget, DialogueOptions};

    fn say(actor: &str, content: &str) -> Action {
        Action::dialogue(actor, content, ActionTarget::None, DialogueOptions::default())
    }

    #[test]
    fn test_fifo_bound() {
        let mut log = HistoryLog::new(5);
        for i in 0..8 {
            log.record_system(format!("tick {i}"));
        }
        assert_eq!(log.len(), 5);
        let contents: Vec<_> = log.entries().map(|e| e.content().to_string()).collect();
        assert_eq!(contents, vec!["tick 3", "tick 4", "tick 5", "tick 6", "tick 7"]);
    }

    #[test]
    fn test_default_bound() {
        let mut log = HistoryLog::default();
        for i in 0..(DEFAULT_MAX_HISTORY + 3) {
            log.record_system(i.to_string());
        }
        assert_eq!(log.len(), DEFAULT_MAX_HISTORY);
        assert_eq!(log.entries().next().unwrap().content(), "3");
    }

    #[test]
    fn test_get_recent_order() {
        let mut log = HistoryLog::default();
        log.record_system("a");
        log.record_system("b");
        log.record_system("c");
        let recent: Vec<_> = log.get_recent(2).iter().map(|e| e.content()).collect();
        assert_eq!(recent, vec!["b", "c"]);
        assert_eq!(log.get_recent(10).len(), 3);
    }

    #[test]
    fn test_get_by_actor_matches_npc_responses() {
        let mut log = HistoryLog::default();
        let mira = AgentId::new("npc_mira");
        log.record_action(&say("player", "hello"));
        log.record_npc_response(mira.clone(), ResponseType::Dialogue, "hi", None, None);
        log.record_action(&say("npc_mira", "and you?"));
        log.record_environment("wind howls");

        assert_eq!(log.get_by_actor(&mira).len(), 2);
        assert_eq!(log.get_by_actor(&AgentId::player()).len(), 1);
        assert_eq!(log.get_by_type(HistoryKind::Environment).len(), 1);
    }

    #[test]
    fn test_get_by_time_range() {
        let mut log = HistoryLog::default();
        let start = Utc::now();
        log.record_system("inside");
        let end = Utc::now();
        assert_eq!(log.get_by_time_range(start, end).len(), 1);
        assert!(log
            .get_by_time_range(end + chrono::Duration::seconds(1), end + chrono::Duration::seconds(2))
            .is_empty());
    }

    #[test]
    fn test_render_format() {
        let mut log = HistoryLog::default();
        let entry = log.record_action(&say("player", "你好")).clone();
        assert_eq!(entry.render(), "[action] player: 你好");
    }

    #[test]
    fn test_summarize_keeps_last_ten() {
        let mut log = HistoryLog::default();
        for i in 0..12 {
            log.record_system(format!("m{i}"));
        }
        let summary = log.summarize(10_000);
        assert_eq!(summary.lines().count(), SUMMARY_ENTRIES);
        assert!(summary.starts_with("[system] system: m2"));
        assert!(summary.ends_with("[system] system: m11"));
    }

    #[test]
    fn test_summarize_truncates_at_line_boundary() {
        let mut log = HistoryLog::default();
        log.record_system("first line here");
        log.record_system("second");
        log.record_system("third");
        // "[system] system: third" is 22 chars, plus the newline before it.
        let summary = log.summarize(30);
        assert_eq!(summary, "[system] system: third");
        for line in summary.lines() {
            assert!(line.starts_with('['));
        }
    }

    #[test]
    fn test_summarize_multibyte_safe() {
        let mut log = HistoryLog::default();
        log.record_system("你好世界");
        log.record_system("再见");
        let summary = log.summarize(5);
        assert_eq!(summary.chars().count(), 5);
    }

    #[test]
    fn test_clear() {
        let mut log = HistoryLog::default();
        log.record_system("x");
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.summarize(100), "");
    }

    #[test]
    fn test_entry_serde_shape() {
        let mut log = HistoryLog::default();
        let entry = log
            .record_npc_response(AgentId::new("npc_1"), ResponseType::Emotion, "sighs", Some(Emotion::Sad), None)
            .clone();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "npc_response");
        assert_eq!(json["npcId"], "npc_1");
        let back: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
