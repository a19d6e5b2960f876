//! Memory Store - per-agent and global memories with relevance ranking.
//!
//! Reads are not side-effect free: [`MemoryStore::get`] and
//! [`MemoryStore::get_relevant`] bump each returned memory's access count
//! and refresh its last-accessed time, which in turn feeds the ranking.

mod record;

pub use record::*;

use chrono::{DateTime, Utc};
use sandbox_rules::AgentId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::history::HistoryEntry;

pub const DEFAULT_MAX_MEMORIES: usize = 1000;
pub const DEFAULT_DECAY_RATE: f64 = 0.1;

const MATCH_BONUS: f64 = 10.0;
const AGENT_BONUS: f64 = 5.0;
const TYPE_BONUS: f64 = 3.0;
const RECENCY_CAP: f64 = 5.0;
const ACCESS_CAP: f64 = 5.0;

/// Filters for [`MemoryStore::search`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryFilter {
    pub memory_type: Option<MemoryType>,
    pub agent_id: Option<AgentId>,
    pub min_importance: Option<Importance>,
}

impl MemoryFilter {
    fn accepts(&self, memory: &Memory) -> bool {
        self.memory_type.map_or(true, |t| memory.memory_type == t)
            && self
                .agent_id
                .as_ref()
                .map_or(true, |id| memory.agent_id.as_ref() == Some(id))
            && self.min_importance.map_or(true, |min| memory.importance >= min)
    }
}

/// Context used to rank memories in [`MemoryStore::get_relevant`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryContext {
    pub agent_id: Option<AgentId>,
    pub memory_type: Option<MemoryType>,
    /// Free text matched against memory content.
    pub text: Option<String>,
}

impl MemoryContext {
    pub fn for_agent(agent_id: AgentId) -> Self {
        Self {
            agent_id: Some(agent_id),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }
}

fn days_between(earlier: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - earlier).num_milliseconds().max(0) as f64 / 86_400_000.0
}

/// Capacity-bounded memory storage.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    /// Insertion order; the front is the oldest.
    memories: Vec<Memory>,
    max_memories: usize,
    decay_rate: f64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORIES, DEFAULT_DECAY_RATE)
    }
}

impl MemoryStore {
    pub fn new(max_memories: usize, decay_rate: f64) -> Self {
        Self {
            memories: Vec::new(),
            max_memories,
            decay_rate,
        }
    }

    /// Store a memory, stamping its timestamps, and evict past capacity.
    pub fn add(&mut self, mut memory: Memory) -> MemoryId {
        let now = Utc::now();
        memory.created_at = now;
        memory.updated_at = now;
        memory.last_accessed = now;
        let id = memory.id;

        debug!(memory = %id, kind = memory.memory_type.as_str(), "memory added");
        self.memories.push(memory);
        while self.memories.len() > self.max_memories {
            if !self.evict_oldest() {
                warn!(
                    count = self.memories.len(),
                    max = self.max_memories,
                    "memory store over capacity with only critical memories"
                );
                break;
            }
        }
        id
    }

    /// Drop the oldest non-critical memory. Returns false if there is none.
    fn evict_oldest(&mut self) -> bool {
        let Some(idx) = self.memories.iter().position(|m| !m.is_critical()) else {
            return false;
        };
        let evicted = self.memories.remove(idx);
        debug!(memory = %evicted.id, "memory evicted");
        true
    }

    /// Turn a history entry into an event memory owned by its actor.
    pub fn remember_entry(&mut self, entry: &HistoryEntry, importance: Importance) -> MemoryId {
        let mut memory = Memory::new(MemoryType::Event, entry.render())
            .with_importance(importance)
            .with_metadata("historyId", serde_json::Value::String(entry.id.clone()))
            .with_metadata(
                "historyType",
                serde_json::Value::String(entry.kind().as_str().to_string()),
            );
        if let Some(actor) = entry.actor() {
            memory = memory.with_agent(actor.clone());
        }
        self.add(memory)
    }

    /// Look up a memory, recording the access.
    pub fn get(&mut self, id: MemoryId) -> Option<&Memory> {
        let Some(memory) = self.memories.iter_mut().find(|m| m.id == id) else {
            warn!(memory = %id, "memory not found");
            return None;
        };
        memory.touch();
        Some(memory)
    }

    /// Look up without recording an access.
    pub fn peek(&self, id: MemoryId) -> Option<&Memory> {
        self.memories.iter().find(|m| m.id == id)
    }

    fn recency_bonus(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        (RECENCY_CAP - days_between(since, now) * self.decay_rate).max(0.0)
    }

    fn access_bonus(memory: &Memory) -> f64 {
        (memory.access_count as f64 * 0.5).min(ACCESS_CAP)
    }

    fn search_score(&self, memory: &Memory, matched: bool, now: DateTime<Utc>) -> f64 {
        let mut score = memory.importance.weight() * 2.0
            + self.recency_bonus(memory.last_accessed, now)
            + Self::access_bonus(memory);
        if matched {
            score += MATCH_BONUS;
        }
        score
    }

    /// Case-insensitive substring search over content, best matches first.
    pub fn search(&self, query: &str, filter: &MemoryFilter) -> Vec<&Memory> {
        let needle = query.to_lowercase();
        let now = Utc::now();
        let mut hits: Vec<(f64, &Memory)> = self
            .memories
            .iter()
            .filter(|m| filter.accepts(m))
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .map(|m| (self.search_score(m, true, now), m))
            .collect();
        hits.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        hits.into_iter().map(|(_, m)| m).collect()
    }

    fn context_score(&self, memory: &Memory, context: &MemoryContext, now: DateTime<Utc>) -> f64 {
        let mut score = memory.importance.weight() * 2.0
            + self.recency_bonus(memory.created_at, now)
            + Self::access_bonus(memory);
        if context.agent_id.is_some() && memory.agent_id == context.agent_id {
            score += AGENT_BONUS;
        }
        if context.memory_type == Some(memory.memory_type) {
            score += TYPE_BONUS;
        }
        if let Some(text) = context.text.as_deref().filter(|t| !t.is_empty()) {
            if memory.content.to_lowercase().contains(&text.to_lowercase()) {
                score += MATCH_BONUS;
            }
        }
        score
    }

    fn ranked_indices(&self, context: &MemoryContext, limit: usize) -> Vec<usize> {
        let now = Utc::now();
        let mut ranked: Vec<(f64, usize)> = self
            .memories
            .iter()
            .enumerate()
            .map(|(idx, m)| (self.context_score(m, context, now), idx))
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().take(limit).map(|(_, idx)| idx).collect()
    }

    /// The `limit` memories scoring highest against `context`. Each returned
    /// memory is marked as accessed.
    pub fn get_relevant(&mut self, context: &MemoryContext, limit: usize) -> Vec<Memory> {
        self.ranked_indices(context, limit)
            .into_iter()
            .map(|idx| {
                let memory = &mut self.memories[idx];
                memory.touch();
                memory.clone()
            })
            .collect()
    }

    /// Same ranking as [`get_relevant`](Self::get_relevant), read-only.
    pub fn rank_relevant(&self, context: &MemoryContext, limit: usize) -> Vec<&Memory> {
        self.ranked_indices(context, limit)
            .into_iter()
            .map(|idx| &self.memories[idx])
            .collect()
    }

    pub fn remove(&mut self, id: MemoryId) -> Option<Memory> {
        let Some(idx) = self.memories.iter().position(|m| m.id == id) else {
            warn!(memory = %id, "remove skipped: memory not found");
            return None;
        };
        Some(self.memories.remove(idx))
    }

    /// Memories owned by one agent, oldest first.
    pub fn for_agent(&self, agent_id: &AgentId) -> Vec<&Memory> {
        self.memories
            .iter()
            .filter(|m| m.agent_id.as_ref() == Some(agent_id))
            .collect()
    }

    pub fn update_importance(&mut self, id: MemoryId, importance: Importance) -> bool {
        let Some(memory) = self.memories.iter_mut().find(|m| m.id == id) else {
            warn!(memory = %id, "importance update skipped: memory not found");
            return false;
        };
        memory.importance = importance;
        memory.updated_at = Utc::now();
        true
    }

    pub fn all(&self) -> &[Memory] {
        &self.memories
    }

    /// Swap in a full set of memories, applying the capacity bound.
    pub fn replace_all(&mut self, memories: Vec<Memory>) {
        self.memories = memories;
        while self.memories.len() > self.max_memories && self.evict_oldest() {}
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryLog;

    fn memory(content: &str, importance: Importance) -> Memory {
        Memory::new(MemoryType::Event, content).with_importance(importance)
    }

    #[test]
    fn test_eviction_skips_critical() {
        let mut store = MemoryStore::new(3, DEFAULT_DECAY_RATE);
        let critical = store.add(memory("oath sworn", Importance::Critical));
        let low = store.add(memory("bread was stale", Importance::Low));
        store.add(memory("rain began", Importance::Medium));
        store.add(memory("the bell rang", Importance::High));

        assert_eq!(store.len(), 3);
        assert!(store.peek(critical).is_some());
        assert!(store.peek(low).is_none());
    }

    #[test]
    fn test_eviction_never_drops_critical_under_pressure() {
        let mut store = MemoryStore::new(4, DEFAULT_DECAY_RATE);
        let mut critical = Vec::new();
        for i in 0..20 {
            let importance = match i % 4 {
                0 => Importance::Critical,
                1 => Importance::Low,
                2 => Importance::Medium,
                _ => Importance::High,
            };
            let id = store.add(memory(&format!("m{i}"), importance));
            if importance == Importance::Critical {
                critical.push(id);
            }
            assert!(critical.iter().all(|id| store.peek(*id).is_some()));
        }
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_all_critical_over_capacity() {
        let mut store = MemoryStore::new(1, DEFAULT_DECAY_RATE);
        store.add(memory("a", Importance::Critical));
        store.add(memory("b", Importance::Critical));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_touches() {
        let mut store = MemoryStore::default();
        let id = store.add(memory("tavern door creaks", Importance::Low));
        store.get(id);
        let read = store.get(id).unwrap();
        assert_eq!(read.access_count, 2);
        assert!(store.get(MemoryId::new()).is_none());
    }

    #[test]
    fn test_search_filters_and_ranks() {
        let mut store = MemoryStore::default();
        let mira = AgentId::new("npc_mira");
        store.add(memory("The Dragon sleeps", Importance::Low));
        store.add(memory("a dragon was seen", Importance::High).with_agent(mira.clone()));
        store.add(memory("nothing here", Importance::Critical));

        let hits = store.search("DRAGON", &MemoryFilter::default());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].importance, Importance::High);

        let filter = MemoryFilter {
            agent_id: Some(mira),
            ..Default::default()
        };
        assert_eq!(store.search("dragon", &filter).len(), 1);

        let filter = MemoryFilter {
            min_importance: Some(Importance::Critical),
            ..Default::default()
        };
        assert!(store.search("dragon", &filter).is_empty());
    }

    #[test]
    fn test_get_relevant_ranks_and_touches() {
        let mut store = MemoryStore::default();
        let mira = AgentId::new("npc_mira");
        let owned = store.add(memory("Mira lost her ring", Importance::Low).with_agent(mira.clone()));
        store.add(memory("The harvest was poor", Importance::Medium));
        store.add(memory("A ring was sold at market", Importance::Low));

        let context = MemoryContext::for_agent(mira).with_text("ring");
        let relevant = store.get_relevant(&context, 2);
        assert_eq!(relevant.len(), 2);
        assert_eq!(relevant[0].id, owned);
        assert_eq!(relevant[0].access_count, 1);
        assert_eq!(store.peek(owned).unwrap().access_count, 1);
    }

    #[test]
    fn test_remember_entry() {
        let mut log = HistoryLog::default();
        let entry = log
            .record_npc_response(
                AgentId::new("npc_mira"),
                crate::policy::ResponseType::Dialogue,
                "Welcome!",
                None,
                None,
            )
            .clone();

        let mut store = MemoryStore::default();
        let id = store.remember_entry(&entry, Importance::Medium);
        let memory = store.peek(id).unwrap();
        assert_eq!(memory.memory_type, MemoryType::Event);
        assert_eq!(memory.agent_id, Some(AgentId::new("npc_mira")));
        assert_eq!(memory.content, "[npc_response] npc_mira: Welcome!");
        assert_eq!(memory.metadata["historyId"], entry.id.as_str());
    }

    #[test]
    fn test_maintenance() {
        let mut store = MemoryStore::default();
        let mira = AgentId::new("npc_mira");
        let id = store.add(memory("x", Importance::Low).with_agent(mira.clone()));
        assert_eq!(store.for_agent(&mira).len(), 1);
        assert!(store.update_importance(id, Importance::Critical));
        assert!(store.peek(id).unwrap().is_critical());
        assert!(store.remove(id).is_some());
        assert!(store.remove(id).is_none());
        assert!(!store.update_importance(id, Importance::Low));
    }
}
