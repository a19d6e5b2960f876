//! Memory records.

use chrono::{DateTime, Utc};
use sandbox_rules::{AgentId, RulesError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a memory is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Event,
    Character,
    Relationship,
    Environment,
    Knowledge,
    Goal,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Event => "event",
            MemoryType::Character => "character",
            MemoryType::Relationship => "relationship",
            MemoryType::Environment => "environment",
            MemoryType::Knowledge => "knowledge",
            MemoryType::Goal => "goal",
        }
    }
}

/// Ordinal importance. `Critical` memories are never evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum Importance {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Importance {
    pub fn weight(&self) -> f64 {
        *self as u8 as f64
    }
}

impl From<Importance> for u8 {
    fn from(importance: Importance) -> Self {
        importance as u8
    }
}

impl TryFrom<u8> for Importance {
    type Error = RulesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Importance::Low),
            2 => Ok(Importance::Medium),
            3 => Ok(Importance::High),
            4 => Ok(Importance::Critical),
            _ => Err(RulesError::OutOfRange {
                field: "importance".to_string(),
                value: value as i64,
            }),
        }
    }
}

/// A remembered piece of information, optionally owned by one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: MemoryId,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    pub importance: Importance,
    /// Static for now; kept for ranking extensions.
    pub relevance: f64,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Memory {
    pub fn new(memory_type: MemoryType, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            memory_type,
            content: content.into(),
            agent_id: None,
            importance: Importance::default(),
            relevance: 1.0,
            last_accessed: now,
            access_count: 0,
            created_at: now,
            updated_at: now,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_critical(&self) -> bool {
        self.importance == Importance::Critical
    }

    /// Record a read.
    pub fn touch(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = Utc::now();
    }
}
