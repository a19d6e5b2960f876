//! Agent definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AgentId, AgentType, Personality, StatusEffect, SCALE_MAX};
use crate::error::RulesError;
use crate::mechanics::{Emotion, RelationshipFactors, RelationshipType};

/// Read-only projection of a relationship, cached on each agent record.
///
/// The trust map owns the canonical relationship; this copy is only ever
/// rewritten from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipView {
    pub relationship_type: RelationshipType,
    pub factors: RelationshipFactors,
    pub updated_at: DateTime<Utc>,
}

/// A simulated actor: player, NPC, game master, or environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,

    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub appearance: String,
    #[serde(default)]
    pub dialogue_style: String,

    #[serde(default)]
    pub personality: Personality,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub motivations: Vec<String>,
    #[serde(default)]
    pub fears: Vec<String>,

    #[serde(default)]
    pub current_emotion: Emotion,
    /// Strength of the current emotion, 0-100.
    #[serde(default)]
    pub emotion_intensity: u8,

    /// Key into the world's location map.
    #[serde(default)]
    pub location: String,
    /// Item references held by the agent.
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub status: Vec<StatusEffect>,

    #[serde(default)]
    relationships: BTreeMap<AgentId, RelationshipView>,
    #[serde(default)]
    pub memory_ids: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Create a new agent with the given id, name, and type.
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>, agent_type: AgentType) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            agent_type,
            description: String::new(),
            background: String::new(),
            appearance: String::new(),
            dialogue_style: String::new(),
            personality: Personality::default(),
            goals: Vec::new(),
            motivations: Vec::new(),
            fears: Vec::new(),
            current_emotion: Emotion::Neutral,
            emotion_intensity: 0,
            location: String::new(),
            inventory: Vec::new(),
            status: Vec::new(),
            relationships: BTreeMap::new(),
            memory_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an NPC with a freshly generated id.
    pub fn npc(name: impl Into<String>) -> Self {
        Self::new(AgentId::generate(AgentType::Npc), name, AgentType::Npc)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_emotion(mut self, emotion: Emotion, intensity: u8) -> Self {
        self.current_emotion = emotion;
        self.emotion_intensity = intensity.min(SCALE_MAX);
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goals.push(goal.into());
        self
    }

    pub fn is_npc(&self) -> bool {
        self.agent_type == AgentType::Npc
    }

    /// Check if the agent has a specific status effect.
    pub fn has_status(&self, status_id: &str) -> bool {
        self.status.iter().any(|s| s.id == status_id)
    }

    /// Cached relationship projections, keyed by the other agent's id.
    pub fn relationships(&self) -> &BTreeMap<AgentId, RelationshipView> {
        &self.relationships
    }

    /// Cached relationship with one other agent.
    pub fn relationship_with(&self, other: &AgentId) -> Option<&RelationshipView> {
        self.relationships.get(other)
    }

    /// Overwrite the cached projection for `other`. Only the trust map calls this.
    pub fn project_relationship(&mut self, other: AgentId, view: RelationshipView) {
        self.relationships.insert(other, view);
    }

    /// Drop the cached projection for `other`.
    pub fn forget_relationship(&mut self, other: &AgentId) {
        self.relationships.remove(other);
    }

    /// Mark the record as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Check that every bounded field is in range.
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.id.as_str().is_empty() {
            return Err(RulesError::InvalidRecord("agent id is empty".to_string()));
        }
        self.personality.validate()?;
        if self.emotion_intensity > SCALE_MAX {
            return Err(RulesError::OutOfRange {
                field: "emotionIntensity".to_string(),
                value: self.emotion_intensity as i64,
            });
        }
        Ok(())
    }

    /// Apply a partial update and stamp `updated_at`.
    pub fn apply_patch(&mut self, patch: AgentPatch) {
        let AgentPatch {
            name,
            description,
            background,
            appearance,
            dialogue_style,
            personality,
            goals,
            motivations,
            fears,
            current_emotion,
            emotion_intensity,
            location,
            inventory,
            status,
            memory_ids,
        } = patch;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(background) = background {
            self.background = background;
        }
        if let Some(appearance) = appearance {
            self.appearance = appearance;
        }
        if let Some(dialogue_style) = dialogue_style {
            self.dialogue_style = dialogue_style;
        }
        if let Some(personality) = personality {
            self.personality = personality;
        }
        if let Some(goals) = goals {
            self.goals = goals;
        }
        if let Some(motivations) = motivations {
            self.motivations = motivations;
        }
        if let Some(fears) = fears {
            self.fears = fears;
        }
        if let Some(emotion) = current_emotion {
            self.current_emotion = emotion;
        }
        if let Some(intensity) = emotion_intensity {
            self.emotion_intensity = intensity.min(SCALE_MAX);
        }
        if let Some(location) = location {
            self.location = location;
        }
        if let Some(inventory) = inventory {
            self.inventory = inventory;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(memory_ids) = memory_ids {
            self.memory_ids = memory_ids;
        }

        self.touch();
    }
}

/// Partial update for an agent. `None` fields are left untouched.
///
/// Identity, type, and relationship projections are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub background: Option<String>,
    pub appearance: Option<String>,
    pub dialogue_style: Option<String>,
    pub personality: Option<Personality>,
    pub goals: Option<Vec<String>>,
    pub motivations: Option<Vec<String>>,
    pub fears: Option<Vec<String>>,
    pub current_emotion: Option<Emotion>,
    pub emotion_intensity: Option<u8>,
    pub location: Option<String>,
    pub inventory: Option<Vec<String>>,
    pub status: Option<Vec<StatusEffect>>,
    pub memory_ids: Option<Vec<String>>,
}

impl AgentPatch {
    /// Patch that only changes the emotional state.
    pub fn emotion(emotion: Emotion, intensity: u8) -> Self {
        Self {
            current_emotion: Some(emotion),
            emotion_intensity: Some(intensity),
            ..Default::default()
        }
    }

    /// Patch that only moves the agent.
    pub fn location(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_agent() {
        let agent = Agent::new("npc_1", "Mira", AgentType::Npc);
        assert_eq!(agent.name, "Mira");
        assert_eq!(agent.current_emotion, Emotion::Neutral);
        assert!(agent.relationships().is_empty());
        assert!(agent.is_npc());
    }

    #[test]
    fn test_patch_stamps_updated_at() {
        let mut agent = Agent::npc("Bran");
        let before = agent.updated_at;
        agent.apply_patch(AgentPatch {
            description: Some("A blacksmith".to_string()),
            emotion_intensity: Some(250),
            ..Default::default()
        });
        assert_eq!(agent.description, "A blacksmith");
        assert_eq!(agent.emotion_intensity, 100);
        assert!(agent.updated_at >= before);
        assert_eq!(agent.name, "Bran");
    }

    #[test]
    fn test_relationship_projection() {
        let mut agent = Agent::npc("Bran");
        let other = AgentId::player();
        agent.project_relationship(
            other.clone(),
            RelationshipView {
                relationship_type: RelationshipType::Friend,
                factors: RelationshipFactors::default(),
                updated_at: Utc::now(),
            },
        );
        assert_eq!(
            agent.relationship_with(&other).unwrap().relationship_type,
            RelationshipType::Friend
        );
        agent.forget_relationship(&other);
        assert!(agent.relationship_with(&other).is_none());
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        let agent = Agent::new("", "Nobody", AgentType::Npc);
        assert!(agent.validate().is_err());
    }
}
