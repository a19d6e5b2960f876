//! Typed player and agent actions.
//!
//! Actions are immutable once built: every field is private and only exposed
//! through accessors. They feed the state transition and trust scoring.

mod parse;

pub use parse::*;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::entities::AgentId;
use crate::error::RulesError;
use crate::mechanics::Emotion;

/// Top-level action categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Dialogue,
    /// A physical action.
    Action,
    Item,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Dialogue => "dialogue",
            ActionType::Action => "action",
            ActionType::Item => "item",
        }
    }
}

impl FromStr for ActionType {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dialogue" => Ok(ActionType::Dialogue),
            "action" => Ok(ActionType::Action),
            "item" => Ok(ActionType::Item),
            _ => Err(RulesError::invalid_enum("action type", s)),
        }
    }
}

/// What an action is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    None,
    Character,
    Environment,
    Item,
}

/// Target passed to the action constructors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionTarget {
    #[default]
    None,
    Character(AgentId),
    Environment(String),
    Item(String),
}

impl ActionTarget {
    fn split(self) -> (TargetType, Option<String>) {
        match self {
            ActionTarget::None => (TargetType::None, None),
            ActionTarget::Character(id) => (TargetType::Character, Some(id.0)),
            ActionTarget::Environment(id) => (TargetType::Environment, Some(id)),
            ActionTarget::Item(id) => (TargetType::Item, Some(id)),
        }
    }
}

/// Type-specific action fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionDetails {
    Dialogue {
        #[serde(default)]
        tone: Option<String>,
        #[serde(default)]
        emotion: Option<Emotion>,
    },
    #[serde(rename = "action", rename_all = "camelCase")]
    Physical {
        /// Force of the action, 0-100.
        #[serde(default = "default_intensity")]
        intensity: u8,
        #[serde(default)]
        body_part: Option<String>,
        #[serde(default)]
        is_stealthy: bool,
    },
    #[serde(rename_all = "camelCase")]
    Item {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        effect: Option<String>,
    },
}

fn default_intensity() -> u8 {
    50
}

impl ActionDetails {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionDetails::Dialogue { .. } => ActionType::Dialogue,
            ActionDetails::Physical { .. } => ActionType::Action,
            ActionDetails::Item { .. } => ActionType::Item,
        }
    }
}

/// Optional fields for dialogue actions.
#[derive(Debug, Clone, Default)]
pub struct DialogueOptions {
    pub tone: Option<String>,
    pub emotion: Option<Emotion>,
}

/// Optional fields for physical actions.
#[derive(Debug, Clone)]
pub struct PhysicalOptions {
    pub intensity: u8,
    pub body_part: Option<String>,
    pub is_stealthy: bool,
}

impl Default for PhysicalOptions {
    fn default() -> Self {
        Self {
            intensity: default_intensity(),
            body_part: None,
            is_stealthy: false,
        }
    }
}

/// Optional fields for item actions.
#[derive(Debug, Clone, Default)]
pub struct ItemOptions {
    pub item_id: Option<String>,
    pub effect: Option<String>,
}

/// A single immutable action taken by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    id: String,
    actor_id: AgentId,
    content: String,
    #[serde(default)]
    target_type: TargetType,
    #[serde(default)]
    target_id: Option<String>,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    details: ActionDetails,
}

impl Action {
    fn build(
        actor: impl Into<AgentId>,
        content: impl Into<String>,
        target: ActionTarget,
        details: ActionDetails,
    ) -> Self {
        let (target_type, target_id) = target.split();
        Self {
            id: generate_action_id(details.action_type()),
            actor_id: actor.into(),
            content: content.into(),
            target_type,
            target_id,
            timestamp: Utc::now(),
            details,
        }
    }

    /// Something said aloud.
    pub fn dialogue(
        actor: impl Into<AgentId>,
        content: impl Into<String>,
        target: ActionTarget,
        options: DialogueOptions,
    ) -> Self {
        Self::build(
            actor,
            content,
            target,
            ActionDetails::Dialogue {
                tone: options.tone,
                emotion: options.emotion,
            },
        )
    }

    /// A physical action.
    pub fn physical(
        actor: impl Into<AgentId>,
        content: impl Into<String>,
        target: ActionTarget,
        options: PhysicalOptions,
    ) -> Self {
        Self::build(
            actor,
            content,
            target,
            ActionDetails::Physical {
                intensity: options.intensity.min(100),
                body_part: options.body_part,
                is_stealthy: options.is_stealthy,
            },
        )
    }

    /// Use, give, or take an item.
    pub fn item(
        actor: impl Into<AgentId>,
        content: impl Into<String>,
        target: ActionTarget,
        options: ItemOptions,
    ) -> Self {
        Self::build(
            actor,
            content,
            target,
            ActionDetails::Item {
                item_id: options.item_id,
                effect: options.effect,
            },
        )
    }

    /// Parse free text and build the matching typed action with default options.
    pub fn from_free_text(
        actor: impl Into<AgentId>,
        input: &str,
        target: ActionTarget,
    ) -> Self {
        let parsed = parse_free_text(input);
        match parsed.action_type {
            ActionType::Dialogue => {
                Self::dialogue(actor, parsed.content, target, DialogueOptions::default())
            }
            ActionType::Action => {
                Self::physical(actor, parsed.content, target, PhysicalOptions::default())
            }
            ActionType::Item => Self::item(actor, parsed.content, target, ItemOptions::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action_type(&self) -> ActionType {
        self.details.action_type()
    }

    pub fn actor_id(&self) -> &AgentId {
        &self.actor_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn target_type(&self) -> TargetType {
        self.target_type
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn details(&self) -> &ActionDetails {
        &self.details
    }

    /// Target id when the action is aimed at a character.
    pub fn target_agent(&self) -> Option<AgentId> {
        match (self.target_type, &self.target_id) {
            (TargetType::Character, Some(id)) => Some(AgentId::new(id.clone())),
            _ => None,
        }
    }

    /// Check if the action is aimed directly at the given agent.
    pub fn targets_agent(&self, agent: &AgentId) -> bool {
        self.target_type == TargetType::Character && self.target_id.as_deref() == Some(agent.as_str())
    }
}

/// Generate an action id of the form `type_timestamp_random`.
pub fn generate_action_id(action_type: ActionType) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!(
        "{}_{}_{}",
        action_type.as_str(),
        Utc::now().timestamp_millis(),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialogue_constructor() {
        let action = Action::dialogue(
            "player",
            "Good evening",
            ActionTarget::Character(AgentId::new("npc_1")),
            DialogueOptions {
                tone: Some("polite".to_string()),
                emotion: Some(Emotion::Happy),
            },
        );
        assert_eq!(action.action_type(), ActionType::Dialogue);
        assert_eq!(action.target_type(), TargetType::Character);
        assert_eq!(action.target_id(), Some("npc_1"));
        assert!(action.targets_agent(&AgentId::new("npc_1")));
        assert!(action.id().starts_with("dialogue_"));
    }

    #[test]
    fn test_action_id_shape() {
        let id = generate_action_id(ActionType::Item);
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "item");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_physical_intensity_is_capped() {
        let action = Action::physical(
            "player",
            "shove",
            ActionTarget::None,
            PhysicalOptions {
                intensity: 180,
                ..Default::default()
            },
        );
        assert!(matches!(
            action.details(),
            ActionDetails::Physical { intensity: 100, .. }
        ));
        assert!(action.target_agent().is_none());
    }

    #[test]
    fn test_from_free_text_picks_type() {
        let action = Action::from_free_text("player", "【推门】", ActionTarget::None);
        assert_eq!(action.action_type(), ActionType::Action);
        assert_eq!(action.content(), "推门");
    }

    #[test]
    fn test_serde_shape() {
        let action = Action::item(
            "player",
            "drink the potion",
            ActionTarget::Item("potion".to_string()),
            ItemOptions {
                item_id: Some("potion".to_string()),
                effect: Some("heal".to_string()),
            },
        );
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "item");
        assert_eq!(json["actorId"], "player");
        assert_eq!(json["targetType"], "item");
        assert_eq!(json["itemId"], "potion");

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }
}
