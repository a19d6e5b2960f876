//! Entity definitions for the sandbox world.

mod agent;
mod components;
mod templates;

pub use agent::*;
pub use components::*;
pub use templates::*;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::RulesError;

/// Unique identifier for agents.
///
/// Agent ids are plain strings so the reserved `player` and `gm` ids can be
/// addressed directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    /// Id of the player agent.
    pub const PLAYER: &'static str = "player";
    /// Id of the game-master agent.
    pub const GM: &'static str = "gm";
    /// Id of the environment agent.
    pub const ENVIRONMENT: &'static str = "environment";

    /// Create an agent id from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for an agent of the given type.
    pub fn generate(agent_type: AgentType) -> Self {
        Self(format!("{}_{}", agent_type.as_str(), Uuid::new_v4().simple()))
    }

    pub fn player() -> Self {
        Self::new(Self::PLAYER)
    }

    pub fn gm() -> Self {
        Self::new(Self::GM)
    }

    pub fn environment() -> Self {
        Self::new(Self::ENVIRONMENT)
    }

    /// Reserved ids can never be removed from the registry.
    pub fn is_reserved(&self) -> bool {
        self.0 == Self::PLAYER || self.0 == Self::GM
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of agents in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Player,
    Npc,
    Gm,
    Environment,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Player => "player",
            AgentType::Npc => "npc",
            AgentType::Gm => "gm",
            AgentType::Environment => "environment",
        }
    }
}

impl FromStr for AgentType {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "player" => Ok(AgentType::Player),
            "npc" => Ok(AgentType::Npc),
            "gm" => Ok(AgentType::Gm),
            "environment" => Ok(AgentType::Environment),
            _ => Err(RulesError::invalid_enum("agent type", s)),
        }
    }
}
