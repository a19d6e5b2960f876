//! Built-in NPC templates for template-based registration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Agent, Personality};
use crate::error::RulesError;

/// Archetypes an NPC can be stamped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentTemplate {
    Merchant,
    Guard,
    Innkeeper,
    Scholar,
}

impl AgentTemplate {
    pub const ALL: [AgentTemplate; 4] = [
        AgentTemplate::Merchant,
        AgentTemplate::Guard,
        AgentTemplate::Innkeeper,
        AgentTemplate::Scholar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentTemplate::Merchant => "merchant",
            AgentTemplate::Guard => "guard",
            AgentTemplate::Innkeeper => "innkeeper",
            AgentTemplate::Scholar => "scholar",
        }
    }

    /// Build an NPC from this template.
    pub fn instantiate(&self, name: impl Into<String>, location: impl Into<String>) -> Agent {
        let agent = Agent::npc(name).with_location(location);
        match self {
            AgentTemplate::Merchant => agent
                .with_description("A shrewd trader with a cart of curiosities.")
                .with_personality(Personality::new(60, 55, 75, 55, 40))
                .with_goal("Turn a profit"),
            AgentTemplate::Guard => agent
                .with_description("A watchful guard in dented armor.")
                .with_personality(Personality::new(30, 80, 40, 45, 35))
                .with_goal("Keep the peace"),
            AgentTemplate::Innkeeper => agent
                .with_description("A warm host who hears every rumor in town.")
                .with_personality(Personality::new(55, 60, 80, 75, 30))
                .with_goal("Keep the rooms full"),
            AgentTemplate::Scholar => agent
                .with_description("A distracted scholar buried in old maps.")
                .with_personality(Personality::new(90, 70, 30, 60, 55))
                .with_goal("Uncover forgotten lore"),
        }
    }
}

impl FromStr for AgentTemplate {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentTemplate::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RulesError::invalid_enum("agent template", s))
    }
}
