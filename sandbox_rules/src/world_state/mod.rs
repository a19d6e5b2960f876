//! World state management - the aggregate root holding all game data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::entities::{Agent, AgentId, AgentType};
use crate::error::RulesError;

/// World time tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorldTime {
    pub day: u32,
    pub hour: u8,
    pub minute: u8,
    pub season: Season,
}

impl WorldTime {
    /// Create a new world time.
    pub fn new(day: u32, hour: u8, minute: u8, season: Season) -> Self {
        Self {
            day,
            hour,
            minute,
            season,
        }
    }

    /// Check if it's currently night.
    pub fn is_night(&self) -> bool {
        self.hour < 6 || self.hour >= 20
    }

    /// Advance time by given minutes.
    pub fn advance(&mut self, minutes: u32) {
        let total_minutes = self.minute as u32 + minutes;
        self.minute = (total_minutes % 60) as u8;

        let total_hours = self.hour as u32 + total_minutes / 60;
        self.hour = (total_hours % 24) as u8;
        self.day += total_hours / 24;

        // A season lasts 90 days
        self.season = match self.day % 360 {
            0..=89 => Season::Spring,
            90..=179 => Season::Summer,
            180..=269 => Season::Autumn,
            _ => Season::Winter,
        };
    }
}

/// Seasons of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    #[default]
    Spring,
    Summer,
    Autumn,
    Winter,
}

/// Weather conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    #[default]
    Clear,
    Cloudy,
    Rainy,
    Stormy,
    Snowy,
    Foggy,
}

/// Coarse phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    #[default]
    Setup,
    Exploration,
    Conversation,
    Combat,
    Ended,
}

impl GamePhase {
    pub const ALL: [GamePhase; 5] = [
        GamePhase::Setup,
        GamePhase::Exploration,
        GamePhase::Conversation,
        GamePhase::Combat,
        GamePhase::Ended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Setup => "setup",
            GamePhase::Exploration => "exploration",
            GamePhase::Conversation => "conversation",
            GamePhase::Combat => "combat",
            GamePhase::Ended => "ended",
        }
    }
}

impl FromStr for GamePhase {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GamePhase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RulesError::invalid_enum("game phase", s))
    }
}

/// An interactable object placed in a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl WorldObject {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            properties: BTreeMap::new(),
        }
    }
}

/// A location in the game world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ids of directly reachable locations.
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub objects: Vec<WorldObject>,
}

impl Location {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            connections: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_object(mut self, object: WorldObject) -> Self {
        self.objects.push(object);
        self
    }
}

/// Environment state: the location graph, the scene, time, and weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub locations: BTreeMap<String, Location>,
    pub current_location: String,
    pub time: WorldTime,
    pub weather: Weather,
}

/// A categorized piece of setting lore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldbookEntry {
    pub id: String,
    pub category: String,
    pub title: String,
    pub content: String,
}

/// Setting text plus categorized lore entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Worldbook {
    pub setting: String,
    #[serde(default)]
    pub entries: Vec<WorldbookEntry>,
}

impl Worldbook {
    /// All entries in the given category.
    pub fn entries_in(&self, category: &str) -> Vec<&WorldbookEntry> {
        self.entries
            .iter()
            .filter(|e| e.category.eq_ignore_ascii_case(category))
            .collect()
    }
}

/// Text-generation choices persisted with the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "mock".to_string(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// The complete state of the game world at any point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub player: Agent,

    /// Non-player characters.
    #[serde(default)]
    pub agents: Vec<Agent>,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub worldbook: Worldbook,

    #[serde(default)]
    pub flags: BTreeMap<String, bool>,

    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub llm_config: LlmSettings,

    #[serde(default)]
    pub phase: GamePhase,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(Agent::new(AgentId::player(), "Player", AgentType::Player))
    }
}

impl GameState {
    /// Create a new world around the given player record.
    pub fn new(player: Agent) -> Self {
        let now = Utc::now();
        Self {
            player,
            agents: Vec::new(),
            environment: Environment::default(),
            worldbook: Worldbook::default(),
            flags: BTreeMap::new(),
            variables: BTreeMap::new(),
            llm_config: LlmSettings::default(),
            phase: GamePhase::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the state as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Find the player or an NPC by id.
    pub fn find_agent(&self, id: &AgentId) -> Option<&Agent> {
        if &self.player.id == id {
            return Some(&self.player);
        }
        self.agents.iter().find(|a| &a.id == id)
    }

    pub fn npc(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| &a.id == id)
    }

    /// Insert or replace an NPC record by id.
    pub fn upsert_npc(&mut self, agent: Agent) {
        match self.agents.iter_mut().find(|a| a.id == agent.id) {
            Some(existing) => *existing = agent,
            None => self.agents.push(agent),
        }
        self.touch();
    }

    /// Remove an NPC record, returning it if present.
    pub fn remove_npc(&mut self, id: &AgentId) -> Option<Agent> {
        let index = self.agents.iter().position(|a| &a.id == id)?;
        self.touch();
        Some(self.agents.remove(index))
    }

    /// NPCs standing in the given location.
    pub fn npcs_at(&self, location: &str) -> Vec<&Agent> {
        self.agents.iter().filter(|a| a.location == location).collect()
    }

    /// Add a location to the world.
    pub fn add_location(&mut self, location: Location) -> String {
        let id = location.id.clone();
        if self.environment.current_location.is_empty() {
            self.environment.current_location = id.clone();
        }
        self.environment.locations.insert(id.clone(), location);
        self.touch();
        id
    }

    /// Link two locations in both directions. Returns false if either is unknown.
    pub fn connect_locations(&mut self, a: &str, b: &str) -> bool {
        if !self.environment.locations.contains_key(a)
            || !self.environment.locations.contains_key(b)
        {
            tracing::warn!(from = a, to = b, "cannot connect unknown locations");
            return false;
        }
        for (from, to) in [(a, b), (b, a)] {
            if let Some(location) = self.environment.locations.get_mut(from) {
                if !location.connections.iter().any(|c| c == to) {
                    location.connections.push(to.to_string());
                }
            }
        }
        self.touch();
        true
    }

    /// Move the scene to another known location.
    pub fn set_current_location(&mut self, id: &str) -> bool {
        if !self.environment.locations.contains_key(id) {
            tracing::warn!(location = id, "unknown location");
            return false;
        }
        self.environment.current_location = id.to_string();
        self.touch();
        true
    }

    pub fn current_location(&self) -> Option<&Location> {
        self.environment
            .locations
            .get(&self.environment.current_location)
    }

    /// Find an object in the current location.
    pub fn find_object(&self, id: &str) -> Option<&WorldObject> {
        self.current_location()
            .and_then(|loc| loc.objects.iter().find(|o| o.id == id))
    }

    /// Check if it's currently night.
    pub fn is_night(&self) -> bool {
        self.environment.time.is_night()
    }

    /// Advance time by given minutes.
    pub fn advance_time(&mut self, minutes: u32) {
        self.environment.time.advance(minutes);
        self.touch();
    }

    /// Parse and set the game phase.
    pub fn set_phase(&mut self, phase: &str) -> Result<GamePhase, RulesError> {
        let phase = phase.parse::<GamePhase>()?;
        self.phase = phase;
        self.touch();
        Ok(phase)
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
        self.touch();
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.variables.insert(name.into(), value);
        self.touch();
    }

    pub fn variable(&self, name: &str) -> Option<&serde_json::Value> {
        self.variables.get(name)
    }

    /// Check every agent record and cross-reference.
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.player.agent_type != AgentType::Player {
            return Err(RulesError::InvalidRecord(
                "player slot holds a non-player agent".to_string(),
            ));
        }
        self.player.validate()?;
        for agent in &self.agents {
            agent.validate()?;
            if agent.agent_type != AgentType::Npc {
                return Err(RulesError::InvalidRecord(format!(
                    "agent list holds non-NPC {}",
                    agent.id
                )));
            }
        }
        let current = &self.environment.current_location;
        if !current.is_empty() && !self.environment.locations.contains_key(current) {
            return Err(RulesError::InvalidRecord(format!(
                "current location {current:?} is not a known location"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_time_is_night() {
        let mut state = GameState::default();

        state.environment.time.hour = 14;
        assert!(!state.is_night());

        state.environment.time.hour = 22;
        assert!(state.is_night());

        state.environment.time.hour = 4;
        assert!(state.is_night());
    }

    #[test]
    fn test_advance_time() {
        let mut state = GameState::default();
        state.environment.time = WorldTime::new(1, 23, 30, Season::Spring);

        state.advance_time(60);

        assert_eq!(state.environment.time.hour, 0);
        assert_eq!(state.environment.time.minute, 30);
        assert_eq!(state.environment.time.day, 2);
    }

    #[test]
    fn test_season_rollover() {
        let mut time = WorldTime::new(89, 23, 0, Season::Spring);
        time.advance(60);
        assert_eq!(time.day, 90);
        assert_eq!(time.season, Season::Summer);
    }

    #[test]
    fn test_location_graph() {
        let mut state = GameState::default();
        state.add_location(Location::new("tavern", "The Gilded Mug"));
        state.add_location(Location::new("square", "Market Square"));

        assert_eq!(state.environment.current_location, "tavern");
        assert!(state.connect_locations("tavern", "square"));
        assert!(!state.connect_locations("tavern", "moon"));

        let square = &state.environment.locations["square"];
        assert_eq!(square.connections, vec!["tavern".to_string()]);

        assert!(state.set_current_location("square"));
        assert!(!state.set_current_location("moon"));
        assert_eq!(state.current_location().unwrap().name, "Market Square");
    }

    #[test]
    fn test_find_object_in_current_location() {
        let mut state = GameState::default();
        state.add_location(
            Location::new("cellar", "Cellar").with_object(WorldObject::new("barrel", "Old barrel")),
        );
        assert!(state.find_object("barrel").is_some());
        assert!(state.find_object("crate").is_none());
    }

    #[test]
    fn test_npc_upsert_and_remove() {
        let mut state = GameState::default();
        let npc = Agent::npc("Mira").with_location("tavern");
        let id = npc.id.clone();

        state.upsert_npc(npc.clone());
        state.upsert_npc(npc.with_description("Bartender"));
        assert_eq!(state.agents.len(), 1);
        assert_eq!(state.npc(&id).unwrap().description, "Bartender");
        assert_eq!(state.npcs_at("tavern").len(), 1);

        assert!(state.remove_npc(&id).is_some());
        assert!(state.find_agent(&id).is_none());
    }

    #[test]
    fn test_set_phase_validates() {
        let mut state = GameState::default();
        assert_eq!(state.set_phase("combat").unwrap(), GamePhase::Combat);
        assert!(state.set_phase("intermission").is_err());
        assert_eq!(state.phase, GamePhase::Combat);
    }

    #[test]
    fn test_flags_and_variables() {
        let mut state = GameState::default();
        state.set_flag("door_open", true);
        state.set_variable("gold", serde_json::json!(12));
        assert!(state.flag("door_open"));
        assert!(!state.flag("missing"));
        assert_eq!(state.variable("gold"), Some(&serde_json::json!(12)));
    }

    #[test]
    fn test_worldbook_categories() {
        let worldbook = Worldbook {
            setting: "A river city".to_string(),
            entries: vec![
                WorldbookEntry {
                    id: "1".to_string(),
                    category: "faction".to_string(),
                    title: "River Guild".to_string(),
                    content: "Controls the docks".to_string(),
                },
                WorldbookEntry {
                    id: "2".to_string(),
                    category: "place".to_string(),
                    title: "Old Bridge".to_string(),
                    content: "Crumbling".to_string(),
                },
            ],
        };
        assert_eq!(worldbook.entries_in("Faction").len(), 1);
    }

    #[test]
    fn test_validate_catches_bad_current_location() {
        let mut state = GameState::default();
        assert!(state.validate().is_ok());
        state.environment.current_location = "nowhere".to_string();
        assert!(state.validate().is_err());
    }
}
