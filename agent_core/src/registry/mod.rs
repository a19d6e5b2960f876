//! Agent Registry - canonical agent records kept in lockstep with the world root.
//!
//! The registry owns the [`GameState`] it mirrors into, so every mutation
//! writes the player slot or the NPC list in the same call. Nothing else
//! holds a mutable handle to the agent records.

use chrono::Utc;
use sandbox_rules::{Agent, AgentId, AgentPatch, AgentTemplate, AgentType, GameState, RelationshipView};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::trust::RelationshipMirror;

/// Stores every agent by id and keeps the world state consistent with it.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, Agent>,
    world: GameState,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new(GameState::default())
    }
}

impl AgentRegistry {
    /// Build a registry around a world, indexing its player and NPCs.
    pub fn new(world: GameState) -> Self {
        let mut registry = Self {
            agents: BTreeMap::new(),
            world,
        };
        registry.reindex_from_world();
        registry
    }

    /// Rebuild a registry from a world plus the non-world agents (gm, environment).
    pub fn from_parts(world: GameState, agents: impl IntoIterator<Item = Agent>) -> Self {
        let mut registry = Self::new(world);
        for agent in agents {
            if agent.id == registry.world.player.id || agent.is_npc() {
                continue;
            }
            registry.agents.insert(agent.id.clone(), agent);
        }
        registry
    }

    /// Register an agent, assigning an id if absent. Upserts by id.
    ///
    /// Re-registering an id keeps the existing record's creation time,
    /// relationship projections and memory ids; the trust map and memory
    /// store still hold those entries.
    pub fn register(&mut self, mut agent: Agent) -> Agent {
        if agent.id.as_str().is_empty() {
            agent.id = AgentId::generate(agent.agent_type);
        }

        let now = Utc::now();
        match self.agents.get(&agent.id) {
            Some(existing) => {
                agent.created_at = existing.created_at;
                for (other, view) in existing.relationships() {
                    agent.project_relationship(other.clone(), view.clone());
                }
                for memory_id in &existing.memory_ids {
                    if !agent.memory_ids.contains(memory_id) {
                        agent.memory_ids.push(memory_id.clone());
                    }
                }
            }
            None => agent.created_at = now,
        }
        agent.updated_at = now;

        debug!(agent = %agent.id, kind = agent.agent_type.as_str(), "registered agent");
        self.agents.insert(agent.id.clone(), agent.clone());
        self.sync_to_world(&agent);
        agent
    }

    /// Register a fresh NPC stamped from a template.
    pub fn register_from_template(
        &mut self,
        template: AgentTemplate,
        name: impl Into<String>,
        location: impl Into<String>,
    ) -> Agent {
        self.register(template.instantiate(name, location))
    }

    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    /// All agents of one type, ordered by id.
    pub fn all_by_type(&self, agent_type: AgentType) -> Vec<&Agent> {
        self.agents
            .values()
            .filter(|a| a.agent_type == agent_type)
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Apply a partial update. Returns the updated record, or `None` if unknown.
    pub fn update(&mut self, id: &AgentId, patch: AgentPatch) -> Option<Agent> {
        let Some(agent) = self.agents.get_mut(id) else {
            warn!(agent = %id, "update skipped: unknown agent");
            return None;
        };
        agent.apply_patch(patch);
        let updated = agent.clone();
        self.sync_to_world(&updated);
        Some(updated)
    }

    /// Remove an NPC. The player, game master and environment agents are
    /// never removed.
    pub fn remove(&mut self, id: &AgentId) -> bool {
        let Some(agent) = self.agents.get(id) else {
            warn!(agent = %id, "remove skipped: unknown agent");
            return false;
        };
        if id.is_reserved() || !agent.is_npc() {
            warn!(agent = %id, kind = agent.agent_type.as_str(), "refusing to remove non-NPC agent");
            return false;
        }
        self.agents.remove(id);
        self.world.remove_npc(id);
        debug!(agent = %id, "removed agent");
        true
    }

    /// NPCs at `location`, followed by the game master if registered.
    pub fn scene_participants(&self, location: &str) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .agents
            .values()
            .filter(|a| a.is_npc() && a.location == location)
            .map(|a| a.id.clone())
            .collect();
        let gm = AgentId::gm();
        if self.agents.contains_key(&gm) {
            ids.push(gm);
        }
        ids
    }

    /// Read-only view of the world root.
    pub fn world(&self) -> &GameState {
        &self.world
    }

    /// Mutate the world root, then re-index agents from it so both views agree.
    pub fn update_world<R>(&mut self, f: impl FnOnce(&mut GameState) -> R) -> R {
        let result = f(&mut self.world);
        self.reindex_from_world();
        result
    }

    /// Replace the world root wholesale (e.g. with a transition result).
    pub fn replace_world(&mut self, world: GameState) {
        self.world = world;
        self.reindex_from_world();
    }

    /// Consume the registry into its world and full agent list.
    pub fn into_parts(self) -> (GameState, Vec<Agent>) {
        (self.world, self.agents.into_values().collect())
    }

    fn sync_to_world(&mut self, agent: &Agent) {
        if agent.id.as_str() == AgentId::PLAYER {
            self.world.player = agent.clone();
            self.world.touch();
        } else if agent.is_npc() {
            self.world.upsert_npc(agent.clone());
        }
    }

    fn reindex_from_world(&mut self) {
        self.agents
            .retain(|_, agent| !agent.is_npc() && agent.id.as_str() != AgentId::PLAYER);
        self.agents
            .insert(self.world.player.id.clone(), self.world.player.clone());
        for npc in &self.world.agents {
            self.agents.insert(npc.id.clone(), npc.clone());
        }
    }
}

impl RelationshipMirror for AgentRegistry {
    fn mirror(&mut self, a: &AgentId, b: &AgentId, view: &RelationshipView) {
        for (owner, other) in [(a, b), (b, a)] {
            let Some(agent) = self.agents.get_mut(owner) else {
                warn!(agent = %owner, "relationship mirror skipped: unknown agent");
                continue;
            };
            agent.project_relationship(other.clone(), view.clone());
            let updated = agent.clone();
            self.sync_to_world(&updated);
        }
    }

    fn unmirror(&mut self, a: &AgentId, b: &AgentId) {
        for (owner, other) in [(a, b), (b, a)] {
            if let Some(agent) = self.agents.get_mut(owner) {
                agent.forget_relationship(other);
                let updated = agent.clone();
                self.sync_to_world(&updated);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::{RelationshipPatch, TrustMap};
    use sandbox_rules::Emotion;

    fn registry_with_cast() -> AgentRegistry {
        let mut registry = AgentRegistry::default();
        registry.register(Agent::new(AgentId::gm(), "Narrator", AgentType::Gm));
        registry
    }

    #[test]
    fn test_register_assigns_id() {
        let mut registry = AgentRegistry::default();
        let agent = registry.register(Agent::new("", "Anon", AgentType::Npc));
        assert!(agent.id.as_str().starts_with("npc_"));
        assert!(registry.get(&agent.id).is_some());
        assert!(registry.world().npc(&agent.id).is_some());
    }

    #[test]
    fn test_register_upsert_preserves_created_at() {
        let mut registry = AgentRegistry::default();
        let first = registry.register(Agent::new("npc_1", "Mira", AgentType::Npc));
        let second = registry.register(Agent::new("npc_1", "Mira the Bold", AgentType::Npc));
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(registry.all_by_type(AgentType::Npc).len(), 1);
        assert_eq!(registry.world().agents.len(), 1);
        assert_eq!(registry.world().agents[0].name, "Mira the Bold");
    }

    #[test]
    fn test_update_syncs_player_slot() {
        let mut registry = AgentRegistry::default();
        let updated = registry
            .update(&AgentId::player(), AgentPatch::emotion(Emotion::Happy, 40))
            .unwrap();
        assert_eq!(updated.current_emotion, Emotion::Happy);
        assert_eq!(registry.world().player.current_emotion, Emotion::Happy);
    }

    #[test]
    fn test_update_syncs_npc_list() {
        let mut registry = AgentRegistry::default();
        let npc = registry.register(Agent::npc("Bran"));
        registry.update(&npc.id, AgentPatch::location("forge"));
        assert_eq!(registry.world().npc(&npc.id).unwrap().location, "forge");
    }

    #[test]
    fn test_update_unknown_returns_none() {
        let mut registry = AgentRegistry::default();
        assert!(registry
            .update(&AgentId::new("ghost"), AgentPatch::default())
            .is_none());
    }

    #[test]
    fn test_remove_reserved_is_refused() {
        let mut registry = registry_with_cast();
        assert!(!registry.remove(&AgentId::player()));
        assert!(!registry.remove(&AgentId::gm()));
        assert!(registry.get(&AgentId::gm()).is_some());
    }

    #[test]
    fn test_register_upsert_keeps_projections_and_memories() {
        let mut registry = AgentRegistry::default();
        let mut first = Agent::new("npc_1", "Mira", AgentType::Npc);
        first.memory_ids.push("mem_1".to_string());
        registry.register(first);
        let mut trust = TrustMap::new();
        trust.set_relationship(
            &mut registry,
            &AgentId::new("npc_1"),
            &AgentId::player(),
            &RelationshipPatch::default(),
        );

        let renamed = registry.register(Agent::new("npc_1", "Mira the Bold", AgentType::Npc));
        assert_eq!(renamed.relationships().len(), 1);
        assert_eq!(renamed.memory_ids, vec!["mem_1".to_string()]);
        let world_copy = registry.world().npc(&renamed.id).unwrap();
        assert_eq!(world_copy.name, "Mira the Bold");
        assert!(world_copy.relationship_with(&AgentId::player()).is_some());
    }

    #[test]
    fn test_remove_environment_is_refused() {
        let mut registry = AgentRegistry::default();
        registry.register(Agent::new(AgentId::environment(), "Environment", AgentType::Environment));
        assert!(!registry.remove(&AgentId::environment()));
        assert!(registry.contains(&AgentId::environment()));
    }

    #[test]
    fn test_remove_npc_updates_world() {
        let mut registry = AgentRegistry::default();
        let npc = registry.register(Agent::npc("Bran"));
        assert!(registry.remove(&npc.id));
        assert!(registry.world().agents.is_empty());
        assert!(!registry.remove(&npc.id));
    }

    #[test]
    fn test_scene_participants() {
        let mut registry = registry_with_cast();
        let here = registry.register(Agent::npc("Here").with_location("tavern"));
        registry.register(Agent::npc("Away").with_location("docks"));

        let scene = registry.scene_participants("tavern");
        assert_eq!(scene, vec![here.id, AgentId::gm()]);
    }

    #[test]
    fn test_update_world_reindexes() {
        let mut registry = AgentRegistry::default();
        let npc = registry.register(Agent::npc("Bran"));
        registry.update_world(|world| {
            world.remove_npc(&npc.id);
        });
        assert!(registry.get(&npc.id).is_none());
    }

    #[test]
    fn test_template_registration() {
        let mut registry = AgentRegistry::default();
        let merchant = registry.register_from_template(AgentTemplate::Merchant, "Tilda", "square");
        assert_eq!(registry.world().npcs_at("square")[0].id, merchant.id);
    }
}
