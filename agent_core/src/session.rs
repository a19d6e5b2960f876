//! Game session: one explicit owner for every engine service.
//!
//! A [`GameSession`] holds the registry (and through it the world state),
//! the trust map, memory, history, the response policy, and the
//! text-generation queue. Every turn flows through [`GameSession::submit_action`].

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use sandbox_rules::{
    Action, ActionTarget, Agent, AgentId, AgentPatch, AgentTemplate, AgentType, GameState,
    RelationshipFactor,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::history::{HistoryEntry, HistoryEvent, HistoryKind, HistoryLog, CONTEXT_SUMMARY_CHARS};
use crate::llm::{build_provider, GenerationRequest, GenerationResponse, RequestQueue, TextProvider};
use crate::memory::{Importance, MemoryContext, MemoryStore};
use crate::persistence::Snapshot;
use crate::policy::{ResponsePolicy, ResponseType, Scene, SceneResponse, CONTEXT_MEMORIES};
use crate::prompt::{PromptBuilder, PromptContext, PromptTemplate};
use crate::registry::AgentRegistry;
use crate::transition::{StateTransition, TransitionBatch};
use crate::trust::{Relationship, RelationshipLabel, RelationshipPatch, TrustMap};

/// Result of one submitted action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub action: Action,
    /// Actor/target relationship after the action's effect, if any applied.
    pub relationship: Option<Relationship>,
    pub responses: Vec<SceneResponse>,
}

/// A running game.
pub struct GameSession {
    config: EngineConfig,
    registry: AgentRegistry,
    trust: TrustMap,
    memory: MemoryStore,
    history: HistoryLog,
    policy: ResponsePolicy,
    transition: StateTransition,
    prompts: PromptBuilder,
    provider: Option<Arc<dyn TextProvider>>,
    queue: Option<RequestQueue>,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("agents", &self.registry.len())
            .field("relationships", &self.trust.len())
            .field("memories", &self.memory.len())
            .field("history", &self.history.len())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl GameSession {
    /// Start a session with a default world.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_world(config, GameState::default())
    }

    /// Start a session around an existing world. The game master and
    /// environment agents are added, then every pair gets a neutral
    /// relationship.
    pub fn with_world(config: EngineConfig, world: GameState) -> Self {
        let policy = match config.policy.seed {
            Some(seed) => ResponsePolicy::seeded(seed),
            None => ResponsePolicy::new(),
        }
        .with_physical_reactions(config.policy.physical_reactions);
        let mut session = Self {
            registry: AgentRegistry::new(world),
            trust: TrustMap::new(),
            memory: MemoryStore::new(config.memory.max_memories, config.memory.recency_decay_rate),
            history: HistoryLog::new(config.history.max_length),
            policy,
            transition: StateTransition::default(),
            prompts: PromptBuilder::new(),
            provider: None,
            queue: None,
            config,
        };

        for (id, name, agent_type) in [
            (AgentId::gm(), "Game Master", AgentType::Gm),
            (AgentId::environment(), "Environment", AgentType::Environment),
        ] {
            if !session.registry.contains(&id) {
                session.registry.register(Agent::new(id, name, agent_type));
            }
        }
        let ids = session.registry.ids();
        let created = session.trust.initialize_pairs(&mut session.registry, &ids);
        session.history.record_system("Session started");
        info!(agents = ids.len(), relationships = created, "session started");
        session
    }

    /// Replace the response policy, e.g. with a differently seeded one.
    pub fn with_policy(mut self, policy: ResponsePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_transition(mut self, transition: StateTransition) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_trust_map(mut self, mut trust: TrustMap) -> Self {
        let ids = self.registry.ids();
        trust.initialize_pairs(&mut self.registry, &ids);
        self.trust = trust;
        self
    }

    /// Use `provider` for text generation instead of the configured one.
    /// Any running queue is cancelled.
    pub fn with_provider(mut self, provider: Arc<dyn TextProvider>) -> Self {
        self.queue = None;
        self.provider = Some(provider);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn world(&self) -> &GameState {
        self.registry.world()
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn trust(&self) -> &TrustMap {
        &self.trust
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryStore {
        &mut self.memory
    }

    /// Mutate the world state directly (locations, time, flags).
    pub fn update_world<R>(&mut self, f: impl FnOnce(&mut GameState) -> R) -> R {
        self.registry.update_world(f)
    }

    /// Register an agent and give it a neutral relationship with everyone.
    pub fn add_agent(&mut self, agent: Agent) -> Agent {
        let agent = self.registry.register(agent);
        self.relate_to_everyone(&agent.id);
        self.registry.get(&agent.id).cloned().unwrap_or(agent)
    }

    /// Register an NPC from a named template (merchant, guard, ...).
    pub fn add_agent_from_template(
        &mut self,
        template: &str,
        name: impl Into<String>,
        location: impl Into<String>,
    ) -> EngineResult<Agent> {
        let template: AgentTemplate = template.parse()?;
        let agent = self.registry.register_from_template(template, name, location);
        self.relate_to_everyone(&agent.id);
        Ok(self.registry.get(&agent.id).cloned().unwrap_or(agent))
    }

    fn relate_to_everyone(&mut self, id: &AgentId) {
        for other in self.registry.ids() {
            if &other != id && self.trust.get_relationship(id, &other).is_none() {
                self.trust
                    .set_relationship(&mut self.registry, id, &other, &RelationshipPatch::default());
            }
        }
    }

    pub fn update_agent(&mut self, id: &AgentId, patch: AgentPatch) -> Option<Agent> {
        self.registry.update(id, patch)
    }

    /// Remove an agent together with its relationships.
    pub fn remove_agent(&mut self, id: &AgentId) -> bool {
        if !self.registry.remove(id) {
            return false;
        }
        let dropped = self.trust.forget_agent(&mut self.registry, id);
        debug!(agent = %id, relationships = dropped, "agent removed from session");
        true
    }

    pub fn set_relationship(
        &mut self,
        a: &AgentId,
        b: &AgentId,
        patch: &RelationshipPatch,
    ) -> Option<Relationship> {
        self.trust.set_relationship(&mut self.registry, a, b, patch)
    }

    pub fn adjust_relationship(
        &mut self,
        a: &AgentId,
        b: &AgentId,
        factor: RelationshipFactor,
        delta: i32,
    ) -> Option<Relationship> {
        self.trust.adjust_factor(&mut self.registry, a, b, factor, delta)
    }

    pub fn analyze_relationship(&self, a: &AgentId, b: &AgentId) -> Option<RelationshipLabel> {
        self.trust.analyze_relationship(a, b)
    }

    /// Run one action through the whole pipeline.
    ///
    /// The state transition runs first; if it fails nothing else happens and
    /// the world is left as it was. Otherwise the action is logged, its
    /// relationship effect applied, every agent in the scene responds, and
    /// each responder remembers its response.
    #[instrument(skip_all, fields(action = action.id(), kind = action.action_type().as_str()))]
    pub fn submit_action(&mut self, action: Action) -> EngineResult<TurnOutcome> {
        let next = self.transition.apply(&action, self.registry.world())?;
        self.registry.replace_world(next);
        self.history.record_action(&action);

        let relationship = self.trust.process_action_effect(&mut self.registry, &action);

        let mut scene = Scene {
            registry: &mut self.registry,
            trust: &self.trust,
            history: &mut self.history,
            memory: &mut self.memory,
        };
        let mut responses = self.policy.generate_scene_responses(&mut scene, &action);

        for entry in &mut responses {
            self.remember_response(&action, entry);
        }

        info!(responses = responses.len(), "turn resolved");
        Ok(TurnOutcome {
            action,
            relationship,
            responses,
        })
    }

    /// Parse player input and submit it.
    pub fn submit_text(&mut self, input: &str, target: ActionTarget) -> EngineResult<TurnOutcome> {
        let action = Action::from_free_text(AgentId::player(), input, target);
        self.submit_action(action)
    }

    /// Fold a list of actions through the state transition only. Failed
    /// actions are skipped and reported.
    pub fn apply_transitions(&mut self, actions: &[Action]) -> Vec<(String, EngineError)> {
        let TransitionBatch { state, failures } =
            self.transition.apply_transitions(actions, self.registry.world());
        self.registry.replace_world(state);
        for action in actions {
            if !failures.iter().any(|(id, _)| id == action.id()) {
                self.history.record_action(action);
            }
        }
        failures
    }

    fn remember_response(&mut self, action: &Action, entry: &mut SceneResponse) {
        if !self.registry.contains(&entry.agent_id) {
            return;
        }
        if entry.history_id.is_none() {
            let response = &entry.response;
            let recorded = self.history.record_npc_response(
                entry.agent_id.clone(),
                response.response_type,
                response.content.clone(),
                Some(response.emotion),
                Some(action.id().to_string()),
            );
            entry.history_id = Some(recorded.id.clone());
        }

        let Some(history_entry) = entry
            .history_id
            .as_deref()
            .and_then(|id| self.history.entries().find(|e| e.id == id))
            .cloned()
        else {
            warn!(agent = %entry.agent_id, "response evicted from history before it was remembered");
            return;
        };

        let importance = if action.targets_agent(&entry.agent_id) {
            Importance::High
        } else {
            Importance::Medium
        };
        let memory_id = self.memory.remember_entry(&history_entry, importance);

        if let Some(agent) = self.registry.get(&entry.agent_id) {
            let mut memory_ids = agent.memory_ids.clone();
            memory_ids.push(memory_id.to_string());
            self.registry.update(
                &entry.agent_id,
                AgentPatch {
                    memory_ids: Some(memory_ids),
                    ..Default::default()
                },
            );
        }
    }

    /// Render a named prompt against the current world.
    pub fn build_prompt(&self, template: &str, context: &PromptContext) -> EngineResult<String> {
        self.prompts.build_named(template, self.registry.world(), context)
    }

    /// Prompt context for an agent's next line: the agent, the last action,
    /// recent history, and what the agent remembers. Reading memories here
    /// does not count as an access.
    pub fn agent_prompt_context(&self, agent_id: &AgentId) -> Option<PromptContext> {
        let agent = self.registry.get(agent_id)?.clone();
        let mut context = PromptContext::new()
            .with_agent(agent)
            .with_history(self.history.summarize(CONTEXT_SUMMARY_CHARS));

        let last_action = self
            .history
            .get_by_type(HistoryKind::Action)
            .into_iter()
            .rev()
            .find_map(|entry| match &entry.event {
                HistoryEvent::Action { action } => Some(action.clone()),
                _ => None,
            });
        if let Some(action) = last_action {
            context = context.with_action(action);
        }

        let memories = self
            .memory
            .rank_relevant(&MemoryContext::for_agent(agent_id.clone()), CONTEXT_MEMORIES);
        for memory in memories {
            context = context.with_memory(memory.content.clone());
        }
        Some(context)
    }

    fn request_queue(&mut self) -> EngineResult<&RequestQueue> {
        if self.queue.as_ref().is_some_and(RequestQueue::is_cancelled) {
            self.queue = None;
        }
        if self.queue.is_none() {
            let provider = match &self.provider {
                Some(provider) => provider.clone(),
                None => build_provider(&self.config.llm)?,
            };
            info!(provider = provider.name(), "starting text generation queue");
            self.queue = Some(RequestQueue::spawn(provider, self.config.llm.request_delay()));
        }
        self.queue
            .as_ref()
            .ok_or_else(|| EngineError::Config("text generation queue unavailable".to_string()))
    }

    /// Generate text for a prompt through the rate-limited queue. Does not
    /// touch game state.
    pub async fn generate(&mut self, prompt: String) -> EngineResult<GenerationResponse> {
        let request = GenerationRequest::from_prompt(self.config.llm.model.clone(), prompt)
            .with_temperature(self.config.llm.temperature)
            .with_max_tokens(self.config.llm.max_tokens);
        let queue = self.request_queue()?;
        Ok(queue.submit(request).await?)
    }

    /// Ask the text provider for an agent's next line and merge it into
    /// history. On failure the session is left exactly as it was.
    #[instrument(skip_all, fields(agent = %agent_id))]
    pub async fn narrate(&mut self, agent_id: &AgentId) -> EngineResult<HistoryEntry> {
        let context = self
            .agent_prompt_context(agent_id)
            .ok_or_else(|| EngineError::AgentMissing(agent_id.to_string()))?;
        let prompt = self.prompts.build(
            PromptTemplate::AgentResponse,
            self.registry.world(),
            &context,
        );
        let action_id = context.action.as_ref().map(|a| a.id().to_string());

        let generated = self.generate(prompt).await?;

        let emotion = self.registry.get(agent_id).map(|a| a.current_emotion);
        let entry = self
            .history
            .record_npc_response(
                agent_id.clone(),
                ResponseType::Dialogue,
                generated.content,
                emotion,
                action_id,
            )
            .clone();
        debug!(history = %entry.id, "narration merged");
        Ok(entry)
    }

    /// Reject the in-flight and pending generation requests.
    pub fn cancel_generation(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.cancel();
            info!("text generation cancelled");
        }
    }

    /// Copy the whole session into a snapshot.
    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot {
            game_state: self.registry.world().clone(),
            history: self.history.entries().cloned().collect(),
            agents: self.registry.all().cloned().collect(),
            relationships: Some(self.trust.all().cloned().collect()),
            memories: self.memory.all().to_vec(),
        }
    }

    /// Replace the session's state with a snapshot. The snapshot is
    /// validated in full first; on error nothing changes.
    #[instrument(skip_all)]
    pub fn import_snapshot(&mut self, snapshot: Snapshot) -> EngineResult<()> {
        snapshot.validate()?;
        let Snapshot {
            game_state,
            history,
            agents,
            relationships,
            memories,
        } = snapshot;

        let mut registry = AgentRegistry::from_parts(game_state, agents);
        let mut history_log = HistoryLog::new(self.config.history.max_length);
        history_log.replace_entries(history);

        match relationships {
            Some(relationships) => self.trust.replace_all(relationships),
            None => self.trust.rebuild_from_projections(registry.all()),
        }
        self.trust.mirror_all(&mut registry);
        self.memory.replace_all(memories);
        self.registry = registry;
        self.history = history_log;

        info!(
            agents = self.registry.len(),
            relationships = self.trust.len(),
            history = self.history.len(),
            "snapshot imported"
        );
        Ok(())
    }

    pub fn export_json(&self) -> EngineResult<String> {
        self.export_snapshot().to_json_string()
    }

    /// Parse, validate and import a snapshot document.
    pub fn import_json(&mut self, text: &str) -> EngineResult<()> {
        let snapshot = Snapshot::from_json_str(text)?;
        self.import_snapshot(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        self.export_snapshot().save_to(path)
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> EngineResult<()> {
        let snapshot = Snapshot::load_from(path)?;
        self.import_snapshot(snapshot)
    }
}
