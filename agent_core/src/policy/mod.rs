//! Agent Response Policy - decides how an agent reacts to an action.
//!
//! Response type is picked by an ordered decision list (first match wins):
//!
//! 1. dialogue aimed at the agent: DIALOGUE
//! 2. emotion intensity above 70: EMOTION
//! 3. a request or plea for help: DECISION
//! 4. trust below 20: DIALOGUE 30% of the time, otherwise REJECTION
//! 5. otherwise: DIALOGUE
//!
//! With physical reactions enabled, a physical action aimed at the agent
//! resolves to ACTION right after rule 1.
//!
//! Generating a response updates the agent's emotion when it changed and
//! appends dialogue responses to the history log.

mod generators;

pub use generators::{calculate_emotion_intensity, cooperation_score, DecisionType, Generated};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use sandbox_rules::{Action, ActionType, Agent, AgentId, AgentPatch, Emotion};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, EngineResult};
use crate::history::{HistoryLog, CONTEXT_SUMMARY_CHARS};
use crate::memory::{Memory, MemoryContext, MemoryStore};
use crate::prompt::PromptContext;
use crate::registry::AgentRegistry;
use crate::trust::{Relationship, TrustMap};

/// Emotion intensity above which an agent reacts emotionally.
pub const EMOTIONAL_THRESHOLD: u8 = 70;

/// Trust below which an agent may refuse to engage.
pub const LOW_TRUST_THRESHOLD: u8 = 20;

/// Chance that a low-trust agent still talks.
pub const LOW_TRUST_DIALOGUE_CHANCE: f64 = 0.3;

/// Memories pulled into each response context.
pub const CONTEXT_MEMORIES: usize = 5;

const REQUEST_KEYWORDS: &[&str] = &["请求", "帮助", "帮忙", "request", "help"];

/// What kind of reaction an agent produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Dialogue,
    /// A physical reaction.
    Action,
    Emotion,
    Decision,
    Rejection,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Dialogue => "dialogue",
            ResponseType::Action => "action",
            ResponseType::Emotion => "emotion",
            ResponseType::Decision => "decision",
            ResponseType::Rejection => "rejection",
        }
    }
}

/// An agent's reaction to an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub agent_id: AgentId,
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub content: String,
    pub emotion: Emotion,
    pub emotion_intensity: u8,
    #[serde(default)]
    pub decision: Option<DecisionType>,
    /// Action being responded to.
    pub action_id: String,
    pub timestamp: DateTime<Utc>,
}

impl AgentResponse {
    /// A refusal carrying an error message in place of generated text.
    pub fn failed(agent_id: AgentId, action: &Action, err: &EngineError) -> Self {
        Self {
            agent_id,
            response_type: ResponseType::Rejection,
            content: err.to_string(),
            emotion: Emotion::Neutral,
            emotion_intensity: 0,
            decision: None,
            action_id: action.id().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything the policy reads when an agent reacts.
#[derive(Debug, Clone)]
pub struct ResponseContext<'a> {
    pub action: &'a Action,
    pub agent: &'a Agent,
    /// Relationship between the actor and the responding agent.
    pub relationship: Option<&'a Relationship>,
    /// Recent history, truncated. The canned generators ignore it; it is
    /// handed to a text provider through [`ResponseContext::prompt_context`].
    pub history_summary: String,
    /// The agent's most relevant memories, best first. Same hand-off as
    /// `history_summary`.
    pub memories: Vec<Memory>,
}

impl ResponseContext<'_> {
    /// The same context shaped for a prompt template.
    pub fn prompt_context(&self) -> PromptContext {
        let mut prompt = PromptContext::new()
            .with_agent(self.agent.clone())
            .with_action(self.action.clone())
            .with_history(self.history_summary.clone());
        for memory in &self.memories {
            prompt = prompt.with_memory(memory.content.clone());
        }
        prompt
    }

    fn is_directed_at_agent(&self, action_type: ActionType) -> bool {
        self.action.action_type() == action_type && self.action.targets_agent(&self.agent.id)
    }

    fn is_request(&self) -> bool {
        let content = self.action.content().to_lowercase();
        REQUEST_KEYWORDS.iter().any(|k| content.contains(k))
    }
}

/// The mutable services a scene response touches.
pub struct Scene<'a> {
    pub registry: &'a mut AgentRegistry,
    pub trust: &'a TrustMap,
    pub history: &'a mut HistoryLog,
    pub memory: &'a mut MemoryStore,
}

/// One agent's entry in a scene-wide response batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneResponse {
    pub agent_id: AgentId,
    pub response: AgentResponse,
    /// History entry written for the response, if any.
    #[serde(default)]
    pub history_id: Option<String>,
}

/// Decides and generates agent reactions.
pub struct ResponsePolicy {
    rng: Box<dyn RngCore + Send>,
    physical_reactions: bool,
}

impl std::fmt::Debug for ResponsePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsePolicy")
            .field("physical_reactions", &self.physical_reactions)
            .finish_non_exhaustive()
    }
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponsePolicy {
    /// Policy drawing from an entropy-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    /// Reproducible policy for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(Box::new(StdRng::seed_from_u64(seed)))
    }

    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            rng,
            physical_reactions: false,
        }
    }

    /// Toggle the physical-reaction rule for actions aimed at an agent.
    pub fn with_physical_reactions(mut self, enabled: bool) -> Self {
        self.physical_reactions = enabled;
        self
    }

    /// Pick the response type for a context.
    pub fn determine_response_type(&mut self, context: &ResponseContext<'_>) -> ResponseType {
        if context.is_directed_at_agent(ActionType::Dialogue) {
            return ResponseType::Dialogue;
        }
        if self.physical_reactions && context.is_directed_at_agent(ActionType::Action) {
            return ResponseType::Action;
        }
        if context.agent.emotion_intensity > EMOTIONAL_THRESHOLD {
            return ResponseType::Emotion;
        }
        if context.is_request() {
            return ResponseType::Decision;
        }
        let low_trust = context
            .relationship
            .is_some_and(|rel| rel.factors.trust < LOW_TRUST_THRESHOLD);
        if low_trust {
            return if self.rng.gen::<f64>() < LOW_TRUST_DIALOGUE_CHANCE {
                ResponseType::Dialogue
            } else {
                ResponseType::Rejection
            };
        }
        ResponseType::Dialogue
    }

    /// Build a response without touching any state.
    pub fn generate_response(&mut self, context: &ResponseContext<'_>) -> AgentResponse {
        let response_type = self.determine_response_type(context);
        let agent = context.agent;
        let content = context.action.content();

        let mut decision = None;
        let generated = match response_type {
            ResponseType::Dialogue => generators::dialogue(self.rng.as_mut(), agent, content),
            ResponseType::Action => generators::physical(agent, content),
            ResponseType::Emotion => generators::emotion(agent),
            ResponseType::Decision => {
                let (generated, decided) = generators::decision(agent, context.relationship);
                decision = Some(decided);
                generated
            }
            ResponseType::Rejection => generators::rejection(agent),
        };

        let emotion_intensity = if generated.emotion == agent.current_emotion
            && generated.base_intensity == agent.emotion_intensity
        {
            agent.emotion_intensity
        } else {
            calculate_emotion_intensity(generated.base_intensity, agent.personality.neuroticism)
        };

        AgentResponse {
            agent_id: agent.id.clone(),
            response_type,
            content: generated.content,
            emotion: generated.emotion,
            emotion_intensity,
            decision,
            action_id: context.action.id().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Generate one agent's response and apply its side effects.
    pub fn respond(
        &mut self,
        scene: &mut Scene<'_>,
        action: &Action,
        agent_id: &AgentId,
    ) -> EngineResult<SceneResponse> {
        let agent = scene
            .registry
            .get(agent_id)
            .cloned()
            .ok_or_else(|| EngineError::AgentMissing(agent_id.to_string()))?;

        let memories = scene
            .memory
            .get_relevant(&MemoryContext::for_agent(agent_id.clone()).with_text(action.content()), CONTEXT_MEMORIES);
        let context = ResponseContext {
            action,
            agent: &agent,
            relationship: scene.trust.get_relationship(action.actor_id(), agent_id),
            history_summary: scene.history.summarize(CONTEXT_SUMMARY_CHARS),
            memories,
        };
        let response = self.generate_response(&context);

        if response.emotion != agent.current_emotion {
            debug!(
                agent = %agent_id,
                from = agent.current_emotion.as_str(),
                to = response.emotion.as_str(),
                "agent emotion changed"
            );
            scene.registry.update(
                agent_id,
                AgentPatch::emotion(response.emotion, response.emotion_intensity),
            );
        }

        let history_id = (response.response_type == ResponseType::Dialogue).then(|| {
            scene
                .history
                .record_npc_response(
                    agent_id.clone(),
                    response.response_type,
                    response.content.clone(),
                    Some(response.emotion),
                    Some(action.id().to_string()),
                )
                .id
                .clone()
        });

        Ok(SceneResponse {
            agent_id: agent_id.clone(),
            response,
            history_id,
        })
    }

    /// Run every agent in the actor's scene against an action.
    ///
    /// The scene is the NPCs at the actor's location (or the current world
    /// location when the actor has none), plus the game master. The actor
    /// never responds to itself. A failure for one agent becomes a
    /// REJECTION entry instead of aborting the batch.
    #[instrument(skip_all, fields(action = action.id()))]
    pub fn generate_scene_responses(
        &mut self,
        scene: &mut Scene<'_>,
        action: &Action,
    ) -> Vec<SceneResponse> {
        let location = scene
            .registry
            .get(action.actor_id())
            .map(|actor| actor.location.clone())
            .filter(|loc| !loc.is_empty())
            .unwrap_or_else(|| scene.registry.world().environment.current_location.clone());

        let participants: Vec<AgentId> = scene
            .registry
            .scene_participants(&location)
            .into_iter()
            .filter(|id| id != action.actor_id())
            .collect();
        debug!(location = %location, count = participants.len(), "generating scene responses");
        self.respond_all(scene, action, &participants)
    }

    /// Run the given agents against an action, in order. A failure for one
    /// agent becomes a REJECTION carrying the error message.
    pub fn respond_all(
        &mut self,
        scene: &mut Scene<'_>,
        action: &Action,
        participants: &[AgentId],
    ) -> Vec<SceneResponse> {
        participants
            .iter()
            .map(|agent_id| match self.respond(scene, action, agent_id) {
                Ok(response) => response,
                Err(err) => {
                    warn!(agent = %agent_id, error = %err, "response failed, recording rejection");
                    SceneResponse {
                        agent_id: agent_id.clone(),
                        response: AgentResponse::failed(agent_id.clone(), action, &err),
                        history_id: None,
                    }
                }
            })
            .collect()
    }
}
