//! Prompt construction for the text-generation provider.
//!
//! A prompt is a named template rendered against the current world state
//! plus caller-supplied context. Rendering is deterministic: the same state
//! and context always produce the same text.

use sandbox_rules::{Action, Agent, GameState, PersonalityTrait, Season, Weather};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

/// Named prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    AgentResponse,
    EnvironmentDescription,
    StoryProgression,
    DialogueGeneration,
    ActionResult,
    WorldBuilding,
    CharacterCreation,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 7] = [
        PromptTemplate::AgentResponse,
        PromptTemplate::EnvironmentDescription,
        PromptTemplate::StoryProgression,
        PromptTemplate::DialogueGeneration,
        PromptTemplate::ActionResult,
        PromptTemplate::WorldBuilding,
        PromptTemplate::CharacterCreation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptTemplate::AgentResponse => "agent_response",
            PromptTemplate::EnvironmentDescription => "environment_description",
            PromptTemplate::StoryProgression => "story_progression",
            PromptTemplate::DialogueGeneration => "dialogue_generation",
            PromptTemplate::ActionResult => "action_result",
            PromptTemplate::WorldBuilding => "world_building",
            PromptTemplate::CharacterCreation => "character_creation",
        }
    }

    /// Closing instruction for the model.
    fn instruction(&self) -> &'static str {
        match self {
            PromptTemplate::AgentResponse => {
                "Respond in character as the agent above, in one or two sentences."
            }
            PromptTemplate::EnvironmentDescription => {
                "Describe the current location vividly, focusing on what the player can see and hear."
            }
            PromptTemplate::StoryProgression => {
                "Suggest what happens next in the story, consistent with recent events."
            }
            PromptTemplate::DialogueGeneration => {
                "Write the agent's next line of dialogue, matching their dialogue style and mood."
            }
            PromptTemplate::ActionResult => {
                "Narrate the outcome of the action above in two or three sentences."
            }
            PromptTemplate::WorldBuilding => {
                "Expand the setting with one new detail that fits the existing lore."
            }
            PromptTemplate::CharacterCreation => {
                "Create a new character who fits this location, with name, appearance, personality, and goals."
            }
        }
    }

    fn shows_agent(&self) -> bool {
        matches!(
            self,
            PromptTemplate::AgentResponse
                | PromptTemplate::DialogueGeneration
                | PromptTemplate::ActionResult
        )
    }

    fn shows_lore(&self) -> bool {
        matches!(
            self,
            PromptTemplate::WorldBuilding | PromptTemplate::CharacterCreation
        )
    }
}

impl FromStr for PromptTemplate {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptTemplate::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EngineError::UnknownTemplate(s.to_string()))
    }
}

/// Caller-supplied context for a prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// The agent the prompt speaks for.
    pub agent: Option<Agent>,
    pub action: Option<Action>,
    pub history_summary: Option<String>,
    pub memories: Vec<String>,
    /// Free-form extra lines, rendered in key order.
    pub notes: BTreeMap<String, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_history(mut self, summary: impl Into<String>) -> Self {
        self.history_summary = Some(summary.into());
        self
    }

    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.memories.push(memory.into());
        self
    }

    pub fn with_note(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.notes.insert(key.into(), value.into());
        self
    }
}

/// World snapshot rendered at the top of every prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldContext {
    pub setting: String,
    pub location_name: String,
    pub location_description: String,
    pub time_of_day: String,
    pub day: u32,
    pub season: Season,
    pub weather: Weather,
    pub is_night: bool,
}

impl WorldContext {
    pub fn from_state(state: &GameState) -> Self {
        let time = &state.environment.time;
        let (location_name, location_description) = state
            .current_location()
            .map(|loc| (loc.name.clone(), loc.description.clone()))
            .unwrap_or_else(|| ("an unknown place".to_string(), String::new()));
        Self {
            setting: state.worldbook.setting.clone(),
            location_name,
            location_description,
            time_of_day: format!("{:02}:{:02}", time.hour, time.minute),
            day: time.day,
            season: time.season,
            weather: state.environment.weather,
            is_night: state.is_night(),
        }
    }
}

/// Renders prompt templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Render a template by name. Unknown names are an error.
    pub fn build_named(&self, name: &str, state: &GameState, context: &PromptContext) -> EngineResult<String> {
        let template = name.parse::<PromptTemplate>()?;
        Ok(self.build(template, state, context))
    }

    pub fn build(&self, template: PromptTemplate, state: &GameState, context: &PromptContext) -> String {
        let mut prompt = String::new();
        let world = WorldContext::from_state(state);

        if !world.setting.is_empty() {
            prompt.push_str("## Setting\n");
            prompt.push_str(&world.setting);
            prompt.push_str("\n\n");
        }

        prompt.push_str("## World State\n");
        let _ = writeln!(
            prompt,
            "Location: {}{}",
            world.location_name,
            if world.location_description.is_empty() {
                String::new()
            } else {
                format!(" - {}", world.location_description)
            }
        );
        let _ = writeln!(
            prompt,
            "Time: {} (Day {}), {} {:?}, {:?} weather",
            world.time_of_day,
            world.day,
            if world.is_night { "Night" } else { "Day" },
            world.season,
            world.weather
        );
        let present: Vec<&str> = state
            .npcs_at(&state.environment.current_location)
            .into_iter()
            .map(|a| a.name.as_str())
            .collect();
        if !present.is_empty() {
            let _ = writeln!(prompt, "Present: {}", present.join(", "));
        }
        prompt.push('\n');

        if template.shows_lore() && !state.worldbook.entries.is_empty() {
            prompt.push_str("## Lore\n");
            for entry in &state.worldbook.entries {
                let _ = writeln!(prompt, "- [{}] {}: {}", entry.category, entry.title, entry.content);
            }
            prompt.push('\n');
        }

        if template.shows_agent() {
            if let Some(agent) = &context.agent {
                render_agent(&mut prompt, agent);
            }
        }

        if let Some(action) = &context.action {
            prompt.push_str("## Current Event\n");
            let _ = writeln!(
                prompt,
                "{} ({}): {}",
                action.actor_id(),
                action.action_type().as_str(),
                action.content()
            );
            if let Some(target) = action.target_id() {
                let _ = writeln!(prompt, "Target: {}", target);
            }
            prompt.push('\n');
        }

        if let Some(summary) = context.history_summary.as_deref().filter(|s| !s.is_empty()) {
            prompt.push_str("## Recent History\n");
            prompt.push_str(summary);
            prompt.push_str("\n\n");
        }

        if !context.memories.is_empty() {
            prompt.push_str("## Relevant Memories\n");
            for memory in &context.memories {
                let _ = writeln!(prompt, "- {}", memory);
            }
            prompt.push('\n');
        }

        if !context.notes.is_empty() {
            prompt.push_str("## Notes\n");
            for (key, value) in &context.notes {
                let _ = writeln!(prompt, "- {}: {}", key, value);
            }
            prompt.push('\n');
        }

        prompt.push_str("## Task\n");
        prompt.push_str(template.instruction());
        prompt.push('\n');
        prompt
    }
}

fn render_agent(prompt: &mut String, agent: &Agent) {
    prompt.push_str("## Character\n");
    let _ = writeln!(prompt, "Name: {} ({})", agent.name, agent.agent_type.as_str());
    for (label, text) in [
        ("Description", &agent.description),
        ("Background", &agent.background),
        ("Appearance", &agent.appearance),
        ("Dialogue style", &agent.dialogue_style),
    ] {
        if !text.is_empty() {
            let _ = writeln!(prompt, "{}: {}", label, text);
        }
    }
    let traits: Vec<String> = PersonalityTrait::ALL
        .iter()
        .map(|t| format!("{} {}", t.as_str(), agent.personality.get(*t)))
        .collect();
    let _ = writeln!(prompt, "Personality: {}", traits.join(", "));
    let _ = writeln!(
        prompt,
        "Mood: {} ({})",
        agent.current_emotion.as_str(),
        agent.emotion_intensity
    );
    if !agent.goals.is_empty() {
        let _ = writeln!(prompt, "Goals: {}", agent.goals.join("; "));
    }
    if !agent.fears.is_empty() {
        let _ = writeln!(prompt, "Fears: {}", agent.fears.join("; "));
    }
    for (other, view) in agent.relationships() {
        let _ = writeln!(
            prompt,
            "Relationship with {}: {} (trust {}, intimacy {}, respect {})",
            other,
            view.relationship_type.as_str(),
            view.factors.trust,
            view.factors.intimacy,
            view.factors.respect
        );
    }
    prompt.push('\n');
}
