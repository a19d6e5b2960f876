//! # Agent Core
//!
//! The simulation engine of the tavern sandbox. This crate drives the world
//! model from `sandbox_rules`: it keeps agents and relationships consistent,
//! remembers what happened, decides how NPCs react, and assembles prompts
//! for an external text-generation provider.
//!
//! ## Core Components
//!
//! - **registry**: Canonical agent records, kept in lockstep with the world state
//! - **trust**: Pairwise relationships and the sentiment scoring of actions
//! - **memory** / **history**: Bounded stores of what agents remember and what happened
//! - **transition**: Pure `(action, state) -> state` updates
//! - **policy**: The response state machine deciding how agents react
//! - **prompt** / **llm**: Prompt templates and the rate-limited provider queue
//! - **persistence**: Whole-session JSON snapshots
//! - **session**: The single owner tying all of the above together
//!
//! ## Design Philosophy
//!
//! - **Explicit ownership**: Services are plain values owned by a [`GameSession`], never globals
//! - **Not found is not an error**: Missing agents or relationships yield `None` and a warning
//! - **Deterministic when asked**: Randomness comes from an injectable, seedable generator

pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod memory;
pub mod persistence;
pub mod policy;
pub mod prompt;
pub mod registry;
pub mod session;
pub mod transition;
pub mod trust;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use history::{HistoryEntry, HistoryEvent, HistoryKind, HistoryLog};
pub use memory::{Importance, Memory, MemoryId, MemoryStore, MemoryType};
pub use persistence::Snapshot;
pub use policy::{AgentResponse, DecisionType, ResponsePolicy, ResponseType, SceneResponse};
pub use prompt::{PromptBuilder, PromptContext, PromptTemplate};
pub use registry::AgentRegistry;
pub use session::{GameSession, TurnOutcome};
pub use transition::{StateTransition, TargetEffects};
pub use trust::{Relationship, RelationshipLabel, RelationshipPatch, TrustMap};
