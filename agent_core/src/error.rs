//! Engine errors.
//!
//! Not-found conditions are never errors in the engine; they surface as
//! `None`/`false` plus a logged warning. What remains here is validation,
//! import, and provider failures.

use sandbox_rules::RulesError;
use thiserror::Error;

use crate::llm::LlmError;

/// Errors produced by the simulation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A value failed world-model validation.
    #[error("validation failed: {0}")]
    Validation(#[from] RulesError),

    /// A prompt template name is not known.
    #[error("unknown prompt template: {0}")]
    UnknownTemplate(String),

    /// A snapshot could not be imported.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while saving or loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A target-effect handler refused an action.
    #[error("transition failed for action {action_id}: {reason}")]
    Transition { action_id: String, reason: String },

    /// An agent disappeared while a response was being generated.
    #[error("agent {0} is no longer registered")]
    AgentMissing(String),

    /// The text-generation provider failed after all retries.
    #[error("text generation failed: {0}")]
    Llm(#[from] LlmError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
