//! Engine configuration, loaded from TOML.
//!
//! Every section and field has a default, so a partial file (or none at all)
//! yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::history::DEFAULT_MAX_HISTORY;
use crate::memory::{DEFAULT_DECAY_RATE, DEFAULT_MAX_MEMORIES};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history: HistoryConfig,
    pub memory: MemoryConfig,
    pub policy: PolicyConfig,
    pub llm: LlmConfig,
}

impl EngineConfig {
    /// Read a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_length: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_HISTORY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub max_memories: usize,
    /// Recency bonus lost per day since a memory was last touched.
    pub recency_decay_rate: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memories: DEFAULT_MAX_MEMORIES,
            recency_decay_rate: DEFAULT_DECAY_RATE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Fixed seed for the response policy. Entropy-seeded when absent.
    pub seed: Option<u64>,
    /// Answer physical actions aimed at an agent with a physical reaction,
    /// checked right after directed dialogue. Off by default.
    pub physical_reactions: bool,
}

/// Which text-generation backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Mock,
    Http,
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mock => "mock",
            ProviderKind::Http => "http",
            ProviderKind::Local => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    /// Chat-completions URL for the HTTP provider.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Minimum spacing between queued provider calls.
    pub request_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            endpoint: "http://localhost:8080/v1/chat/completions".to_string(),
            model: "mock".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 500,
            timeout_seconds: 30,
            max_retries: 3,
            request_delay_ms: 1000,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.history.max_length, 1000);
        assert_eq!(config.memory.max_memories, 1000);
        assert_eq!(config.llm.request_delay(), Duration::from_millis(1000));
        assert_eq!(config.llm.max_retries, 3);
    }

    #[test]
    fn test_partial_config() {
        let config = EngineConfig::from_toml_str(
            r#"
            [policy]
            seed = 42

            [llm]
            provider = "http"
            model = "gpt-4o-mini"
            max_retries = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.policy.seed, Some(42));
        assert!(!config.policy.physical_reactions);
        assert_eq!(config.llm.provider, ProviderKind::Http);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_retries, 1);
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.history.max_length, 1000);
    }

    #[test]
    fn test_bad_provider_is_config_error() {
        let err = EngineConfig::from_toml_str("[llm]\nprovider = \"carrier-pigeon\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[history]\nmax_length = 50\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.history.max_length, 50);
    }
}
