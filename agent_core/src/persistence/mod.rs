//! Snapshot persistence.
//!
//! A snapshot is a full copy of the session: `{gameState, history, agents}`
//! plus the relationship and memory stores. Import is all-or-nothing: the
//! raw JSON shape is checked first, then every entity is decoded and
//! validated, and only a fully valid snapshot is handed back to the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, instrument};

use sandbox_rules::{Agent, AgentId, GameState};

use crate::error::{EngineError, EngineResult};
use crate::history::HistoryEntry;
use crate::memory::Memory;
use crate::trust::Relationship;

/// Serialized session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub game_state: GameState,
    pub history: Vec<HistoryEntry>,
    /// Every registered agent, including the reserved ones.
    pub agents: Vec<Agent>,
    /// Absent in older snapshots; rebuilt from the agent projections then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
    #[serde(default)]
    pub memories: Vec<Memory>,
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::InvalidSnapshot(message.into())
}

/// Check the top-level layout before decoding anything.
pub fn validate_shape(raw: &Value) -> EngineResult<()> {
    let root = raw
        .as_object()
        .ok_or_else(|| invalid("snapshot must be a JSON object"))?;

    match root.get("gameState") {
        Some(Value::Object(_)) => {}
        Some(_) => return Err(invalid("gameState must be an object")),
        None => return Err(invalid("missing gameState")),
    }
    for key in ["history", "agents"] {
        match root.get(key) {
            Some(Value::Array(_)) => {}
            Some(_) => return Err(invalid(format!("{key} must be an array"))),
            None => return Err(invalid(format!("missing {key}"))),
        }
    }
    for key in ["relationships", "memories"] {
        if let Some(value) = root.get(key) {
            if !value.is_array() && !value.is_null() {
                return Err(invalid(format!("{key} must be an array")));
            }
        }
    }
    Ok(())
}

impl Snapshot {
    /// Parse and fully validate a snapshot document.
    #[instrument(skip_all)]
    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        let raw: Value = serde_json::from_str(text)?;
        Self::from_value(raw)
    }

    pub fn from_value(raw: Value) -> EngineResult<Self> {
        validate_shape(&raw)?;
        let snapshot: Snapshot =
            serde_json::from_value(raw).map_err(|e| invalid(format!("malformed entity: {e}")))?;
        snapshot.validate()?;
        debug!(
            agents = snapshot.agents.len(),
            history = snapshot.history.len(),
            "snapshot decoded"
        );
        Ok(snapshot)
    }

    /// Per-entity checks that serde alone cannot express.
    pub fn validate(&self) -> EngineResult<()> {
        self.game_state.validate()?;

        let mut ids = BTreeSet::new();
        for agent in &self.agents {
            agent.validate()?;
            if !ids.insert(agent.id.clone()) {
                return Err(invalid(format!("duplicate agent id {}", agent.id)));
            }
        }
        if !ids.contains(&AgentId::player()) {
            return Err(invalid("agents must include the player"));
        }
        for npc in &self.game_state.agents {
            if !ids.contains(&npc.id) {
                return Err(invalid(format!("world NPC {} missing from agents", npc.id)));
            }
        }

        if let Some(relationships) = &self.relationships {
            for rel in relationships {
                if rel.agent_a == rel.agent_b {
                    return Err(invalid(format!("self relationship for {}", rel.agent_a)));
                }
                for id in [&rel.agent_a, &rel.agent_b] {
                    if !ids.contains(id) {
                        return Err(invalid(format!("relationship references unknown agent {id}")));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write to `path` through a temporary sibling file, so a crash never
    /// leaves a half-written snapshot behind.
    pub fn save_to(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        let json = self.to_json_string()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    pub fn load_from(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> Snapshot {
        let state = GameState::default();
        Snapshot {
            agents: vec![state.player.clone()],
            game_state: state,
            history: Vec::new(),
            relationships: Some(Vec::new()),
            memories: Vec::new(),
        }
    }

    #[test]
    fn test_shape_checks() {
        assert!(validate_shape(&json!([])).is_err());
        assert!(validate_shape(&json!({"history": [], "agents": []})).is_err());
        assert!(validate_shape(&json!({"gameState": {}, "history": {}, "agents": []})).is_err());
        assert!(validate_shape(&json!({"gameState": {}, "history": [], "agents": 3})).is_err());
        assert!(validate_shape(&json!({"gameState": {}, "history": [], "agents": [], "memories": "x"})).is_err());
        assert!(validate_shape(&json!({"gameState": {}, "history": [], "agents": []})).is_ok());
    }

    #[test]
    fn test_top_level_keys() {
        let value = serde_json::to_value(snapshot()).unwrap();
        assert!(value["gameState"].is_object());
        assert!(value["history"].is_array());
        assert!(value["agents"].is_array());
    }

    #[test]
    fn test_round_trip_text() {
        let original = snapshot();
        let text = original.to_json_string().unwrap();
        assert_eq!(Snapshot::from_json_str(&text).unwrap(), original);
    }

    #[test]
    fn test_rejects_malformed_entities() {
        let mut value = serde_json::to_value(snapshot()).unwrap();
        value["gameState"]["phase"] = json!("intermission");
        let err = Snapshot::from_value(value).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSnapshot(_)));
    }

    #[test]
    fn test_rejects_missing_player() {
        let mut value = serde_json::to_value(snapshot()).unwrap();
        value["agents"] = json!([]);
        assert!(Snapshot::from_value(value).is_err());
    }

    #[test]
    fn test_rejects_garbage_text() {
        assert!(matches!(
            Snapshot::from_json_str("{not json"),
            Err(EngineError::Json(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");
        let original = snapshot();
        original.save_to(&path).unwrap();
        assert!(!dir.path().join("save.json.tmp").exists());
        assert_eq!(Snapshot::load_from(&path).unwrap(), original);
    }
}
