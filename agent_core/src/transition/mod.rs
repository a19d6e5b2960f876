//! State Transition - maps an action and a world state to the next world state.
//!
//! Transitions never mutate their input; they return a fresh [`GameState`].
//! Relationship scoring is not done here, the session runs the trust map
//! separately after the transition.

use sandbox_rules::{Action, ActionType, AgentId, GameState, TargetType};
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, EngineResult};

/// Per-target-type effects of physical and item actions.
///
/// Every hook defaults to doing nothing. Implementors mutate the supplied
/// state copy; returning an error rejects the action and the caller keeps
/// the previous state.
pub trait TargetEffects: Send + Sync {
    fn on_character(
        &self,
        _action: &Action,
        _target: &AgentId,
        _state: &mut GameState,
    ) -> EngineResult<()> {
        Ok(())
    }

    fn on_environment(
        &self,
        _action: &Action,
        _target_id: &str,
        _state: &mut GameState,
    ) -> EngineResult<()> {
        Ok(())
    }

    fn on_item(&self, _action: &Action, _item_id: &str, _state: &mut GameState) -> EngineResult<()> {
        Ok(())
    }
}

/// The default effect set: targets are resolved but left unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTargetEffects;

impl TargetEffects for NoTargetEffects {}

/// What an action's target id resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    Agent,
    Object,
    Location,
}

/// Resolve a target id among the player, the NPCs, and the objects of the
/// current location. Environment targets may also name a known location.
pub fn resolve_target(state: &GameState, target_type: TargetType, id: &str) -> Option<ResolvedTarget> {
    if state.find_agent(&AgentId::new(id)).is_some() {
        return Some(ResolvedTarget::Agent);
    }
    if state.find_object(id).is_some() {
        return Some(ResolvedTarget::Object);
    }
    if target_type == TargetType::Environment && state.environment.locations.contains_key(id) {
        return Some(ResolvedTarget::Location);
    }
    None
}

/// Outcome of [`StateTransition::apply_transitions`].
#[derive(Debug)]
pub struct TransitionBatch {
    pub state: GameState,
    /// Action ids that failed, with the reason. Their effects were skipped.
    pub failures: Vec<(String, EngineError)>,
}

/// Applies actions to world state through a pluggable effect set.
pub struct StateTransition {
    effects: Box<dyn TargetEffects>,
}

impl std::fmt::Debug for StateTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTransition").finish_non_exhaustive()
    }
}

impl Default for StateTransition {
    fn default() -> Self {
        Self::new(Box::new(NoTargetEffects))
    }
}

impl StateTransition {
    pub fn new(effects: Box<dyn TargetEffects>) -> Self {
        Self { effects }
    }

    /// Produce the state that follows `action`.
    ///
    /// An unresolvable target is not an error: the input state is returned
    /// unchanged and a warning is logged.
    #[instrument(skip_all, fields(action = action.id()))]
    pub fn apply(&self, action: &Action, state: &GameState) -> EngineResult<GameState> {
        match action.action_type() {
            ActionType::Dialogue => {
                let mut next = state.clone();
                next.touch();
                Ok(next)
            }
            ActionType::Action | ActionType::Item => self.apply_targeted(action, state),
        }
    }

    fn apply_targeted(&self, action: &Action, state: &GameState) -> EngineResult<GameState> {
        let target_type = action.target_type();
        let target_id = match (target_type, action.target_id()) {
            (TargetType::None, _) | (_, None) => {
                let mut next = state.clone();
                next.touch();
                return Ok(next);
            }
            (_, Some(id)) => id,
        };

        let Some(resolved) = resolve_target(state, target_type, target_id) else {
            warn!(
                target = target_id,
                target_type = ?target_type,
                "transition target not found, state unchanged"
            );
            return Ok(state.clone());
        };
        debug!(target = target_id, resolved = ?resolved, "transition target resolved");

        let mut next = state.clone();
        match target_type {
            TargetType::Character => {
                self.effects
                    .on_character(action, &AgentId::new(target_id), &mut next)?
            }
            TargetType::Environment => self.effects.on_environment(action, target_id, &mut next)?,
            TargetType::Item => self.effects.on_item(action, target_id, &mut next)?,
            TargetType::None => {}
        }
        next.touch();
        Ok(next)
    }

    /// Fold a list of actions through [`apply`](Self::apply). A failing
    /// action is recorded and skipped; the rest still run.
    pub fn apply_transitions(&self, actions: &[Action], state: &GameState) -> TransitionBatch {
        let mut current = state.clone();
        let mut failures = Vec::new();
        for action in actions {
            match self.apply(action, &current) {
                Ok(next) => current = next,
                Err(err) => {
                    warn!(action = action.id(), error = %err, "transition failed, skipping");
                    failures.push((action.id().to_string(), err));
                }
            }
        }
        TransitionBatch {
            state: current,
            failures,
        }
    }
}

/// Apply one action with the default no-op effects.
pub fn apply(action: &Action, state: &GameState) -> EngineResult<GameState> {
    StateTransition::default().apply(action, state)
}
