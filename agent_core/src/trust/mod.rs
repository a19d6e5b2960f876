//! Trust Map - the canonical store of pairwise agent relationships.
//!
//! There is exactly one record per unordered pair of agents: the key is the
//! two ids in sorted order, so factors are shared rather than per-direction.
//! Every write is mirrored into both agents' cached projections through a
//! [`RelationshipMirror`].

mod sentiment;

pub use sentiment::*;

use chrono::{DateTime, Utc};
use sandbox_rules::{
    Action, ActionType, Agent, AgentId, RelationshipFactor, RelationshipFactors, RelationshipType,
    RelationshipView, TargetType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Receives relationship writes so agent records can cache a projection.
pub trait RelationshipMirror {
    /// Project `view` onto both `a` and `b`.
    fn mirror(&mut self, a: &AgentId, b: &AgentId, view: &RelationshipView);

    /// Drop the projection between `a` and `b`.
    fn unmirror(&mut self, a: &AgentId, b: &AgentId);
}

/// Mirror that discards every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMirror;

impl RelationshipMirror for NoMirror {
    fn mirror(&mut self, _a: &AgentId, _b: &AgentId, _view: &RelationshipView) {}

    fn unmirror(&mut self, _a: &AgentId, _b: &AgentId) {}
}

/// A scored action recorded against a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEffect {
    pub action_id: String,
    pub action_type: ActionType,
    pub actor_id: AgentId,
    pub content: String,
    pub delta: SentimentDelta,
    pub timestamp: DateTime<Utc>,
}

/// A relationship between two agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Lower of the two ids.
    pub agent_a: AgentId,
    /// Higher of the two ids.
    pub agent_b: AgentId,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub factors: RelationshipFactors,
    #[serde(default)]
    pub history: Vec<RelationshipEffect>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    fn new(key: &PairKey) -> Self {
        let now = Utc::now();
        Self {
            agent_a: key.0.clone(),
            agent_b: key.1.clone(),
            relationship_type: RelationshipType::Stranger,
            factors: RelationshipFactors::default(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Storage key: both ids sorted and joined.
    pub fn key(&self) -> String {
        format!("{}_{}", self.agent_a, self.agent_b)
    }

    /// Check if this relationship involves an agent.
    pub fn involves(&self, id: &AgentId) -> bool {
        &self.agent_a == id || &self.agent_b == id
    }

    /// The agent on the other side from `id`.
    pub fn other(&self, id: &AgentId) -> Option<&AgentId> {
        if &self.agent_a == id {
            Some(&self.agent_b)
        } else if &self.agent_b == id {
            Some(&self.agent_a)
        } else {
            None
        }
    }

    pub fn label(&self) -> RelationshipLabel {
        RelationshipLabel::from_factors(&self.factors)
    }

    pub fn view(&self) -> RelationshipView {
        RelationshipView {
            relationship_type: self.relationship_type,
            factors: self.factors,
            updated_at: self.updated_at,
        }
    }
}

/// Partial relationship update. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipPatch {
    pub relationship_type: Option<RelationshipType>,
    pub trust: Option<u8>,
    pub intimacy: Option<u8>,
    pub respect: Option<u8>,
    pub loyalty: Option<u8>,
    pub dependency: Option<u8>,
}

impl RelationshipPatch {
    pub fn of_type(relationship_type: RelationshipType) -> Self {
        Self {
            relationship_type: Some(relationship_type),
            ..Default::default()
        }
    }

    /// Patch that sets a single factor.
    pub fn factor(factor: RelationshipFactor, value: u8) -> Self {
        let mut patch = Self::default();
        patch.set(factor, value);
        patch
    }

    pub fn set(&mut self, factor: RelationshipFactor, value: u8) {
        let slot = match factor {
            RelationshipFactor::Trust => &mut self.trust,
            RelationshipFactor::Intimacy => &mut self.intimacy,
            RelationshipFactor::Respect => &mut self.respect,
            RelationshipFactor::Loyalty => &mut self.loyalty,
            RelationshipFactor::Dependency => &mut self.dependency,
        };
        *slot = Some(value);
    }

    fn apply(&self, relationship: &mut Relationship) {
        if let Some(relationship_type) = self.relationship_type {
            relationship.relationship_type = relationship_type;
        }
        let factors = [
            (RelationshipFactor::Trust, self.trust),
            (RelationshipFactor::Intimacy, self.intimacy),
            (RelationshipFactor::Respect, self.respect),
            (RelationshipFactor::Loyalty, self.loyalty),
            (RelationshipFactor::Dependency, self.dependency),
        ];
        for (factor, value) in factors {
            if let Some(value) = value {
                relationship.factors.set(factor, value);
            }
        }
    }
}

/// Qualitative reading of a relationship's factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipLabel {
    Intimate,
    Trusting,
    Hostile,
    Guarded,
    Friendly,
    Neutral,
}

impl RelationshipLabel {
    /// Fixed decision tree, first matching rule wins.
    pub fn from_factors(factors: &RelationshipFactors) -> Self {
        if factors.trust >= 80 && factors.intimacy >= 80 {
            RelationshipLabel::Intimate
        } else if factors.trust >= 70 {
            RelationshipLabel::Trusting
        } else if factors.trust <= 20 && factors.respect <= 30 {
            RelationshipLabel::Hostile
        } else if factors.trust <= 40 {
            RelationshipLabel::Guarded
        } else if factors.intimacy >= 70 && factors.respect >= 60 {
            RelationshipLabel::Friendly
        } else {
            RelationshipLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipLabel::Intimate => "intimate",
            RelationshipLabel::Trusting => "trusting",
            RelationshipLabel::Hostile => "hostile",
            RelationshipLabel::Guarded => "guarded",
            RelationshipLabel::Friendly => "friendly",
            RelationshipLabel::Neutral => "neutral",
        }
    }
}

type PairKey = (AgentId, AgentId);

/// Sorted key for an unordered pair, or `None` for a self-pair.
fn pair_key(a: &AgentId, b: &AgentId) -> Option<PairKey> {
    match a.cmp(b) {
        std::cmp::Ordering::Less => Some((a.clone(), b.clone())),
        std::cmp::Ordering::Greater => Some((b.clone(), a.clone())),
        std::cmp::Ordering::Equal => None,
    }
}

/// The relationship store.
pub struct TrustMap {
    relationships: BTreeMap<PairKey, Relationship>,
    scorer: Box<dyn SentimentScorer>,
}

impl std::fmt::Debug for TrustMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustMap")
            .field("relationships", &self.relationships.len())
            .field("scorer", &"Box<dyn SentimentScorer>")
            .finish()
    }
}

impl Default for TrustMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustMap {
    /// Create an empty map with the keyword scorer.
    pub fn new() -> Self {
        Self::with_scorer(Box::new(KeywordSentimentScorer))
    }

    /// Create an empty map with a custom sentiment scorer.
    pub fn with_scorer(scorer: Box<dyn SentimentScorer>) -> Self {
        Self {
            relationships: BTreeMap::new(),
            scorer,
        }
    }

    /// Swap in a new relationship set, keeping the scorer. Self-pairs are dropped.
    pub fn replace_all(&mut self, relationships: impl IntoIterator<Item = Relationship>) {
        self.relationships = relationships
            .into_iter()
            .filter_map(|mut rel| {
                let key = pair_key(&rel.agent_a, &rel.agent_b)?;
                rel.agent_a = key.0.clone();
                rel.agent_b = key.1.clone();
                Some((key, rel))
            })
            .collect();
    }

    /// Rebuild the map from the projections cached on agent records.
    ///
    /// Used when a snapshot carries no relationship list. Effect history
    /// is not part of a projection and starts empty.
    pub fn rebuild_from_projections<'a>(&mut self, agents: impl IntoIterator<Item = &'a Agent>) {
        self.relationships.clear();
        for agent in agents {
            for (other, view) in agent.relationships() {
                let Some(key) = pair_key(&agent.id, other) else {
                    continue;
                };
                self.relationships.entry(key.clone()).or_insert_with(|| {
                    let mut rel = Relationship::new(&key);
                    rel.relationship_type = view.relationship_type;
                    rel.factors = view.factors;
                    rel.updated_at = view.updated_at;
                    rel
                });
            }
        }
        debug!(count = self.relationships.len(), "rebuilt relationships from agents");
    }

    /// Push every relationship into the mirror.
    pub fn mirror_all(&self, mirror: &mut dyn RelationshipMirror) {
        for (key, rel) in &self.relationships {
            mirror.mirror(&key.0, &key.1, &rel.view());
        }
    }

    /// Symmetric lookup. Always `None` when `a == b`.
    pub fn get_relationship(&self, a: &AgentId, b: &AgentId) -> Option<&Relationship> {
        let key = pair_key(a, b)?;
        self.relationships.get(&key)
    }

    /// Merge a patch onto the existing record (or neutral defaults) and mirror it.
    pub fn set_relationship(
        &mut self,
        mirror: &mut dyn RelationshipMirror,
        a: &AgentId,
        b: &AgentId,
        patch: &RelationshipPatch,
    ) -> Option<Relationship> {
        let Some(key) = pair_key(a, b) else {
            warn!(agent = %a, "cannot relate an agent to itself");
            return None;
        };

        let relationship = self
            .relationships
            .entry(key.clone())
            .or_insert_with(|| Relationship::new(&key));
        patch.apply(relationship);
        relationship.updated_at = Utc::now();

        let snapshot = relationship.clone();
        mirror.mirror(&key.0, &key.1, &snapshot.view());
        Some(snapshot)
    }

    /// Add `delta` to one factor, clamped to 0-100.
    pub fn adjust_factor(
        &mut self,
        mirror: &mut dyn RelationshipMirror,
        a: &AgentId,
        b: &AgentId,
        factor: RelationshipFactor,
        delta: i32,
    ) -> Option<Relationship> {
        let current = self
            .get_relationship(a, b)
            .map(|rel| rel.factors.get(factor) as i32)
            .unwrap_or(0);
        let next = (current + delta).clamp(0, 100) as u8;
        self.set_relationship(mirror, a, b, &RelationshipPatch::factor(factor, next))
    }

    /// Score an action's text and apply the resulting deltas to the
    /// actor/target relationship.
    ///
    /// Only character-targeted actions between two distinct agents that
    /// already share a relationship have any effect; otherwise this returns
    /// `None` without touching anything.
    pub fn process_action_effect(
        &mut self,
        mirror: &mut dyn RelationshipMirror,
        action: &Action,
    ) -> Option<Relationship> {
        if action.target_type() != TargetType::Character {
            return None;
        }
        let target = action.target_agent()?;
        let actor = action.actor_id();
        if actor == &target {
            return None;
        }
        let key = pair_key(actor, &target)?;
        if !self.relationships.contains_key(&key) {
            debug!(actor = %actor, target = %target, "no relationship to affect");
            return None;
        }

        let delta = self.scorer.score(action.content(), action.action_type());
        let factor_deltas = [
            (RelationshipFactor::Trust, delta.trust),
            (RelationshipFactor::Intimacy, delta.intimacy),
            (RelationshipFactor::Respect, delta.respect),
        ];
        for (factor, amount) in factor_deltas {
            if amount != 0 {
                self.adjust_factor(mirror, actor, &target, factor, amount);
            }
        }

        let relationship = self.relationships.get_mut(&key)?;
        relationship.history.push(RelationshipEffect {
            action_id: action.id().to_string(),
            action_type: action.action_type(),
            actor_id: actor.clone(),
            content: action.content().to_string(),
            delta,
            timestamp: Utc::now(),
        });
        relationship.updated_at = Utc::now();

        debug!(
            actor = %actor,
            target = %target,
            trust = delta.trust,
            intimacy = delta.intimacy,
            respect = delta.respect,
            "applied action effect"
        );
        let snapshot = relationship.clone();
        mirror.mirror(&key.0, &key.1, &snapshot.view());
        Some(snapshot)
    }

    /// Qualitative label for a pair, if they have a relationship.
    pub fn analyze_relationship(&self, a: &AgentId, b: &AgentId) -> Option<RelationshipLabel> {
        self.get_relationship(a, b).map(Relationship::label)
    }

    /// Create neutral relationships for every pair that lacks one.
    pub fn initialize_pairs(&mut self, mirror: &mut dyn RelationshipMirror, ids: &[AgentId]) -> usize {
        let mut created = 0;
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                let Some(key) = pair_key(a, b) else {
                    continue;
                };
                if self.relationships.contains_key(&key) {
                    continue;
                }
                self.set_relationship(mirror, a, b, &RelationshipPatch::default());
                created += 1;
            }
        }
        created
    }

    /// Every relationship involving `id`.
    pub fn relationships_of(&self, id: &AgentId) -> Vec<&Relationship> {
        self.relationships
            .values()
            .filter(|rel| rel.involves(id))
            .collect()
    }

    /// Drop every relationship involving `id`. Returns how many were removed.
    pub fn forget_agent(&mut self, mirror: &mut dyn RelationshipMirror, id: &AgentId) -> usize {
        let keys: Vec<PairKey> = self
            .relationships
            .keys()
            .filter(|(a, b)| a == id || b == id)
            .cloned()
            .collect();
        for key in &keys {
            self.relationships.remove(key);
            mirror.unmirror(&key.0, &key.1);
        }
        keys.len()
    }

    pub fn all(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}
