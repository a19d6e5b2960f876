//! Simulation mechanics: emotions, relationship kinds, and relationship factors.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RulesError;

/// Emotional states an agent can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
    #[default]
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Surprised,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
            Emotion::Neutral => "neutral",
        }
    }
}

impl FromStr for Emotion {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RulesError::invalid_enum("emotion", s))
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types between agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Friend,
    Enemy,
    Family,
    Lover,
    Ally,
    Rival,
    #[default]
    Stranger,
    Mentor,
    Student,
    Employer,
    Employee,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Friend => "friend",
            RelationshipType::Enemy => "enemy",
            RelationshipType::Family => "family",
            RelationshipType::Lover => "lover",
            RelationshipType::Ally => "ally",
            RelationshipType::Rival => "rival",
            RelationshipType::Stranger => "stranger",
            RelationshipType::Mentor => "mentor",
            RelationshipType::Student => "student",
            RelationshipType::Employer => "employer",
            RelationshipType::Employee => "employee",
        }
    }
}

/// The five scalar factors of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipFactor {
    Trust,
    Intimacy,
    Respect,
    Loyalty,
    Dependency,
}

impl RelationshipFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipFactor::Trust => "trust",
            RelationshipFactor::Intimacy => "intimacy",
            RelationshipFactor::Respect => "respect",
            RelationshipFactor::Loyalty => "loyalty",
            RelationshipFactor::Dependency => "dependency",
        }
    }
}

/// Factor values of a relationship, each on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipFactors {
    pub trust: u8,
    pub intimacy: u8,
    pub respect: u8,
    pub loyalty: u8,
    pub dependency: u8,
}

impl Default for RelationshipFactors {
    /// Neutral defaults: trust and respect at 50, everything else at 0.
    fn default() -> Self {
        Self {
            trust: 50,
            intimacy: 0,
            respect: 50,
            loyalty: 0,
            dependency: 0,
        }
    }
}

impl RelationshipFactors {
    pub fn get(&self, factor: RelationshipFactor) -> u8 {
        match factor {
            RelationshipFactor::Trust => self.trust,
            RelationshipFactor::Intimacy => self.intimacy,
            RelationshipFactor::Respect => self.respect,
            RelationshipFactor::Loyalty => self.loyalty,
            RelationshipFactor::Dependency => self.dependency,
        }
    }

    /// Set a factor, clamping to 0-100.
    pub fn set(&mut self, factor: RelationshipFactor, value: u8) {
        let value = value.min(crate::entities::SCALE_MAX);
        match factor {
            RelationshipFactor::Trust => self.trust = value,
            RelationshipFactor::Intimacy => self.intimacy = value,
            RelationshipFactor::Respect => self.respect = value,
            RelationshipFactor::Loyalty => self.loyalty = value,
            RelationshipFactor::Dependency => self.dependency = value,
        }
    }

    /// Apply a signed delta to a factor, clamping the result to 0-100.
    pub fn adjust(&mut self, factor: RelationshipFactor, delta: i32) -> u8 {
        let current = self.get(factor) as i32;
        let next = (current + delta).clamp(0, crate::entities::SCALE_MAX as i32) as u8;
        self.set(factor, next);
        next
    }
}
