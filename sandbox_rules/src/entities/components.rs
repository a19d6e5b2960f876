//! Component definitions for agents.

use serde::{Deserialize, Serialize};

use crate::error::RulesError;

/// Upper bound for every 0-100 scale in the model.
pub const SCALE_MAX: u8 = 100;

/// Five-factor personality vector, each trait on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    pub openness: u8,
    pub conscientiousness: u8,
    pub extraversion: u8,
    pub agreeableness: u8,
    pub neuroticism: u8,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            openness: 50,
            conscientiousness: 50,
            extraversion: 50,
            agreeableness: 50,
            neuroticism: 50,
        }
    }
}

/// Personality trait names for range checks and prompt rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonalityTrait {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Neuroticism,
}

impl PersonalityTrait {
    pub const ALL: [PersonalityTrait; 5] = [
        PersonalityTrait::Openness,
        PersonalityTrait::Conscientiousness,
        PersonalityTrait::Extraversion,
        PersonalityTrait::Agreeableness,
        PersonalityTrait::Neuroticism,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonalityTrait::Openness => "openness",
            PersonalityTrait::Conscientiousness => "conscientiousness",
            PersonalityTrait::Extraversion => "extraversion",
            PersonalityTrait::Agreeableness => "agreeableness",
            PersonalityTrait::Neuroticism => "neuroticism",
        }
    }
}

impl Personality {
    /// Create a personality from the five trait values, clamped to 0-100.
    pub fn new(
        openness: u8,
        conscientiousness: u8,
        extraversion: u8,
        agreeableness: u8,
        neuroticism: u8,
    ) -> Self {
        Self {
            openness: openness.min(SCALE_MAX),
            conscientiousness: conscientiousness.min(SCALE_MAX),
            extraversion: extraversion.min(SCALE_MAX),
            agreeableness: agreeableness.min(SCALE_MAX),
            neuroticism: neuroticism.min(SCALE_MAX),
        }
    }

    /// Value of a single trait.
    pub fn get(&self, personality_trait: PersonalityTrait) -> u8 {
        match personality_trait {
            PersonalityTrait::Openness => self.openness,
            PersonalityTrait::Conscientiousness => self.conscientiousness,
            PersonalityTrait::Extraversion => self.extraversion,
            PersonalityTrait::Agreeableness => self.agreeableness,
            PersonalityTrait::Neuroticism => self.neuroticism,
        }
    }

    /// Check that every trait lies on the 0-100 scale.
    pub fn validate(&self) -> Result<(), RulesError> {
        for personality_trait in PersonalityTrait::ALL {
            let value = self.get(personality_trait);
            if value > SCALE_MAX {
                return Err(RulesError::OutOfRange {
                    field: personality_trait.as_str().to_string(),
                    value: value as i64,
                });
            }
        }
        Ok(())
    }
}

/// An active status effect on an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub id: String,
    pub name: String,
    pub description: String,
    /// None = permanent effect.
    pub duration: Option<u32>,
}

impl StatusEffect {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            duration: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_duration(mut self, turns: u32) -> Self {
        self.duration = Some(turns);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personality_clamping() {
        let personality = Personality::new(120, 10, 200, 0, 100);
        assert_eq!(personality.openness, 100);
        assert_eq!(personality.extraversion, 100);
        assert_eq!(personality.conscientiousness, 10);
        assert!(personality.validate().is_ok());
    }

    #[test]
    fn test_personality_validation_rejects_out_of_scale() {
        let personality = Personality {
            neuroticism: 140,
            ..Default::default()
        };
        let err = personality.validate().unwrap_err();
        assert!(err.to_string().contains("neuroticism"));
    }

    #[test]
    fn test_status_effect_builder() {
        let effect = StatusEffect::new("poison", "Poisoned")
            .with_description("Loses strength every turn")
            .with_duration(3);
        assert_eq!(effect.duration, Some(3));
        assert_eq!(effect.description, "Loses strength every turn");
    }
}
