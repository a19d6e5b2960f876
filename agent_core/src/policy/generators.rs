//! Canned content for each response type.

use rand::seq::SliceRandom;
use rand::RngCore;
use sandbox_rules::{Agent, Emotion};
use serde::{Deserialize, Serialize};

use crate::trust::Relationship;

struct ReplyRule {
    keywords: &'static [&'static str],
    replies: &'static [&'static str],
    emotion: Option<Emotion>,
}

const DIALOGUE_REPLIES: &[ReplyRule] = &[
    ReplyRule {
        keywords: &["你好", "您好", "hello", "greetings", "good morning", "good evening"],
        replies: &[
            "Well met, traveler.",
            "Hello there. What brings you here?",
        ],
        emotion: None,
    },
    ReplyRule {
        keywords: &["谢谢", "感谢", "多谢", "thank"],
        replies: &["You're welcome.", "Think nothing of it."],
        emotion: Some(Emotion::Happy),
    },
    ReplyRule {
        keywords: &["对不起", "抱歉", "sorry", "apologi"],
        replies: &["No harm done.", "Let's put it behind us."],
        emotion: None,
    },
    ReplyRule {
        keywords: &["再见", "告辞", "goodbye", "farewell", "see you"],
        replies: &["Safe travels.", "Until next time."],
        emotion: None,
    },
];

const DEFAULT_REPLIES: &[&str] = &[
    "I see.",
    "Is that so?",
    "Tell me more.",
    "Hmm, interesting.",
];

fn emotion_templates(emotion: Emotion) -> &'static [&'static str] {
    match emotion {
        Emotion::Happy => &[
            "{name} smiles warmly. \"{reply}\"",
            "{name} says cheerfully, \"{reply}\"",
        ],
        Emotion::Sad => &[
            "{name} sighs softly. \"{reply}\"",
            "{name} answers with downcast eyes, \"{reply}\"",
        ],
        Emotion::Angry => &[
            "{name} snaps, \"{reply}\"",
            "{name} glares. \"{reply}\"",
        ],
        Emotion::Fearful => &[
            "{name} glances around nervously. \"{reply}\"",
            "{name} whispers, \"{reply}\"",
        ],
        Emotion::Disgusted => &[
            "{name} wrinkles their nose. \"{reply}\"",
            "{name} says with distaste, \"{reply}\"",
        ],
        Emotion::Surprised => &[
            "{name} blinks in surprise. \"{reply}\"",
            "{name} exclaims, \"{reply}\"",
        ],
        Emotion::Neutral => &["{name} says, \"{reply}\"", "{name} replies, \"{reply}\""],
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}

fn pick<'a>(rng: &mut dyn RngCore, options: &'a [&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

/// Generated text plus the emotion it expresses.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub content: String,
    pub emotion: Emotion,
    /// Base intensity before the neuroticism adjustment.
    pub base_intensity: u8,
}

/// A spoken reply, wrapped in a sentence that fits the speaker's mood.
pub fn dialogue(rng: &mut dyn RngCore, agent: &Agent, input: &str) -> Generated {
    let rule = DIALOGUE_REPLIES
        .iter()
        .find(|rule| contains_any(input, rule.keywords));
    let reply = match rule {
        Some(rule) => pick(rng, rule.replies),
        None => pick(rng, DEFAULT_REPLIES),
    };
    let emotion = rule
        .and_then(|rule| rule.emotion)
        .unwrap_or(agent.current_emotion);
    let template = pick(rng, emotion_templates(emotion));

    Generated {
        content: template
            .replace("{name}", &agent.name)
            .replace("{reply}", reply),
        emotion,
        base_intensity: if emotion == agent.current_emotion {
            agent.emotion_intensity
        } else {
            40
        },
    }
}

/// A physical reaction to being acted upon.
pub fn physical(agent: &Agent, input: &str) -> Generated {
    let (text, emotion, base) = if contains_any(
        input,
        &["攻击", "打", "踢", "刺", "attack", "hit", "punch", "kick", "stab"],
    ) {
        ("{name} stumbles back and flees from the blow.", Emotion::Fearful, 60)
    } else if contains_any(input, &["给", "送", "赠", "give", "gift", "offer", "hand"]) {
        ("{name} takes it and turns it over, examining it closely.", Emotion::Surprised, 40)
    } else if contains_any(input, &["拥抱", "抱", "hug", "embrace"]) {
        ("{name} hesitates, then returns the embrace.", Emotion::Happy, 50)
    } else {
        (
            "{name} watches carefully, saying nothing.",
            agent.current_emotion,
            agent.emotion_intensity,
        )
    };
    Generated {
        content: text.replace("{name}", &agent.name),
        emotion,
        base_intensity: base,
    }
}

/// A fixed sentence describing the agent's current mood.
pub fn emotion(agent: &Agent) -> Generated {
    let text = match agent.current_emotion {
        Emotion::Happy => "{name} can't stop smiling, clearly in high spirits.",
        Emotion::Sad => "{name} stares at the floor, shoulders slumped.",
        Emotion::Angry => "{name} clenches their fists, barely holding back their anger.",
        Emotion::Fearful => "{name} trembles and keeps glancing at the door.",
        Emotion::Disgusted => "{name} turns away in open disgust.",
        Emotion::Surprised => "{name} is too startled to say anything.",
        Emotion::Neutral => "{name} regards you calmly.",
    };
    Generated {
        content: text.replace("{name}", &agent.name),
        emotion: agent.current_emotion,
        base_intensity: agent.emotion_intensity,
    }
}

/// How an agent answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionType {
    Cooperate,
    Help,
    Neutral,
    Avoid,
    Compete,
}

impl DecisionType {
    /// Map a cooperation score onto a decision.
    pub fn from_score(score: f64) -> Self {
        if score > 30.0 {
            DecisionType::Cooperate
        } else if score > 10.0 {
            DecisionType::Help
        } else if score > -10.0 {
            DecisionType::Neutral
        } else if score > -30.0 {
            DecisionType::Avoid
        } else {
            DecisionType::Compete
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Cooperate => "cooperate",
            DecisionType::Help => "help",
            DecisionType::Neutral => "neutral",
            DecisionType::Avoid => "avoid",
            DecisionType::Compete => "compete",
        }
    }

    fn text(&self) -> &'static str {
        match self {
            DecisionType::Cooperate => "{name} agrees at once and offers to help however they can.",
            DecisionType::Help => "{name} nods and agrees to lend a hand.",
            DecisionType::Neutral => "{name} considers the request but makes no promises.",
            DecisionType::Avoid => "{name} mumbles an excuse and backs away.",
            DecisionType::Compete => "{name} refuses flatly, eyeing a chance to gain at your expense.",
        }
    }

    pub fn emotion(&self) -> Emotion {
        match self {
            DecisionType::Cooperate => Emotion::Happy,
            DecisionType::Help => Emotion::Happy,
            DecisionType::Neutral => Emotion::Neutral,
            DecisionType::Avoid => Emotion::Fearful,
            DecisionType::Compete => Emotion::Angry,
        }
    }
}

/// Willingness to cooperate, from personality and the relationship with the asker.
pub fn cooperation_score(agent: &Agent, relationship: Option<&Relationship>) -> f64 {
    let p = &agent.personality;
    let mut score = 0.5 * (p.agreeableness as f64 - 50.0)
        + 0.3 * (p.extraversion as f64 - 50.0)
        + 0.2 * (50.0 - p.neuroticism as f64);
    if let Some(rel) = relationship {
        score += 0.6 * (rel.factors.trust as f64 - 50.0) + 0.4 * (rel.factors.respect as f64 - 50.0);
    }
    score
}

/// Decide on a request. Deterministic for fixed inputs.
pub fn decision(agent: &Agent, relationship: Option<&Relationship>) -> (Generated, DecisionType) {
    let decision = DecisionType::from_score(cooperation_score(agent, relationship));
    (
        Generated {
            content: decision.text().replace("{name}", &agent.name),
            emotion: decision.emotion(),
            base_intensity: 50,
        },
        decision,
    )
}

pub fn rejection(agent: &Agent) -> Generated {
    Generated {
        content: format!("{} turns away and refuses to respond.", agent.name),
        emotion: agent.current_emotion,
        base_intensity: agent.emotion_intensity,
    }
}

/// Scale a base intensity by neuroticism: `base * (1 + (n - 50) / 100)`, clamped to 0-100.
pub fn calculate_emotion_intensity(base: u8, neuroticism: u8) -> u8 {
    let scaled = base as f64 * (1.0 + (neuroticism as f64 - 50.0) / 100.0);
    scaled.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sandbox_rules::{AgentType, Personality};

    fn agent() -> Agent {
        Agent::new("npc_mira", "Mira", AgentType::Npc)
    }

    #[test]
    fn test_dialogue_thanks_reply() {
        let mut rng = StdRng::seed_from_u64(7);
        let out = dialogue(&mut rng, &agent(), "谢谢你");
        assert_eq!(out.emotion, Emotion::Happy);
        assert!(out.content.starts_with("Mira"));
        assert!(
            out.content.contains("You're welcome.") || out.content.contains("Think nothing of it.")
        );
    }

    #[test]
    fn test_dialogue_default_keeps_emotion() {
        let mut rng = StdRng::seed_from_u64(1);
        let npc = agent().with_emotion(Emotion::Sad, 30);
        let out = dialogue(&mut rng, &npc, "the weather");
        assert_eq!(out.emotion, Emotion::Sad);
        assert_eq!(out.base_intensity, 30);
        assert!(DEFAULT_REPLIES.iter().any(|r| out.content.contains(r)));
    }

    #[test]
    fn test_dialogue_is_reproducible_with_seed() {
        let a = dialogue(&mut StdRng::seed_from_u64(42), &agent(), "hello");
        let b = dialogue(&mut StdRng::seed_from_u64(42), &agent(), "hello");
        assert_eq!(a, b);
    }

    #[test]
    fn test_physical_reactions() {
        assert_eq!(physical(&agent(), "attack her").emotion, Emotion::Fearful);
        assert_eq!(physical(&agent(), "give a flower").emotion, Emotion::Surprised);
        assert_eq!(physical(&agent(), "hug").emotion, Emotion::Happy);
        assert!(physical(&agent(), "wave").content.contains("watches"));
    }

    #[test]
    fn test_emotion_sentence() {
        let npc = agent().with_emotion(Emotion::Angry, 90);
        let out = emotion(&npc);
        assert_eq!(out.emotion, Emotion::Angry);
        assert!(out.content.contains("anger"));
    }

    #[test]
    fn test_cooperation_score_is_exact() {
        let npc = agent().with_personality(Personality::new(50, 50, 70, 80, 30));
        // 0.5*30 + 0.3*20 + 0.2*20 = 25
        assert!((cooperation_score(&npc, None) - 25.0).abs() < 1e-9);
        assert_eq!(cooperation_score(&npc, None), cooperation_score(&npc, None));
        let (_, decided) = decision(&npc, None);
        assert_eq!(decided, DecisionType::Help);
    }

    #[test]
    fn test_decision_thresholds() {
        assert_eq!(DecisionType::from_score(30.5), DecisionType::Cooperate);
        assert_eq!(DecisionType::from_score(30.0), DecisionType::Help);
        assert_eq!(DecisionType::from_score(10.0), DecisionType::Neutral);
        assert_eq!(DecisionType::from_score(-10.0), DecisionType::Avoid);
        assert_eq!(DecisionType::from_score(-30.0), DecisionType::Compete);
    }

    #[test]
    fn test_emotion_intensity_scaling() {
        assert_eq!(calculate_emotion_intensity(50, 50), 50);
        assert_eq!(calculate_emotion_intensity(50, 100), 75);
        assert_eq!(calculate_emotion_intensity(50, 0), 25);
        assert_eq!(calculate_emotion_intensity(100, 100), 100);
    }
}
