//! Sentiment scoring of action text.
//!
//! The default scorer is a fixed keyword table. Categories are checked in
//! order per action type and only the first matching category counts.

use sandbox_rules::ActionType;
use serde::{Deserialize, Serialize};

/// Relationship deltas produced by scoring one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentimentDelta {
    pub trust: i32,
    pub intimacy: i32,
    pub respect: i32,
}

impl SentimentDelta {
    pub const fn new(trust: i32, intimacy: i32, respect: i32) -> Self {
        Self {
            trust,
            intimacy,
            respect,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.trust == 0 && self.intimacy == 0 && self.respect == 0
    }
}

/// Scores free text into relationship deltas.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str, action_type: ActionType) -> SentimentDelta;
}

/// One row of the keyword table.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub category: &'static str,
    pub keywords: &'static [&'static str],
    pub delta: SentimentDelta,
}

const DIALOGUE_RULES: &[KeywordRule] = &[
    KeywordRule {
        category: "gratitude",
        keywords: &["谢谢", "感谢", "多谢", "thank"],
        delta: SentimentDelta::new(2, 0, 1),
    },
    KeywordRule {
        category: "apology",
        keywords: &["对不起", "抱歉", "sorry", "apologi"],
        delta: SentimentDelta::new(1, 0, 1),
    },
    KeywordRule {
        category: "affection",
        keywords: &["喜欢", "爱你", "想你", "love", "adore"],
        delta: SentimentDelta::new(1, 3, 0),
    },
    KeywordRule {
        category: "hostility",
        keywords: &["讨厌", "恨", "滚", "笨蛋", "hate", "idiot", "fool", "get lost"],
        delta: SentimentDelta::new(-3, -2, -2),
    },
];

const PHYSICAL_RULES: &[KeywordRule] = &[
    KeywordRule {
        category: "help",
        keywords: &["帮", "扶", "救", "help", "assist", "protect", "heal"],
        delta: SentimentDelta::new(3, 1, 2),
    },
    KeywordRule {
        category: "attack",
        keywords: &["攻击", "打", "踢", "刺", "attack", "hit", "punch", "kick", "stab"],
        delta: SentimentDelta::new(-5, 0, -3),
    },
    KeywordRule {
        category: "embrace",
        keywords: &["拥抱", "抱", "hug", "embrace"],
        delta: SentimentDelta::new(1, 3, 0),
    },
];

const ITEM_RULES: &[KeywordRule] = &[
    KeywordRule {
        category: "give",
        keywords: &["给", "送", "赠", "give", "gift", "offer", "hand"],
        delta: SentimentDelta::new(2, 1, 1),
    },
    KeywordRule {
        category: "steal",
        keywords: &["偷", "抢", "窃", "steal", "rob", "swipe", "pickpocket"],
        delta: SentimentDelta::new(-4, 0, -2),
    },
];

/// Keyword-table scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSentimentScorer;

impl KeywordSentimentScorer {
    /// Rules evaluated for an action type, in priority order.
    pub fn rules(action_type: ActionType) -> &'static [KeywordRule] {
        match action_type {
            ActionType::Dialogue => DIALOGUE_RULES,
            ActionType::Action => PHYSICAL_RULES,
            ActionType::Item => ITEM_RULES,
        }
    }

    /// First rule whose keywords appear in `text`.
    pub fn matching_rule(text: &str, action_type: ActionType) -> Option<&'static KeywordRule> {
        let lowered = text.to_lowercase();
        Self::rules(action_type)
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k)))
    }
}

impl SentimentScorer for KeywordSentimentScorer {
    fn score(&self, text: &str, action_type: ActionType) -> SentimentDelta {
        Self::matching_rule(text, action_type)
            .map(|rule| rule.delta)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gratitude_scores() {
        let scorer = KeywordSentimentScorer;
        assert_eq!(
            scorer.score("谢谢你的帮助", ActionType::Dialogue),
            SentimentDelta::new(2, 0, 1)
        );
        assert_eq!(
            scorer.score("Thank you, friend", ActionType::Dialogue),
            SentimentDelta::new(2, 0, 1)
        );
    }

    #[test]
    fn test_first_category_wins() {
        // Gratitude and hostility both match; gratitude is checked first.
        let scorer = KeywordSentimentScorer;
        let delta = scorer.score("thanks, idiot", ActionType::Dialogue);
        assert_eq!(delta, SentimentDelta::new(2, 0, 1));
    }

    #[test]
    fn test_attack_scores() {
        let scorer = KeywordSentimentScorer;
        assert_eq!(
            scorer.score("attack the guard", ActionType::Action),
            SentimentDelta::new(-5, 0, -3)
        );
    }

    #[test]
    fn test_keywords_are_scoped_by_action_type() {
        let scorer = KeywordSentimentScorer;
        // "steal" only counts for item actions.
        assert!(scorer.score("steal a glance", ActionType::Dialogue).is_zero());
        assert_eq!(
            scorer.score("steal the purse", ActionType::Item),
            SentimentDelta::new(-4, 0, -2)
        );
    }

    #[test]
    fn test_no_match_is_zero() {
        let scorer = KeywordSentimentScorer;
        assert!(scorer.score("the weather is nice", ActionType::Dialogue).is_zero());
        assert!(KeywordSentimentScorer::matching_rule("hmm", ActionType::Item).is_none());
    }
}
