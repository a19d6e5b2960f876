//! Free-text input parsing.
//!
//! Bracketed text is a physical action, braced text is an item use, and
//! anything else is dialogue. Each pattern is anchored to the whole input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ActionType;

static BRACKET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^(?:\[(.+)\]|【(.+)】)$").expect("valid bracket pattern"));

static BRACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^(?:\{(.+)\}|「(.+)」)$").expect("valid brace pattern"));

static QUOTE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)^(?:"(.+)"|“(.+)”|'(.+)'|『(.+)』)$"#).expect("valid quote pattern")
});

/// Result of parsing a line of free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedInput {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub content: String,
}

fn first_group(pattern: &Regex, input: &str) -> Option<String> {
    pattern.captures(input).and_then(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().to_string())
    })
}

/// Classify free text into a typed action and strip its delimiters.
pub fn parse_free_text(input: &str) -> ParsedInput {
    let trimmed = input.trim();

    if let Some(content) = first_group(&BRACKET_PATTERN, trimmed) {
        return ParsedInput {
            action_type: ActionType::Action,
            content,
        };
    }

    if let Some(content) = first_group(&BRACE_PATTERN, trimmed) {
        return ParsedInput {
            action_type: ActionType::Item,
            content,
        };
    }

    if let Some(content) = first_group(&QUOTE_PATTERN, trimmed) {
        return ParsedInput {
            action_type: ActionType::Dialogue,
            content,
        };
    }

    ParsedInput {
        action_type: ActionType::Dialogue,
        content: input.to_string(),
    }
}
