//! Validation errors for the world data model.

use thiserror::Error;

/// Errors raised when a value does not fit the world model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    /// A string did not name a known enum variant.
    #[error("invalid {kind}: {value:?}")]
    InvalidEnum { kind: &'static str, value: String },

    /// A scalar lies outside its allowed range.
    #[error("{field} out of range: {value}")]
    OutOfRange { field: String, value: i64 },

    /// A record references something that does not exist or is malformed.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl RulesError {
    pub fn invalid_enum(kind: &'static str, value: impl Into<String>) -> Self {
        RulesError::InvalidEnum {
            kind,
            value: value.into(),
        }
    }
}
