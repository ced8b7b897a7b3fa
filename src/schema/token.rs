//! Token unit derived from a subtitle's token list.

use serde::Serialize;
use serde_json::Value;

use super::{describe, FieldViolation, SchemaViolation};

/// A trimmed, non-empty text unit. Identity is the literal text; tokens have
/// no lifecycle of their own and are derived fresh from each subtitle.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(String);

impl Token {
    pub fn parse(value: &Value) -> Result<Self, SchemaViolation> {
        let Some(text) = value.as_str() else {
            return Err(SchemaViolation::new(
                "token",
                vec![FieldViolation::mismatch("<root>", "a string", value)],
            ));
        };
        Self::from_text(text)
    }

    pub fn from_text(text: &str) -> Result<Self, SchemaViolation> {
        if text.trim().is_empty() || text.trim() != text {
            return Err(SchemaViolation::new(
                "token",
                vec![FieldViolation::invalid(
                    "<root>",
                    "must be trimmed, non-empty text",
                    "trimmed non-empty token text",
                    describe(&Value::String(text.to_string())),
                )],
            ));
        }
        Ok(Self(text.to_string()))
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
