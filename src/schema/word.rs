//! Word record schema.

use serde::Serialize;
use serde_json::Value;

use super::{
    describe, expect_object, is_blank, reject_unknown_fields, take_optional_string, take_string,
    FieldViolation, SchemaViolation,
};

const FIELDS: &[&str] = &["word_th", "g2p", "phonetic_en"];

/// A dictionary headword, keyed by its literal Thai text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Word {
    pub word_th: String,
    /// Romanization produced by the G2P oracle.
    pub g2p: Option<String>,
    /// Phonetic spelling produced by the phonetic analyzer.
    pub phonetic_en: Option<String>,
}

impl Word {
    /// Parse a raw row into a `Word`, rejecting unknown fields and wrong
    /// types. The only legal way to obtain a `Word` from external data.
    pub fn parse(value: &Value) -> Result<Self, SchemaViolation> {
        let map = expect_object("word", value)?;
        let mut violations = Vec::new();
        reject_unknown_fields(map, FIELDS, &mut violations);

        let word_th = take_string(map, "word_th", &mut violations);
        if let Some(text) = word_th.as_deref() {
            if is_blank(text) {
                violations.push(FieldViolation::invalid(
                    "word_th",
                    "must not be blank",
                    "non-blank Thai text",
                    describe(&Value::String(text.to_string())),
                ));
            }
        }
        let g2p = take_optional_string(map, "g2p", &mut violations);
        let phonetic_en = take_optional_string(map, "phonetic_en", &mut violations);

        if !violations.is_empty() {
            return Err(SchemaViolation::new("word", violations));
        }
        Ok(Self {
            word_th: word_th.expect("word_th present when no violations"),
            g2p,
            phonetic_en,
        })
    }

    /// Build a bare word for a headword that has no row yet.
    pub fn seed(word_th: &str) -> Result<Self, SchemaViolation> {
        Self::parse(&serde_json::json!({ "word_th": word_th }))
    }
}
