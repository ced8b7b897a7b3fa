//! Sense record schema, three additive generations.
//!
//! V1 carries the identifier and Thai definition; V2 adds part-of-speech and
//! English definition fields; V3 adds a one-word English gloss. The
//! generation is computed once at parse time and carried as a discriminant so
//! call sites never re-probe optional fields.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::{
    describe, expect_object, is_blank, reject_unknown_fields, take_integer, take_optional_integer,
    take_optional_string, take_string, FieldViolation, SchemaViolation,
};

const FIELDS: &[&str] = &[
    "id",
    "definition_th",
    "word_th_id",
    "source",
    "created_at",
    "pos_th",
    "pos_eng",
    "definition_eng",
    "label_eng",
];

/// Which schema generation a parsed sense belongs to.
///
/// Computed once from which optional generation fields are populated; a V3
/// field on a row missing its V2 fields still parses (the fields are
/// additive and optional) but the discriminant stays at the highest
/// generation with any populated field.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    V1,
    V2,
    V3,
}

impl SchemaVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1 => "v1",
            SchemaVersion::V2 => "v2",
            SchemaVersion::V3 => "v3",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dictionary meaning of a word.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Sense {
    pub id: i64,
    pub definition_th: String,
    /// Back-reference to the owning word; older rows predate this column.
    pub word_th_id: Option<String>,
    /// Provenance tag; [`super::RAW_DICT_SOURCE`] means not yet normalized.
    pub source: Option<String>,
    pub created_at: Option<i64>,
    pub pos_th: Option<String>,
    pub pos_eng: Option<String>,
    pub definition_eng: Option<String>,
    /// Single-English-word gloss: ASCII letters only, no spaces, no Thai.
    pub label_eng: Option<String>,
    /// Computed at parse time; never persisted.
    #[serde(skip_serializing)]
    pub schema_version: SchemaVersion,
}

impl Sense {
    /// Parse a raw row into a `Sense`, computing the generation discriminant.
    pub fn parse(value: &Value) -> Result<Self, SchemaViolation> {
        let map = expect_object("sense", value)?;
        let mut violations = Vec::new();
        reject_unknown_fields(map, FIELDS, &mut violations);

        let id = take_integer(map, "id", &mut violations);
        let definition_th = take_string(map, "definition_th", &mut violations);
        if let Some(text) = definition_th.as_deref() {
            if is_blank(text) {
                violations.push(FieldViolation::invalid(
                    "definition_th",
                    "must not be blank",
                    "non-blank Thai definition text",
                    describe(&Value::String(text.to_string())),
                ));
            }
        }
        let word_th_id = take_optional_string(map, "word_th_id", &mut violations);
        let source = take_optional_string(map, "source", &mut violations);
        let created_at = take_optional_integer(map, "created_at", &mut violations);
        let pos_th = take_optional_string(map, "pos_th", &mut violations);
        let pos_eng = take_optional_string(map, "pos_eng", &mut violations);
        let definition_eng = take_optional_string(map, "definition_eng", &mut violations);
        let label_eng = take_optional_string(map, "label_eng", &mut violations);

        if let Some(label) = label_eng.as_deref() {
            let letters_only = Regex::new(r"^[A-Za-z]+$").expect("regex for label gloss");
            if !letters_only.is_match(label) {
                violations.push(FieldViolation::invalid(
                    "label_eng",
                    "must be a single word of ASCII letters",
                    "letters only, no spaces, no Thai script",
                    describe(&Value::String(label.to_string())),
                ));
            }
        }

        if !violations.is_empty() {
            return Err(SchemaViolation::new("sense", violations));
        }

        let schema_version = if label_eng.is_some() {
            SchemaVersion::V3
        } else if pos_th.is_some() || pos_eng.is_some() || definition_eng.is_some() {
            SchemaVersion::V2
        } else {
            SchemaVersion::V1
        };

        Ok(Self {
            id: id.expect("id present when no violations"),
            definition_th: definition_th.expect("definition_th present when no violations"),
            word_th_id,
            source,
            created_at,
            pos_th,
            pos_eng,
            definition_eng,
            label_eng,
            schema_version,
        })
    }

    /// Whether the provenance tag is still the raw-dictionary marker.
    pub fn has_raw_source(&self) -> bool {
        self.source
            .as_deref()
            .map(|source| source.eq_ignore_ascii_case(super::RAW_DICT_SOURCE))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_sense() -> Value {
        json!({
            "id": 7,
            "definition_th": "ที่อยู่อาศัย",
            "word_th_id": "บ้าน",
            "source": "orst"
        })
    }

    #[test]
    fn parses_v1_sense() {
        let sense = Sense::parse(&raw_sense()).unwrap();
        assert_eq!(sense.id, 7);
        assert_eq!(sense.schema_version, SchemaVersion::V1);
        assert!(sense.has_raw_source());
    }

    #[test]
    fn raw_source_marker_is_case_insensitive() {
        let mut value = raw_sense();
        value["source"] = json!("ORST");
        assert!(Sense::parse(&value).unwrap().has_raw_source());
        value["source"] = json!("gpt-normalized");
        assert!(!Sense::parse(&value).unwrap().has_raw_source());
    }

    #[test]
    fn detects_v2_generation() {
        let mut value = raw_sense();
        value["pos_th"] = json!("นาม");
        let sense = Sense::parse(&value).unwrap();
        assert_eq!(sense.schema_version, SchemaVersion::V2);
    }

    #[test]
    fn detects_v3_generation() {
        let mut value = raw_sense();
        value["pos_th"] = json!("นาม");
        value["pos_eng"] = json!("noun");
        value["definition_eng"] = json!("a dwelling");
        value["label_eng"] = json!("house");
        let sense = Sense::parse(&value).unwrap();
        assert_eq!(sense.schema_version, SchemaVersion::V3);
    }

    #[test]
    fn rejects_gloss_with_spaces_or_thai() {
        let mut value = raw_sense();
        value["label_eng"] = json!("two words");
        assert!(Sense::parse(&value).is_err());
        value["label_eng"] = json!("บ้าน");
        assert!(Sense::parse(&value).is_err());
        value["label_eng"] = json!("house");
        assert!(Sense::parse(&value).is_ok());
    }

    #[test]
    fn rejects_missing_definition() {
        let err = Sense::parse(&json!({"id": 1})).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| v.field == "definition_th" && !v.present));
    }

    #[test]
    fn normalizes_large_integer_identifier() {
        let mut value = raw_sense();
        value["id"] = json!(9_007_199_254_740_993u64);
        let sense = Sense::parse(&value).unwrap();
        assert_eq!(sense.id, 9_007_199_254_740_993);
    }
}
