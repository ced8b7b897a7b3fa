//! Strict record schemas for persisted entities.
//!
//! Every row coming out of the datastore or an oracle response is `unknown`
//! until it passes one of these parsers. Parsing rejects unknown fields and
//! wrong types outright; the only coercion performed is integer-width
//! normalization for identifiers.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod sense;
pub mod subtitle;
pub mod token;
pub mod word;

pub use sense::{SchemaVersion, Sense};
pub use subtitle::{Subtitle, TokenList};
pub use token::Token;
pub use word::Word;

/// Provenance tag a sense carries straight out of the dictionary lookup,
/// before any normalization has touched it. Matched case-insensitively.
pub const RAW_DICT_SOURCE: &str = "orst";

/// One structured error per violated field.
///
/// This shape is shared by schema and contract failures so the UI can render
/// either uniformly; callers distinguish the two by error type, never by
/// matching message text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldViolation {
    /// Dotted path to the offending field (e.g. `tokens_th.tokens`).
    pub field: String,
    pub message: String,
    /// Whether the field was present at all.
    pub present: bool,
    pub expected: String,
    pub found: String,
}

impl FieldViolation {
    pub fn missing(field: &str, expected: &str) -> Self {
        Self {
            field: field.to_string(),
            message: format!("missing required field {field}"),
            present: false,
            expected: expected.to_string(),
            found: "nothing".to_string(),
        }
    }

    pub fn mismatch(field: &str, expected: &str, found: &Value) -> Self {
        Self {
            field: field.to_string(),
            message: format!("{field} must be {expected}"),
            present: true,
            expected: expected.to_string(),
            found: describe(found),
        }
    }

    pub fn invalid(field: &str, message: &str, expected: &str, found: String) -> Self {
        Self {
            field: field.to_string(),
            message: format!("{field} {message}"),
            present: true,
            expected: expected.to_string(),
            found,
        }
    }
}

/// Structural failure: the value does not match the record shape.
///
/// Always fatal at the point of detection; never silently repaired.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[error("{entity} failed schema validation: {}", summarize(.violations))]
pub struct SchemaViolation {
    pub entity: &'static str,
    pub violations: Vec<FieldViolation>,
}

impl SchemaViolation {
    pub fn new(entity: &'static str, violations: Vec<FieldViolation>) -> Self {
        Self { entity, violations }
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|violation| violation.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render a short description of a JSON value for violation reports.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => {
            if s.chars().count() > 40 {
                let prefix: String = s.chars().take(40).collect();
                format!("string {prefix:?}…")
            } else {
                format!("string {s:?}")
            }
        }
        Value::Array(items) => format!("array of {} items", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}

pub(crate) fn expect_object<'a>(
    entity: &'static str,
    value: &'a Value,
) -> Result<&'a Map<String, Value>, SchemaViolation> {
    value.as_object().ok_or_else(|| {
        SchemaViolation::new(
            entity,
            vec![FieldViolation::mismatch("<root>", "a JSON object", value)],
        )
    })
}

pub(crate) fn reject_unknown_fields(
    map: &Map<String, Value>,
    allowed: &[&str],
    violations: &mut Vec<FieldViolation>,
) {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            violations.push(FieldViolation::invalid(
                key,
                "is not a known field",
                "one of the schema fields",
                format!("unknown field {key:?}"),
            ));
        }
    }
}

/// Read a required string field; `null` counts as missing.
pub(crate) fn take_string(
    map: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match map.get(field) {
        None | Some(Value::Null) => {
            violations.push(FieldViolation::missing(field, "a string"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            violations.push(FieldViolation::mismatch(field, "a string", other));
            None
        }
    }
}

/// Read an optional string field; absent and `null` both yield `None`.
pub(crate) fn take_optional_string(
    map: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match map.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            violations.push(FieldViolation::mismatch(field, "a string or null", other));
            None
        }
    }
}

/// Read a required integer identifier.
///
/// Accepts any JSON integer that fits `i64` (small or arbitrary-precision
/// representations alike); rejects fractional numbers.
pub(crate) fn take_integer(
    map: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<i64> {
    match map.get(field) {
        None | Some(Value::Null) => {
            violations.push(FieldViolation::missing(field, "an integer"));
            None
        }
        Some(value @ Value::Number(n)) => match integer_from_number(n) {
            Some(id) => Some(id),
            None => {
                violations.push(FieldViolation::mismatch(
                    field,
                    "an integer within i64 range",
                    value,
                ));
                None
            }
        },
        Some(other) => {
            violations.push(FieldViolation::mismatch(field, "an integer", other));
            None
        }
    }
}

/// Read an optional integer field with the same normalization as
/// [`take_integer`].
pub(crate) fn take_optional_integer(
    map: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<i64> {
    match map.get(field) {
        None | Some(Value::Null) => None,
        Some(value @ Value::Number(n)) => match integer_from_number(n) {
            Some(id) => Some(id),
            None => {
                violations.push(FieldViolation::mismatch(
                    field,
                    "an integer within i64 range or null",
                    value,
                ));
                None
            }
        },
        Some(other) => {
            violations.push(FieldViolation::mismatch(field, "an integer or null", other));
            None
        }
    }
}

/// Read a required finite number field.
pub(crate) fn take_number(
    map: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<f64> {
    match map.get(field) {
        None | Some(Value::Null) => {
            violations.push(FieldViolation::missing(field, "a number"));
            None
        }
        Some(value @ Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() => Some(f),
            _ => {
                violations.push(FieldViolation::mismatch(field, "a finite number", value));
                None
            }
        },
        Some(other) => {
            violations.push(FieldViolation::mismatch(field, "a number", other));
            None
        }
    }
}

fn integer_from_number(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    // u64 values beyond i64::MAX do not fit an identifier column.
    n.as_u64().and_then(|u| i64::try_from(u).ok())
}

pub(crate) fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
