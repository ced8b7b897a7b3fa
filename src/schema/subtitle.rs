//! Subtitle record schema.

use serde::Serialize;
use serde_json::Value;

use super::{
    describe, expect_object, is_blank, reject_unknown_fields, take_number, take_string,
    FieldViolation, SchemaViolation,
};

const FIELDS: &[&str] = &["id", "thai", "start_sec_th", "end_sec_th", "tokens_th"];
const TOKEN_LIST_FIELDS: &[&str] = &["tokens"];

/// Offsets are bounded to one day of media.
const MAX_OFFSET_SEC: f64 = 86_400.0;

/// Tokenizer output attached to a subtitle.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TokenList {
    pub tokens: Vec<String>,
}

/// An utterance with start/end offsets and an optional token list.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Subtitle {
    pub id: String,
    pub thai: String,
    pub start_sec_th: f64,
    pub end_sec_th: f64,
    pub tokens_th: Option<TokenList>,
}

impl Subtitle {
    pub fn parse(value: &Value) -> Result<Self, SchemaViolation> {
        let map = expect_object("subtitle", value)?;
        let mut violations = Vec::new();
        reject_unknown_fields(map, FIELDS, &mut violations);

        let id = take_string(map, "id", &mut violations);
        let thai = take_string(map, "thai", &mut violations);
        let start = take_number(map, "start_sec_th", &mut violations);
        let end = take_number(map, "end_sec_th", &mut violations);

        for (field, offset) in [("start_sec_th", start), ("end_sec_th", end)] {
            if let Some(offset) = offset {
                if !(0.0..=MAX_OFFSET_SEC).contains(&offset) {
                    violations.push(FieldViolation::invalid(
                        field,
                        "is outside the day-length range",
                        "a value between 0 and 86400 seconds",
                        format!("number {offset}"),
                    ));
                }
            }
        }
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                violations.push(FieldViolation::invalid(
                    "end_sec_th",
                    "must be strictly greater than start_sec_th",
                    "end_sec_th > start_sec_th",
                    format!("start {start}, end {end}"),
                ));
            }
        }

        let tokens_th = match map.get("tokens_th") {
            None | Some(Value::Null) => None,
            Some(value) => parse_token_list(value, &mut violations),
        };

        if !violations.is_empty() {
            return Err(SchemaViolation::new("subtitle", violations));
        }
        Ok(Self {
            id: id.expect("id present when no violations"),
            thai: thai.expect("thai present when no violations"),
            start_sec_th: start.expect("start present when no violations"),
            end_sec_th: end.expect("end present when no violations"),
            tokens_th,
        })
    }
}

fn parse_token_list(value: &Value, violations: &mut Vec<FieldViolation>) -> Option<TokenList> {
    let Some(map) = value.as_object() else {
        violations.push(FieldViolation::mismatch(
            "tokens_th",
            "an object with a tokens array",
            value,
        ));
        return None;
    };
    reject_unknown_fields_prefixed(map, violations);

    let Some(raw_tokens) = map.get("tokens") else {
        violations.push(FieldViolation::missing("tokens_th.tokens", "a string array"));
        return None;
    };
    let Some(items) = raw_tokens.as_array() else {
        violations.push(FieldViolation::mismatch(
            "tokens_th.tokens",
            "a string array",
            raw_tokens,
        ));
        return None;
    };
    if items.is_empty() {
        violations.push(FieldViolation::invalid(
            "tokens_th.tokens",
            "must not be empty once present",
            "at least one token",
            "array of 0 items".to_string(),
        ));
        return None;
    }

    let mut tokens = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let field = format!("tokens_th.tokens[{index}]");
        match item {
            Value::String(s) if !is_blank(s) && s.trim() == s => tokens.push(s.clone()),
            Value::String(s) => violations.push(FieldViolation::invalid(
                &field,
                "must be a trimmed, non-empty string",
                "trimmed non-empty token text",
                describe(&Value::String(s.clone())),
            )),
            other => violations.push(FieldViolation::mismatch(&field, "a string", other)),
        }
    }
    if tokens.len() == items.len() {
        Some(TokenList { tokens })
    } else {
        None
    }
}

fn reject_unknown_fields_prefixed(
    map: &serde_json::Map<String, Value>,
    violations: &mut Vec<FieldViolation>,
) {
    for key in map.keys() {
        if !TOKEN_LIST_FIELDS.contains(&key.as_str()) {
            violations.push(FieldViolation::invalid(
                &format!("tokens_th.{key}"),
                "is not a known field",
                "one of the schema fields",
                format!("unknown field {key:?}"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subtitle() -> Value {
        json!({
            "id": "ep1-0042",
            "thai": "บ้านอยู่ไหน",
            "start_sec_th": 12.5,
            "end_sec_th": 14.0
        })
    }

    #[test]
    fn parses_without_tokens() {
        let sub = Subtitle::parse(&subtitle()).unwrap();
        assert!(sub.tokens_th.is_none());
    }

    #[test]
    fn rejects_end_before_start() {
        let mut value = subtitle();
        value["end_sec_th"] = json!(12.5);
        let err = Subtitle::parse(&value).unwrap_err();
        assert!(err.violations.iter().any(|v| v.field == "end_sec_th"));
    }

    #[test]
    fn rejects_offsets_beyond_a_day() {
        let mut value = subtitle();
        value["end_sec_th"] = json!(90_000.0);
        assert!(Subtitle::parse(&value).is_err());
    }

    #[test]
    fn rejects_empty_token_list() {
        let mut value = subtitle();
        value["tokens_th"] = json!({"tokens": []});
        assert!(Subtitle::parse(&value).is_err());
    }

    #[test]
    fn rejects_untrimmed_token() {
        let mut value = subtitle();
        value["tokens_th"] = json!({"tokens": ["บ้าน", " อยู่"]});
        let err = Subtitle::parse(&value).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| v.field == "tokens_th.tokens[1]"));
    }

    #[test]
    fn accepts_token_list() {
        let mut value = subtitle();
        value["tokens_th"] = json!({"tokens": ["บ้าน", "อยู่", "ไหน"]});
        let sub = Subtitle::parse(&value).unwrap();
        assert_eq!(sub.tokens_th.unwrap().tokens.len(), 3);
    }
}
