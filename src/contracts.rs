//! Completeness contracts layered on the record schemas.
//!
//! A contract never weakens its base schema: callers hold an
//! already-parsed record, so structural validation has run before any
//! predicate here is evaluated. Failures carry the same structured per-field
//! shape as schema violations but in a distinct type, so "malformed" and
//! "not yet complete" cannot be conflated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::schema::{FieldViolation, SchemaVersion, Sense, Word};

/// Target enrichment tier, evaluated in V1 → V2 → V3 priority.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    V1,
    V2,
    V3,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::V1 => "v1",
            Tier::V2 => "v2",
            Tier::V3 => "v3",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" => Ok(Tier::V1),
            "v2" => Ok(Tier::V2),
            "v3" => Ok(Tier::V3),
            other => Err(format!("unknown tier {other:?} (expected v1, v2, or v3)")),
        }
    }
}

/// Business-rule failure: the record is structurally valid but not done.
///
/// Not an error in the batch sense; this is the signal the skip planner
/// turns into work.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[error("{contract} not satisfied: {}", summarize(.violations))]
pub struct ContractViolation {
    pub contract: &'static str,
    pub violations: Vec<FieldViolation>,
}

impl ContractViolation {
    fn new(contract: &'static str, violations: Vec<FieldViolation>) -> Self {
        Self {
            contract,
            violations,
        }
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|violation| violation.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn blank_violation(field: &str, found: Option<&str>) -> FieldViolation {
    match found {
        Some(text) => FieldViolation::invalid(
            field,
            "must not be blank",
            "non-blank text",
            format!("string {text:?}"),
        ),
        None => FieldViolation::missing(field, "non-blank text"),
    }
}

fn is_populated(field: Option<&str>) -> bool {
    field.map(|text| !text.trim().is_empty()).unwrap_or(false)
}

/// `CompleteWord`: romanization OR phonetic spelling present and non-blank.
pub fn complete_word(word: &Word) -> Result<(), ContractViolation> {
    if is_populated(word.g2p.as_deref()) || is_populated(word.phonetic_en.as_deref()) {
        return Ok(());
    }
    Err(ContractViolation::new(
        "complete_word",
        vec![
            blank_violation("g2p", word.g2p.as_deref()),
            blank_violation("phonetic_en", word.phonetic_en.as_deref()),
        ],
    ))
}

/// `NormalizedSense`: provenance present and not the raw-dictionary marker.
pub fn normalized_sense(sense: &Sense) -> Result<(), ContractViolation> {
    match sense.source.as_deref() {
        None => Err(ContractViolation::new(
            "normalized_sense",
            vec![FieldViolation::missing("source", "a provenance tag")],
        )),
        Some(source) if source.trim().is_empty() => Err(ContractViolation::new(
            "normalized_sense",
            vec![blank_violation("source", Some(source))],
        )),
        Some(_) if sense.has_raw_source() => Err(ContractViolation::new(
            "normalized_sense",
            vec![FieldViolation::invalid(
                "source",
                "still carries the raw-dictionary marker",
                "a provenance tag other than the raw-dictionary marker",
                format!("string {:?}", sense.source.as_deref().unwrap_or_default()),
            )],
        )),
        Some(_) => Ok(()),
    }
}

/// `V2CompleteSense`: normalized plus all three V2 fields non-blank.
pub fn v2_complete_sense(sense: &Sense) -> Result<(), ContractViolation> {
    normalized_sense(sense)?;
    let mut violations = Vec::new();
    for (field, value) in [
        ("pos_th", sense.pos_th.as_deref()),
        ("pos_eng", sense.pos_eng.as_deref()),
        ("definition_eng", sense.definition_eng.as_deref()),
    ] {
        if !is_populated(value) {
            violations.push(blank_violation(field, value));
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ContractViolation::new("v2_complete_sense", violations))
    }
}

/// `V3CompleteSense`: V2-complete plus the one-word gloss populated.
pub fn v3_complete_sense(sense: &Sense) -> Result<(), ContractViolation> {
    v2_complete_sense(sense)?;
    if is_populated(sense.label_eng.as_deref()) {
        debug_assert_eq!(sense.schema_version, SchemaVersion::V3);
        Ok(())
    } else {
        Err(ContractViolation::new(
            "v3_complete_sense",
            vec![blank_violation("label_eng", sense.label_eng.as_deref())],
        ))
    }
}

/// The sense contract matching a target tier.
pub fn sense_satisfies_tier(sense: &Sense, tier: Tier) -> Result<(), ContractViolation> {
    match tier {
        Tier::V1 => normalized_sense(sense),
        Tier::V2 => v2_complete_sense(sense),
        Tier::V3 => v3_complete_sense(sense),
    }
}

/// `CompleteToken`: the word is complete and, if any senses exist, every one
/// of them satisfies the tier's sense contract.
pub fn complete_token(word: &Word, senses: &[Sense], tier: Tier) -> Result<(), ContractViolation> {
    complete_word(word)?;
    for sense in senses {
        sense_satisfies_tier(sense, tier)?;
    }
    Ok(())
}
