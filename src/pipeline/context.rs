//! The context object threaded through one executor run.

use serde::Serialize;
use serde_json::Value;

use crate::schema::{FieldViolation, SchemaViolation, Sense};

/// Everything one workflow run accumulates. Steps read a subset and write a
/// subset; this object is the only channel between them, and it is owned by
/// exactly one executor invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineContext {
    /// Full utterance text, input to tokenization.
    pub input_text: Option<String>,
    /// The word under enrichment.
    pub word: Option<String>,
    pub g2p: Option<String>,
    pub phonetic_en: Option<String>,
    /// Senses fresh from the dictionary lookup, still raw-marked.
    pub raw_senses: Option<Vec<Sense>>,
    /// Normalized or enriched senses.
    pub senses: Option<Vec<Sense>>,
    pub tokens: Option<Vec<String>>,
    /// Sentence surrounding the word, a hint for the normalizer.
    pub sentence: Option<String>,
    /// Zero-based position of the word within the sentence.
    pub word_index: Option<usize>,
}

/// Fields a single step writes; the executor merges these into a fresh
/// context rather than letting steps mutate in place.
#[derive(Debug, Clone)]
pub enum StepOutput {
    Tokens(Vec<String>),
    Romanization(String),
    Phonetic(String),
    RawSenses(Vec<Sense>),
    Senses(Vec<Sense>),
}

impl PipelineContext {
    /// Validate the context shape. A failure here is a programming or
    /// integration error, never a tolerable step failure.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        let mut violations = Vec::new();

        for (field, value) in [
            ("input_text", self.input_text.as_deref()),
            ("word", self.word.as_deref()),
            ("g2p", self.g2p.as_deref()),
            ("phonetic_en", self.phonetic_en.as_deref()),
            ("sentence", self.sentence.as_deref()),
        ] {
            if let Some(text) = value {
                if text.trim().is_empty() {
                    violations.push(FieldViolation::invalid(
                        field,
                        "must not be blank once present",
                        "non-blank text",
                        format!("string {text:?}"),
                    ));
                }
            }
        }

        if let Some(tokens) = self.tokens.as_deref() {
            if tokens.is_empty() {
                violations.push(FieldViolation::invalid(
                    "tokens",
                    "must not be empty once present",
                    "at least one token",
                    "array of 0 items".to_string(),
                ));
            }
            for (index, token) in tokens.iter().enumerate() {
                if token.trim().is_empty() || token.trim() != token {
                    violations.push(FieldViolation::invalid(
                        &format!("tokens[{index}]"),
                        "must be a trimmed, non-empty string",
                        "trimmed non-empty token text",
                        crate::schema::describe(&Value::String(token.clone())),
                    ));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolation::new("pipeline_context", violations))
        }
    }

    /// The senses the normalize step should work on: fresh raw senses win
    /// over previously persisted ones.
    pub fn senses_for_normalize(&self) -> Option<&[Sense]> {
        self.raw_senses
            .as_deref()
            .or(self.senses.as_deref())
            .filter(|senses| !senses.is_empty())
    }

    pub fn has_romanization(&self) -> bool {
        self.g2p
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }

    /// Merge a step's output into a new context, leaving `self` untouched.
    pub fn merged(&self, output: StepOutput) -> Self {
        let mut next = self.clone();
        match output {
            StepOutput::Tokens(tokens) => next.tokens = Some(tokens),
            StepOutput::Romanization(g2p) => next.g2p = Some(g2p),
            StepOutput::Phonetic(phonetic) => next.phonetic_en = Some(phonetic),
            StepOutput::RawSenses(senses) => next.raw_senses = Some(senses),
            StepOutput::Senses(senses) => {
                next.senses = Some(senses);
                // Raw senses are consumed by normalization; keeping them
                // would make the next planner cycle see stale raw input.
                next.raw_senses = None;
            }
        }
        next
    }
}
