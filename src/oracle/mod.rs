//! Oracle ports consumed by the step executor.
//!
//! Each oracle is an external, possibly-unreliable service. The dictionary
//! and normalizer return raw JSON rows on purpose: everything they produce
//! must pass the validation gate before the pipeline trusts it.

use serde_json::Value;
use thiserror::Error;

use crate::contracts::Tier;
use crate::schema::Sense;

pub mod http;

pub use http::HttpOracles;

/// Failure of an external oracle call. Whether it aborts the batch is
/// decided by the workflow graph's per-step metadata, not here.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// The call could not be completed (network, timeout, non-success
    /// status).
    #[error("{oracle} oracle unavailable: {message}")]
    Unavailable {
        oracle: &'static str,
        message: String,
    },
    /// The call completed but the body was not usable.
    #[error("{oracle} oracle returned a malformed response: {message}")]
    Malformed {
        oracle: &'static str,
        message: String,
    },
}

/// Splits Thai text into tokens. Failure is fatal.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, OracleError>;
}

/// Grapheme-to-phoneme conversion. Failure is fatal.
pub trait G2p {
    fn romanize(&self, word: &str) -> Result<String, OracleError>;
}

/// Phonetic analysis on top of a romanization. Failure is fatal.
pub trait PhoneticAnalyzer {
    fn phonetic(&self, word: &str, romanization: &str) -> Result<String, OracleError>;
}

/// Dictionary lookup. An empty result is success, not failure; availability
/// failure is the one tolerable failure kind in the workflow.
pub trait Dictionary {
    fn lookup(&self, word: &str) -> Result<Vec<Value>, OracleError>;
}

/// Inputs for one normalization/enrichment call.
#[derive(Debug, Clone)]
pub struct NormalizeRequest<'a> {
    pub word: &'a str,
    pub senses: &'a [Sense],
    pub tier: Tier,
    pub g2p: Option<&'a str>,
    pub phonetic_en: Option<&'a str>,
    /// Sentence the word appeared in, when enriching from a subtitle.
    pub sentence: Option<&'a str>,
    pub word_index: Option<usize>,
}

/// Language-model normalizer/enricher. Must return exactly one row per input
/// sense; the executor treats a count mismatch as a hard error.
pub trait Normalizer {
    fn normalize(&self, request: &NormalizeRequest<'_>) -> Result<Vec<Value>, OracleError>;
}
