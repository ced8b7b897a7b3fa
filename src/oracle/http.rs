//! Blocking HTTP clients for the five oracles.
//!
//! One agent with a global per-call timeout serves every endpoint; a hung
//! oracle fails its call instead of blocking the batch forever.

use serde_json::{json, Value};
use std::time::{Duration, Instant};
use ureq::Agent;

use super::{Dictionary, G2p, NormalizeRequest, Normalizer, OracleError, PhoneticAnalyzer, Tokenizer};
use crate::config::PipelineConfig;

/// HTTP-backed implementations of all five oracle ports.
pub struct HttpOracles {
    agent: Agent,
    tokenizer_url: String,
    g2p_url: String,
    phonetic_url: String,
    dictionary_url: String,
    normalizer_url: String,
}

impl HttpOracles {
    pub fn new(config: &PipelineConfig) -> Self {
        let agent_config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.oracle_timeout_secs)))
            .build();
        Self {
            agent: Agent::new_with_config(agent_config),
            tokenizer_url: config.tokenizer_url.clone(),
            g2p_url: config.g2p_url.clone(),
            phonetic_url: config.phonetic_url.clone(),
            dictionary_url: config.dictionary_url.clone(),
            normalizer_url: config.normalizer_url.clone(),
        }
    }

    fn post(&self, oracle: &'static str, url: &str, body: Value) -> Result<Value, OracleError> {
        let start = Instant::now();
        let mut response =
            self.agent
                .post(url)
                .send_json(&body)
                .map_err(|err| OracleError::Unavailable {
                    oracle,
                    message: err.to_string(),
                })?;
        let value: Value =
            response
                .body_mut()
                .read_json()
                .map_err(|err| OracleError::Malformed {
                    oracle,
                    message: err.to_string(),
                })?;
        tracing::debug!(
            oracle,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "oracle call complete"
        );
        Ok(value)
    }
}

fn string_field(
    oracle: &'static str,
    body: &Value,
    field: &str,
) -> Result<String, OracleError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| OracleError::Malformed {
            oracle,
            message: format!("response missing string field {field:?}"),
        })
}

fn array_field(
    oracle: &'static str,
    body: &Value,
    field: &str,
) -> Result<Vec<Value>, OracleError> {
    body.get(field)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| OracleError::Malformed {
            oracle,
            message: format!("response missing array field {field:?}"),
        })
}

impl Tokenizer for HttpOracles {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, OracleError> {
        let body = self.post("tokenizer", &self.tokenizer_url, json!({ "text": text }))?;
        let tokens = array_field("tokenizer", &body, "tokens")?;
        tokens
            .iter()
            .map(|token| {
                token
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| OracleError::Malformed {
                        oracle: "tokenizer",
                        message: "tokens array contains a non-string entry".to_string(),
                    })
            })
            .collect()
    }
}

impl G2p for HttpOracles {
    fn romanize(&self, word: &str) -> Result<String, OracleError> {
        let body = self.post("g2p", &self.g2p_url, json!({ "word": word }))?;
        string_field("g2p", &body, "romanization")
    }
}

impl PhoneticAnalyzer for HttpOracles {
    fn phonetic(&self, word: &str, romanization: &str) -> Result<String, OracleError> {
        let body = self.post(
            "phonetic",
            &self.phonetic_url,
            json!({ "word": word, "romanization": romanization }),
        )?;
        string_field("phonetic", &body, "phonetic")
    }
}

impl Dictionary for HttpOracles {
    fn lookup(&self, word: &str) -> Result<Vec<Value>, OracleError> {
        let body = self.post("dictionary", &self.dictionary_url, json!({ "word": word }))?;
        array_field("dictionary", &body, "senses")
    }
}

impl Normalizer for HttpOracles {
    fn normalize(&self, request: &NormalizeRequest<'_>) -> Result<Vec<Value>, OracleError> {
        let body = self.post(
            "normalizer",
            &self.normalizer_url,
            json!({
                "word": request.word,
                "tier": request.tier.as_str(),
                "senses": request.senses,
                "g2p": request.g2p,
                "phonetic_en": request.phonetic_en,
                "sentence": request.sentence,
                "word_index": request.word_index,
            }),
        )?;
        array_field("normalizer", &body, "senses")
    }
}
