//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::cell::Cell;

use sensepipe::oracle::{
    Dictionary, G2p, NormalizeRequest, Normalizer, OracleError, PhoneticAnalyzer, Tokenizer,
};
use sensepipe::contracts::Tier;
use sensepipe::pipeline::Oracles;

/// Deterministic oracles that count their calls, so tests can assert that a
/// skipped record touches no oracle at all.
#[derive(Default)]
pub struct ScriptedOracles {
    pub tokenize_calls: Cell<usize>,
    pub g2p_calls: Cell<usize>,
    pub phonetic_calls: Cell<usize>,
    pub lookup_calls: Cell<usize>,
    pub normalize_calls: Cell<usize>,
}

impl ScriptedOracles {
    pub fn total_calls(&self) -> usize {
        self.tokenize_calls.get()
            + self.g2p_calls.get()
            + self.phonetic_calls.get()
            + self.lookup_calls.get()
            + self.normalize_calls.get()
    }

    pub fn as_oracles(&self) -> Oracles<'_> {
        Oracles {
            tokenizer: self,
            g2p: self,
            phonetic: self,
            dictionary: self,
            normalizer: self,
        }
    }
}

impl Tokenizer for ScriptedOracles {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, OracleError> {
        self.tokenize_calls.set(self.tokenize_calls.get() + 1);
        Ok(text.split_whitespace().map(str::to_string).collect())
    }
}

impl G2p for ScriptedOracles {
    fn romanize(&self, word: &str) -> Result<String, OracleError> {
        self.g2p_calls.set(self.g2p_calls.get() + 1);
        Ok(format!("{word}-rom"))
    }
}

impl PhoneticAnalyzer for ScriptedOracles {
    fn phonetic(&self, _word: &str, romanization: &str) -> Result<String, OracleError> {
        self.phonetic_calls.set(self.phonetic_calls.get() + 1);
        Ok(format!("{romanization}-ph"))
    }
}

impl Dictionary for ScriptedOracles {
    fn lookup(&self, word: &str) -> Result<Vec<Value>, OracleError> {
        self.lookup_calls.set(self.lookup_calls.get() + 1);
        Ok(vec![json!({ "definition_th": format!("ความหมายของ{word}") })])
    }
}

impl Normalizer for ScriptedOracles {
    fn normalize(&self, request: &NormalizeRequest<'_>) -> Result<Vec<Value>, OracleError> {
        self.normalize_calls.set(self.normalize_calls.get() + 1);
        Ok(request
            .senses
            .iter()
            .map(|sense| {
                let mut row = serde_json::to_value(sense).expect("serialize sense");
                row["source"] = json!("gpt-normalized");
                if request.tier >= Tier::V2 {
                    row["pos_th"] = json!("นาม");
                    row["pos_eng"] = json!("noun");
                    row["definition_eng"] = json!("a dwelling");
                }
                if request.tier >= Tier::V3 {
                    row["label_eng"] = json!("house");
                }
                row
            })
            .collect())
    }
}

/// A G2P oracle that always fails, for fatal-abort tests.
pub struct BrokenG2p;

impl G2p for BrokenG2p {
    fn romanize(&self, _word: &str) -> Result<String, OracleError> {
        Err(OracleError::Unavailable {
            oracle: "g2p",
            message: "service down".to_string(),
        })
    }
}
