use super::*;
use crate::events::NoopSink;
use crate::pipeline::classifier;
use serde_json::json;

/// Oracle stub that must not be reached.
struct NoCall;

impl Tokenizer for NoCall {
    fn tokenize(&self, _text: &str) -> Result<Vec<String>, OracleError> {
        panic!("tokenizer must not be called");
    }
}

impl G2p for NoCall {
    fn romanize(&self, _word: &str) -> Result<String, OracleError> {
        panic!("g2p must not be called");
    }
}

impl PhoneticAnalyzer for NoCall {
    fn phonetic(&self, _word: &str, _romanization: &str) -> Result<String, OracleError> {
        panic!("phonetic analyzer must not be called");
    }
}

impl Dictionary for NoCall {
    fn lookup(&self, _word: &str) -> Result<Vec<serde_json::Value>, OracleError> {
        panic!("dictionary must not be called");
    }
}

impl Normalizer for NoCall {
    fn normalize(&self, _request: &NormalizeRequest<'_>) -> Result<Vec<serde_json::Value>, OracleError> {
        panic!("normalizer must not be called");
    }
}

struct FixedG2p(&'static str);

impl G2p for FixedG2p {
    fn romanize(&self, _word: &str) -> Result<String, OracleError> {
        Ok(self.0.to_string())
    }
}

struct FixedPhonetic(&'static str);

impl PhoneticAnalyzer for FixedPhonetic {
    fn phonetic(&self, _word: &str, _romanization: &str) -> Result<String, OracleError> {
        Ok(self.0.to_string())
    }
}

struct FixedDictionary(Vec<serde_json::Value>);

impl Dictionary for FixedDictionary {
    fn lookup(&self, _word: &str) -> Result<Vec<serde_json::Value>, OracleError> {
        Ok(self.0.clone())
    }
}

struct FailingDictionary;

impl Dictionary for FailingDictionary {
    fn lookup(&self, _word: &str) -> Result<Vec<serde_json::Value>, OracleError> {
        Err(OracleError::Unavailable {
            oracle: "dictionary",
            message: "connection refused".to_string(),
        })
    }
}

/// Replaces each sense's provenance with a normalized marker.
struct MarkingNormalizer;

impl Normalizer for MarkingNormalizer {
    fn normalize(
        &self,
        request: &NormalizeRequest<'_>,
    ) -> Result<Vec<serde_json::Value>, OracleError> {
        Ok(request
            .senses
            .iter()
            .map(|sense| {
                let mut row = serde_json::to_value(sense).expect("serialize sense");
                row["source"] = json!("gpt-normalized");
                row
            })
            .collect())
    }
}

/// Drops the last sense, breaking the same-count rule.
struct DroppingNormalizer;

impl Normalizer for DroppingNormalizer {
    fn normalize(
        &self,
        request: &NormalizeRequest<'_>,
    ) -> Result<Vec<serde_json::Value>, OracleError> {
        let mut rows: Vec<serde_json::Value> = request
            .senses
            .iter()
            .map(|sense| serde_json::to_value(sense).expect("serialize sense"))
            .collect();
        rows.pop();
        Ok(rows)
    }
}

fn raw_sense(id: i64) -> Sense {
    Sense::parse(&json!({
        "id": id,
        "definition_th": "ที่อยู่อาศัย",
        "source": "orst",
    }))
    .unwrap()
}

fn word_context() -> PipelineContext {
    PipelineContext {
        word: Some("บ้าน".to_string()),
        ..Default::default()
    }
}

#[test]
fn injects_g2p_when_phonetic_requested_without_romanization() {
    let g2p = FixedG2p("baan4");
    let phonetic = FixedPhonetic("baan");
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &g2p,
        phonetic: &phonetic,
        dictionary: &NoCall,
        normalizer: &NoCall,
    };
    let run = execute(
        oracles,
        &[StepName::Phonetic],
        word_context(),
        Tier::V1,
        &CancelToken::new(),
        &NoopSink,
    )
    .unwrap();

    let steps: Vec<StepName> = run.results.iter().map(|r| r.step).collect();
    assert_eq!(steps, vec![StepName::G2p, StepName::Phonetic]);
    assert_eq!(run.context.g2p.as_deref(), Some("baan4"));
    assert_eq!(run.context.phonetic_en.as_deref(), Some("baan"));
}

#[test]
fn does_not_rerun_g2p_when_romanization_present() {
    let phonetic = FixedPhonetic("baan");
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &NoCall,
        phonetic: &phonetic,
        dictionary: &NoCall,
        normalizer: &NoCall,
    };
    let mut context = word_context();
    context.g2p = Some("baan4".to_string());
    let run = execute(
        oracles,
        &[StepName::Phonetic],
        context,
        Tier::V1,
        &CancelToken::new(),
        &NoopSink,
    )
    .unwrap();

    let steps: Vec<StepName> = run.results.iter().map(|r| r.step).collect();
    assert_eq!(steps, vec![StepName::Phonetic]);
}

#[test]
fn runs_steps_in_graph_order_not_caller_order() {
    let g2p = FixedG2p("baan4");
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &g2p,
        phonetic: &NoCall,
        dictionary: &NoCall,
        normalizer: &MarkingNormalizer,
    };
    let mut context = word_context();
    context.senses = Some(vec![raw_sense(1)]);
    let run = execute(
        oracles,
        &[StepName::Normalize, StepName::G2p],
        context,
        Tier::V1,
        &CancelToken::new(),
        &NoopSink,
    )
    .unwrap();

    let steps: Vec<StepName> = run.results.iter().map(|r| r.step).collect();
    assert_eq!(steps, vec![StepName::G2p, StepName::Normalize]);
    let senses = run.context.senses.unwrap();
    assert_eq!(senses[0].source.as_deref(), Some("gpt-normalized"));
}

#[test]
fn tolerable_dictionary_failure_skips_normalize_and_does_not_abort() {
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &NoCall,
        phonetic: &NoCall,
        dictionary: &FailingDictionary,
        normalizer: &NoCall,
    };
    let run = execute(
        oracles,
        &[StepName::DictLookup, StepName::Normalize],
        word_context(),
        Tier::V1,
        &CancelToken::new(),
        &NoopSink,
    )
    .unwrap();

    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].step, StepName::DictLookup);
    assert!(!run.results[0].success);
    assert!(classifier::ensure_no_fatal(&run.results).is_ok());
}

#[test]
fn zero_dictionary_senses_is_success_and_normalize_is_left_unrun() {
    let dictionary = FixedDictionary(Vec::new());
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &NoCall,
        phonetic: &NoCall,
        dictionary: &dictionary,
        normalizer: &NoCall,
    };
    let run = execute(
        oracles,
        &[StepName::DictLookup, StepName::Normalize],
        word_context(),
        Tier::V1,
        &CancelToken::new(),
        &NoopSink,
    )
    .unwrap();

    assert_eq!(run.results.len(), 1);
    assert!(run.results[0].success);
    assert_eq!(run.context.raw_senses.as_deref().map(<[Sense]>::len), Some(0));
    assert!(run.context.senses.is_none());
}

#[test]
fn normalize_count_mismatch_is_a_fatal_step_failure() {
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &NoCall,
        phonetic: &NoCall,
        dictionary: &NoCall,
        normalizer: &DroppingNormalizer,
    };
    let mut context = word_context();
    context.raw_senses = Some(vec![raw_sense(1), raw_sense(2), raw_sense(3)]);
    let run = execute(
        oracles,
        &[StepName::Normalize],
        context,
        Tier::V1,
        &CancelToken::new(),
        &NoopSink,
    )
    .unwrap();

    assert!(!run.results[0].success);
    assert!(run.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("2 senses for 3 inputs"));
    assert!(classifier::ensure_no_fatal(&run.results).is_err());
}

#[test]
fn dictionary_rows_without_identifiers_get_derived_ones() {
    let dictionary = FixedDictionary(vec![
        json!({"definition_th": "ที่อยู่อาศัย"}),
        json!({"definition_th": "ครอบครัว"}),
    ]);
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &NoCall,
        phonetic: &NoCall,
        dictionary: &dictionary,
        normalizer: &NoCall,
    };
    let run = execute(
        oracles,
        &[StepName::DictLookup],
        word_context(),
        Tier::V1,
        &CancelToken::new(),
        &NoopSink,
    )
    .unwrap();

    let senses = run.context.raw_senses.unwrap();
    assert_eq!(senses[0].id, crate::store::derived_sense_id("บ้าน", 0));
    assert_eq!(senses[1].id, crate::store::derived_sense_id("บ้าน", 1));
    assert_eq!(senses[0].word_th_id.as_deref(), Some("บ้าน"));
    assert!(senses[0].has_raw_source());
}

#[test]
fn malformed_dictionary_row_is_rejected_by_the_gate() {
    let dictionary = FixedDictionary(vec![json!({"id": "not-a-number"})]);
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &NoCall,
        phonetic: &NoCall,
        dictionary: &dictionary,
        normalizer: &NoCall,
    };
    let err = execute(
        oracles,
        &[StepName::DictLookup],
        word_context(),
        Tier::V1,
        &CancelToken::new(),
        &NoopSink,
    )
    .unwrap_err();
    assert!(matches!(err, ExecError::GateRejected { .. }));
}

#[test]
fn missing_requirement_aborts() {
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &NoCall,
        phonetic: &NoCall,
        dictionary: &NoCall,
        normalizer: &NoCall,
    };
    let err = execute(
        oracles,
        &[StepName::G2p],
        PipelineContext::default(),
        Tier::V1,
        &CancelToken::new(),
        &NoopSink,
    )
    .unwrap_err();
    assert!(matches!(err, ExecError::MissingRequirement { .. }));
}

#[test]
fn cancellation_stops_the_run_before_the_next_step() {
    let oracles = Oracles {
        tokenizer: &NoCall,
        g2p: &NoCall,
        phonetic: &NoCall,
        dictionary: &NoCall,
        normalizer: &NoCall,
    };
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = execute(
        oracles,
        &[StepName::G2p],
        word_context(),
        Tier::V1,
        &cancel,
        &NoopSink,
    )
    .unwrap_err();
    assert!(matches!(err, ExecError::Cancelled { .. }));
}
