//! The step executor.
//!
//! Runs a requested subset of steps in workflow order, threading one
//! [`PipelineContext`] through the chain. The context is validated
//! immediately before and after every step; steps are pure functions of the
//! context and the executor merges their outputs into a fresh context, so a
//! retried run sees exactly the inputs of the first attempt.

use serde_json::Value;
use thiserror::Error;

use super::context::StepOutput;
use super::{graph_order, spec_for, CancelToken, Output, PipelineContext, Requirement, StepName,
    StepResult};
use crate::contracts::Tier;
use crate::events::{ProgressSink, StepEvent};
use crate::gate;
use crate::oracle::{Dictionary, G2p, NormalizeRequest, Normalizer, OracleError, PhoneticAnalyzer,
    Tokenizer};
use crate::schema::{SchemaViolation, Sense};

/// The oracle ports one executor run calls into.
#[derive(Clone, Copy)]
pub struct Oracles<'a> {
    pub tokenizer: &'a dyn Tokenizer,
    pub g2p: &'a dyn G2p,
    pub phonetic: &'a dyn PhoneticAnalyzer,
    pub dictionary: &'a dyn Dictionary,
    pub normalizer: &'a dyn Normalizer,
}

/// Immediate executor aborts. These are never tolerable: a context shape
/// violation or a gate rejection is a programming/integration error, not a
/// step outcome.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("pipeline context invalid {when} step {step}: {violation}")]
    ContextInvalid {
        step: StepName,
        when: &'static str,
        violation: SchemaViolation,
    },
    #[error("step {step} requires {requirement} but the context does not provide it")]
    MissingRequirement {
        step: StepName,
        requirement: &'static str,
    },
    #[error("{step} produced a row the validation gate rejected: {violation}")]
    GateRejected {
        step: StepName,
        violation: SchemaViolation,
    },
    #[error("run cancelled before step {step}")]
    Cancelled { step: StepName },
}

/// Outcome of one executor invocation: ordered per-step results plus the
/// final context.
#[derive(Debug)]
pub struct ExecutorRun {
    pub results: Vec<StepResult>,
    pub context: PipelineContext,
}

#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Oracle(OracleError),
    #[error("normalizer returned {got} senses for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
    #[error("normalizer changed sense identifier {expected} to {got}")]
    IdMismatch { expected: i64, got: i64 },
}

enum ReqState {
    Met,
    /// Nothing to do for this step; leave it un-run so the next planner
    /// cycle schedules it again.
    Skip(String),
    Unmet,
}

/// Run `requested` steps in workflow order against `context`.
///
/// `phonetic` is never run without a romanization in context: when the
/// requested subset lacks `g2p` and the context has no romanization, `g2p`
/// is injected ahead of it.
pub fn execute(
    oracles: Oracles<'_>,
    requested: &[StepName],
    context: PipelineContext,
    tier: Tier,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> Result<ExecutorRun, ExecError> {
    let mut steps = graph_order(requested);
    if steps.contains(&StepName::Phonetic)
        && !context.has_romanization()
        && !steps.contains(&StepName::G2p)
    {
        steps.push(StepName::G2p);
        steps = graph_order(&steps);
        tracing::debug!("injected g2p ahead of phonetic: context lacks a romanization");
    }

    let subject = context
        .word
        .clone()
        .unwrap_or_else(|| "<input>".to_string());
    let mut results = Vec::with_capacity(steps.len());
    let mut failed_outputs: Vec<Output> = Vec::new();
    let mut context = context;

    for step in steps {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled { step });
        }
        let spec = spec_for(step);

        match requirements_state(&context, spec.requires, &failed_outputs) {
            ReqState::Met => {}
            ReqState::Skip(reason) => {
                tracing::warn!(step = %step, reason = %reason, "step skipped");
                continue;
            }
            ReqState::Unmet => {
                let requirement = spec
                    .requires
                    .iter()
                    .find(|req| !requirement_met(&context, **req))
                    .map(requirement_label)
                    .unwrap_or("an unknown field");
                return Err(ExecError::MissingRequirement { step, requirement });
            }
        }

        context
            .validate()
            .map_err(|violation| ExecError::ContextInvalid {
                step,
                when: "before",
                violation,
            })?;

        match run_step(oracles, step, &context, tier)? {
            Ok(output) => {
                let next = context.merged(output);
                next.validate()
                    .map_err(|violation| ExecError::ContextInvalid {
                        step,
                        when: "after",
                        violation,
                    })?;
                context = next;
                sink.step_completed(&StepEvent {
                    subject: &subject,
                    step,
                    success: true,
                    error: None,
                });
                results.push(StepResult {
                    step,
                    success: true,
                    error: None,
                });
            }
            Err(error) => {
                let message = error.to_string();
                sink.step_completed(&StepEvent {
                    subject: &subject,
                    step,
                    success: false,
                    error: Some(&message),
                });
                results.push(StepResult {
                    step,
                    success: false,
                    error: Some(message),
                });
                if spec.tolerable {
                    failed_outputs.extend_from_slice(spec.produces);
                } else {
                    // A broken pipeline; downstream steps would only compound
                    // the damage. The classifier turns this into an abort.
                    break;
                }
            }
        }
    }

    Ok(ExecutorRun { results, context })
}

fn requirement_met(context: &PipelineContext, requirement: Requirement) -> bool {
    match requirement {
        Requirement::InputText => context
            .input_text
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false),
        Requirement::WordText => context
            .word
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false),
        Requirement::Romanization => context.has_romanization(),
        Requirement::AnySenses => context.senses_for_normalize().is_some(),
    }
}

fn requirements_state(
    context: &PipelineContext,
    requires: &[Requirement],
    failed_outputs: &[Output],
) -> ReqState {
    for requirement in requires {
        if requirement_met(context, *requirement) {
            continue;
        }
        if failed_outputs.iter().any(|out| out.satisfies(*requirement)) {
            return ReqState::Skip(format!(
                "{} unavailable after a tolerable failure",
                requirement_label(requirement)
            ));
        }
        // The dictionary ran and found nothing: there is nothing to
        // normalize, and the record stays incomplete.
        if matches!(requirement, Requirement::AnySenses)
            && context
                .raw_senses
                .as_deref()
                .map(|senses| senses.is_empty())
                .unwrap_or(false)
        {
            return ReqState::Skip("dictionary lookup produced zero senses".to_string());
        }
        return ReqState::Unmet;
    }
    ReqState::Met
}

fn requirement_label(requirement: &Requirement) -> &'static str {
    match requirement {
        Requirement::InputText => "input text",
        Requirement::WordText => "word text",
        Requirement::Romanization => "a romanization",
        Requirement::AnySenses => "senses to normalize",
    }
}

/// Run one step. The outer `Result` carries executor aborts (gate
/// rejections); the inner one the step outcome fed to the classifier.
fn run_step(
    oracles: Oracles<'_>,
    step: StepName,
    context: &PipelineContext,
    tier: Tier,
) -> Result<Result<StepOutput, StepError>, ExecError> {
    match step {
        StepName::Tokenize => {
            let text = context.input_text.as_deref().unwrap_or_default();
            Ok(run_tokenize(oracles.tokenizer, text))
        }
        StepName::G2p => {
            let word = context.word.as_deref().unwrap_or_default();
            Ok(run_g2p(oracles.g2p, word))
        }
        StepName::Phonetic => {
            let word = context.word.as_deref().unwrap_or_default();
            let romanization = context.g2p.as_deref().unwrap_or_default();
            Ok(run_phonetic(oracles.phonetic, word, romanization))
        }
        StepName::DictLookup => {
            let word = context.word.as_deref().unwrap_or_default();
            run_dict_lookup(oracles.dictionary, word, step)
        }
        StepName::Normalize => run_normalize(oracles.normalizer, context, tier, step),
    }
}

fn run_tokenize(tokenizer: &dyn Tokenizer, text: &str) -> Result<StepOutput, StepError> {
    let raw = tokenizer.tokenize(text).map_err(StepError::Oracle)?;
    let tokens: Vec<String> = raw
        .iter()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(StepError::Oracle(OracleError::Malformed {
            oracle: "tokenizer",
            message: "no usable tokens in response".to_string(),
        }));
    }
    Ok(StepOutput::Tokens(tokens))
}

fn run_g2p(g2p: &dyn G2p, word: &str) -> Result<StepOutput, StepError> {
    let romanization = g2p.romanize(word).map_err(StepError::Oracle)?;
    if romanization.trim().is_empty() {
        return Err(StepError::Oracle(OracleError::Malformed {
            oracle: "g2p",
            message: "blank romanization".to_string(),
        }));
    }
    Ok(StepOutput::Romanization(romanization.trim().to_string()))
}

fn run_phonetic(
    analyzer: &dyn PhoneticAnalyzer,
    word: &str,
    romanization: &str,
) -> Result<StepOutput, StepError> {
    let phonetic = analyzer
        .phonetic(word, romanization)
        .map_err(StepError::Oracle)?;
    if phonetic.trim().is_empty() {
        return Err(StepError::Oracle(OracleError::Malformed {
            oracle: "phonetic",
            message: "blank phonetic spelling".to_string(),
        }));
    }
    Ok(StepOutput::Phonetic(phonetic.trim().to_string()))
}

fn run_dict_lookup(
    dictionary: &dyn Dictionary,
    word: &str,
    step: StepName,
) -> Result<Result<StepOutput, StepError>, ExecError> {
    let rows = match dictionary.lookup(word) {
        Ok(rows) => rows,
        Err(err) => return Ok(Err(StepError::Oracle(err))),
    };
    let prepared: Vec<Value> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| prepare_dict_row(row, word, index))
        .collect();
    let senses = parse_rows(&prepared, step)?;
    Ok(Ok(StepOutput::RawSenses(senses)))
}

/// Fill in the fields the dictionary wire format does not know about: the
/// hash-derived identifier for rows without one, the foreign key back to the
/// word, and the raw provenance marker. Everything else still has to earn
/// its way through the gate.
fn prepare_dict_row(row: &Value, word: &str, index: usize) -> Value {
    let mut row = row.clone();
    let Some(map) = row.as_object_mut() else {
        return row;
    };
    if !map.contains_key("id") || map.get("id") == Some(&Value::Null) {
        map.insert(
            "id".to_string(),
            Value::from(crate::store::derived_sense_id(word, index)),
        );
    }
    if !map.contains_key("word_th_id") || map.get("word_th_id") == Some(&Value::Null) {
        map.insert("word_th_id".to_string(), Value::from(word));
    }
    if !map.contains_key("source") || map.get("source") == Some(&Value::Null) {
        map.insert(
            "source".to_string(),
            Value::from(crate::schema::RAW_DICT_SOURCE),
        );
    }
    row
}

fn run_normalize(
    normalizer: &dyn Normalizer,
    context: &PipelineContext,
    tier: Tier,
    step: StepName,
) -> Result<Result<StepOutput, StepError>, ExecError> {
    let input = context
        .senses_for_normalize()
        .expect("requirements checked before step runs");
    let request = NormalizeRequest {
        word: context.word.as_deref().unwrap_or_default(),
        senses: input,
        tier,
        g2p: context.g2p.as_deref(),
        phonetic_en: context.phonetic_en.as_deref(),
        sentence: context.sentence.as_deref(),
        word_index: context.word_index,
    };
    let rows = match normalizer.normalize(&request) {
        Ok(rows) => rows,
        Err(err) => return Ok(Err(StepError::Oracle(err))),
    };
    if rows.len() != input.len() {
        return Ok(Err(StepError::CountMismatch {
            expected: input.len(),
            got: rows.len(),
        }));
    }
    let senses = parse_rows(&rows, step)?;
    for (before, after) in input.iter().zip(senses.iter()) {
        if before.id != after.id {
            return Ok(Err(StepError::IdMismatch {
                expected: before.id,
                got: after.id,
            }));
        }
    }
    Ok(Ok(StepOutput::Senses(senses)))
}

/// Every oracle-sourced row passes the gate; a rejection aborts the run.
fn parse_rows(rows: &[Value], step: StepName) -> Result<Vec<Sense>, ExecError> {
    rows.iter()
        .map(|row| {
            gate::enforce::<Sense>(row)
                .map(crate::gate::Valid::into_inner)
                .map_err(|violation| ExecError::GateRejected { step, violation })
        })
        .collect()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
