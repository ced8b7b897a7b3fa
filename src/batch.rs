//! Sequential batch runner.
//!
//! Processes subtitles, then tokens, strictly in order: plan → execute →
//! classify → persist → read back → re-validate. A fatal step failure
//! aborts the whole batch by unwinding; tolerable failures are recorded on
//! the record outcome for the caller to compensate.

use serde::Serialize;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::config::{PipelineConfig, ReadbackPolicy};
use crate::contracts::Tier;
use crate::events::{ProgressSink, RecordEvent};
use crate::gate;
use crate::pipeline::classifier::{self, FatalFailures};
use crate::pipeline::{execute, CancelToken, ExecError, Oracles, PipelineContext, StepName,
    StepResult};
use crate::planner;
use crate::schema::{SchemaViolation, Subtitle, TokenList, Word};
use crate::store::{self, Store, StoreError};

/// Batch-level knobs lifted out of the full config.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub target_tier: Tier,
    pub pause_between_ms: u64,
    pub readback: ReadbackPolicy,
}

impl BatchOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            target_tier: config.target_tier,
            pause_between_ms: config.pause_between_ms,
            readback: config.readback,
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch aborted at {subject}: {source}")]
    Fatal {
        subject: String,
        #[source]
        source: FatalFailures,
    },
    #[error("batch aborted at {subject}: {source}")]
    Executor {
        subject: String,
        #[source]
        source: ExecError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("record failed validation at the batch boundary: {0}")]
    Gate(#[from] SchemaViolation),
    #[error("read-back mismatch for {subject}: {detail}")]
    ReadbackMismatch { subject: String, detail: String },
    #[error("batch cancelled")]
    Cancelled,
}

/// Outcome of one record (word) inside a batch run.
#[derive(Debug, Serialize)]
pub struct RecordOutcome {
    pub word_th: String,
    pub results: Vec<StepResult>,
    /// The planner found nothing to do.
    pub skipped: bool,
    /// The record re-plans to zero steps after this run.
    pub complete: bool,
    /// A tolerable oracle failure occurred; the record is not processed and
    /// the caller owns the compensating action.
    pub compensation_needed: bool,
}

/// One batch run over a store. Exclusively owns its store borrow for the
/// duration; there is no parallel mutation of shared state.
pub struct BatchRunner<'a, S: Store> {
    pub store: &'a mut S,
    pub oracles: Oracles<'a>,
    pub options: BatchOptions,
    pub sink: &'a dyn ProgressSink,
    pub cancel: &'a CancelToken,
}

impl<S: Store> BatchRunner<'_, S> {
    /// Enrich a single word record: plan the missing steps, run them, and
    /// persist the results.
    pub fn process_word(
        &mut self,
        word_th: &str,
        sentence: Option<&str>,
        word_index: Option<usize>,
    ) -> Result<RecordOutcome, BatchError> {
        if self.cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }

        let word = match self.store.fetch_word(word_th)? {
            Some(word) => word,
            None => Word::seed(word_th)?,
        };
        let senses = store::senses_for_word(self.store, word_th)?;

        let plan = planner::plan(&word, &senses, self.options.target_tier);
        if plan.is_empty() {
            tracing::debug!(word = word_th, "record already complete; skipping");
            return Ok(RecordOutcome {
                word_th: word_th.to_string(),
                results: Vec::new(),
                skipped: true,
                complete: true,
                compensation_needed: false,
            });
        }
        tracing::info!(
            word = word_th,
            steps = %render_steps(&plan.steps),
            tier = %plan.tier,
            "running planned steps"
        );

        let context = PipelineContext {
            word: Some(word_th.to_string()),
            g2p: word.g2p.clone().filter(|text| !text.trim().is_empty()),
            phonetic_en: word
                .phonetic_en
                .clone()
                .filter(|text| !text.trim().is_empty()),
            senses: (!senses.is_empty()).then(|| senses.clone()),
            sentence: sentence.map(str::to_string),
            word_index,
            ..Default::default()
        };

        let run = execute(
            self.oracles,
            &plan.steps,
            context,
            plan.tier,
            self.cancel,
            self.sink,
        )
        .map_err(|err| match err {
            ExecError::Cancelled { .. } => BatchError::Cancelled,
            other => BatchError::Executor {
                subject: word_th.to_string(),
                source: other,
            },
        })?;

        let tolerable = classifier::ensure_no_fatal(&run.results).map_err(|failures| {
            BatchError::Fatal {
                subject: word_th.to_string(),
                source: failures,
            }
        })?;
        let compensation_needed = !tolerable.is_empty();

        self.persist_word_state(word_th, &run.context)?;
        let complete = self.verify_readback(word_th, &run.context)?;

        self.sink.record_completed(&RecordEvent {
            subject: word_th,
            steps_run: run.results.len(),
            complete,
        });

        Ok(RecordOutcome {
            word_th: word_th.to_string(),
            results: run.results,
            skipped: false,
            complete,
            compensation_needed,
        })
    }

    /// Process every subtitle in the store: tokenize where needed, then
    /// enrich each token sequentially with a fixed pause between iterations.
    pub fn process_all(&mut self) -> Result<Vec<RecordOutcome>, BatchError> {
        let subtitles = self.store.subtitles()?;
        let mut outcomes = Vec::new();

        for subtitle in subtitles {
            if self.cancel.is_cancelled() {
                return Err(BatchError::Cancelled);
            }
            let tokens = match subtitle.tokens_th.as_ref() {
                Some(list) => list.tokens.clone(),
                None => self.tokenize_subtitle(&subtitle)?,
            };

            for (index, token) in tokens.iter().enumerate() {
                let outcome = self.process_word(token, Some(&subtitle.thai), Some(index))?;
                let ran_steps = !outcome.skipped;
                outcomes.push(outcome);
                if ran_steps && self.options.pause_between_ms > 0 {
                    thread::sleep(Duration::from_millis(self.options.pause_between_ms));
                }
            }
        }
        Ok(outcomes)
    }

    fn tokenize_subtitle(&mut self, subtitle: &Subtitle) -> Result<Vec<String>, BatchError> {
        let context = PipelineContext {
            input_text: Some(subtitle.thai.clone()),
            ..Default::default()
        };
        let run = execute(
            self.oracles,
            &[StepName::Tokenize],
            context,
            self.options.target_tier,
            self.cancel,
            self.sink,
        )
        .map_err(|err| match err {
            ExecError::Cancelled { .. } => BatchError::Cancelled,
            other => BatchError::Executor {
                subject: subtitle.id.clone(),
                source: other,
            },
        })?;
        classifier::ensure_no_fatal(&run.results).map_err(|failures| BatchError::Fatal {
            subject: subtitle.id.clone(),
            source: failures,
        })?;

        let tokens = run
            .context
            .tokens
            .expect("tokenize step succeeded, tokens are present");

        let mut row = serde_json::to_value(subtitle).expect("serialize subtitle");
        row["tokens_th"] = serde_json::to_value(TokenList {
            tokens: tokens.clone(),
        })
        .expect("serialize token list");
        let valid = gate::enforce::<Subtitle>(&row)?;
        self.store.upsert_subtitle(&valid)?;
        Ok(tokens)
    }

    /// Persist the run's word and sense state, every record re-proving
    /// itself at the gate on the way in.
    fn persist_word_state(
        &mut self,
        word_th: &str,
        context: &PipelineContext,
    ) -> Result<(), BatchError> {
        let updated = Word {
            word_th: word_th.to_string(),
            g2p: context.g2p.clone(),
            phonetic_en: context.phonetic_en.clone(),
        };
        let valid = gate::revalidate(&updated)?;
        self.store.upsert_word(&valid)?;

        let senses = context
            .senses
            .as_deref()
            .or(context.raw_senses.as_deref())
            .unwrap_or_default();
        for sense in senses {
            let mut sense = sense.clone();
            if sense.word_th_id.is_none() {
                sense.word_th_id = Some(word_th.to_string());
            }
            if sense.created_at.is_none() {
                sense.created_at = Some(now_epoch_ms());
            }
            let valid = gate::revalidate(&sense)?;
            self.store.upsert_sense(&valid)?;
        }
        Ok(())
    }

    /// Fetch-after-write: the written data is re-read and re-validated, and
    /// a mismatch is handled per the configured policy.
    fn verify_readback(
        &mut self,
        word_th: &str,
        context: &PipelineContext,
    ) -> Result<bool, BatchError> {
        let fetched = self
            .store
            .fetch_word(word_th)?
            .ok_or_else(|| BatchError::ReadbackMismatch {
                subject: word_th.to_string(),
                detail: "word row missing after write".to_string(),
            })?;
        let fetched_senses = store::senses_for_word(self.store, word_th)?;

        let mut mismatches = Vec::new();
        if fetched.g2p != context.g2p || fetched.phonetic_en != context.phonetic_en {
            mismatches.push("word row differs from what was written".to_string());
        }
        let written = context
            .senses
            .as_deref()
            .or(context.raw_senses.as_deref())
            .unwrap_or_default();
        for sense in written {
            match fetched_senses.iter().find(|row| row.id == sense.id) {
                None => mismatches.push(format!("sense {} missing after write", sense.id)),
                Some(row)
                    if row.definition_th != sense.definition_th
                        || row.source != sense.source
                        || row.label_eng != sense.label_eng =>
                {
                    mismatches.push(format!("sense {} differs from what was written", sense.id));
                }
                Some(_) => {}
            }
        }

        if !mismatches.is_empty() {
            let detail = mismatches.join("; ");
            match self.options.readback {
                ReadbackPolicy::Warn => {
                    tracing::warn!(word = word_th, detail = %detail, "read-back mismatch");
                }
                ReadbackPolicy::Fail => {
                    return Err(BatchError::ReadbackMismatch {
                        subject: word_th.to_string(),
                        detail,
                    });
                }
            }
        }

        // The record is complete exactly when the next planner cycle would
        // have nothing left to do.
        Ok(planner::plan(&fetched, &fetched_senses, self.options.target_tier).is_empty())
    }
}

fn render_steps(steps: &[StepName]) -> String {
    steps
        .iter()
        .map(StepName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
