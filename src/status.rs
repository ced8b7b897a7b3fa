//! Status summary over persisted records.
//!
//! Answers "how far along is the store" without running anything: every
//! known token is re-planned and reported with the steps it still needs.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::contracts::Tier;
use crate::pipeline::StepName;
use crate::planner;
use crate::schema::Word;
use crate::store::{self, Store, StoreError};

/// Per-word line in the status summary.
#[derive(Debug, Serialize)]
pub struct WordStatus {
    pub word_th: String,
    pub complete: bool,
    pub planned_steps: Vec<StepName>,
    pub tier: Tier,
    pub sense_count: usize,
    pub raw_sense_count: usize,
}

/// Canonical status summary emitted by `sensepipe status --json`.
#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub target_tier: Tier,
    pub total: usize,
    pub complete: usize,
    pub incomplete: usize,
    pub words: Vec<WordStatus>,
}

/// Evaluate every known token: word rows plus tokens referenced by
/// subtitles that have no word row yet.
pub fn build_status_summary(store: &dyn Store, tier: Tier) -> Result<StatusSummary, StoreError> {
    let mut headwords: BTreeSet<String> = store
        .words()?
        .into_iter()
        .map(|word| word.word_th)
        .collect();
    for subtitle in store.subtitles()? {
        if let Some(list) = subtitle.tokens_th {
            headwords.extend(list.tokens);
        }
    }

    let mut words = Vec::with_capacity(headwords.len());
    let mut complete = 0;
    for word_th in headwords {
        let word = match store.fetch_word(&word_th)? {
            Some(word) => word,
            None => Word::seed(&word_th)?,
        };
        let senses = store::senses_for_word(store, &word_th)?;
        let plan = planner::plan(&word, &senses, tier);
        let raw_sense_count = senses.iter().filter(|sense| sense.has_raw_source()).count();
        if plan.is_empty() {
            complete += 1;
        }
        words.push(WordStatus {
            word_th,
            complete: plan.is_empty(),
            tier: plan.tier,
            planned_steps: plan.steps,
            sense_count: senses.len(),
            raw_sense_count,
        });
    }

    Ok(StatusSummary {
        target_tier: tier,
        total: words.len(),
        complete,
        incomplete: words.len() - complete,
        words,
    })
}

/// Human-readable rendering for the plain `status` command.
pub fn print_status(summary: &StatusSummary) {
    println!(
        "{} tokens, {} complete, {} incomplete (target tier {})",
        summary.total, summary.complete, summary.incomplete, summary.target_tier
    );
    for word in &summary.words {
        if word.complete {
            println!("  {}  complete ({} senses)", word.word_th, word.sense_count);
        } else {
            let steps = word
                .planned_steps
                .iter()
                .map(StepName::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "  {}  needs [{}] at tier {} ({} senses, {} raw)",
                word.word_th, steps, word.tier, word.sense_count, word.raw_sense_count
            );
        }
    }
}
