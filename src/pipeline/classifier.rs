//! Failure classifier.
//!
//! Partitions step outcomes into tolerable and fatal using the workflow
//! graph's per-step metadata. A tolerable failure is logged and handed back
//! for compensation; it never counts as progress.

use thiserror::Error;

use super::{spec_for, StepName, StepResult};

/// One fatal step failure inside a batch-aborting error.
#[derive(Debug, Clone)]
pub struct FatalFailure {
    pub step: StepName,
    pub error: String,
}

/// Raised when any non-tolerable step failed; names every fatal step and its
/// error message.
#[derive(Debug, Clone, Error)]
#[error("fatal step failures: {}", render(.failures))]
pub struct FatalFailures {
    pub failures: Vec<FatalFailure>,
}

fn render(failures: &[FatalFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{} ({})", failure.step, failure.error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Step results split by tolerability. Successes are in neither list.
#[derive(Debug, Default)]
pub struct Classified<'a> {
    pub tolerable: Vec<&'a StepResult>,
    pub fatal: Vec<&'a StepResult>,
}

pub fn classify(results: &[StepResult]) -> Classified<'_> {
    let mut classified = Classified::default();
    for result in results.iter().filter(|result| !result.success) {
        if spec_for(result.step).tolerable {
            classified.tolerable.push(result);
        } else {
            classified.fatal.push(result);
        }
    }
    classified
}

/// Abort on any fatal failure; otherwise return the tolerable failures for
/// the caller to compensate.
pub fn ensure_no_fatal(results: &[StepResult]) -> Result<Vec<&StepResult>, FatalFailures> {
    let classified = classify(results);
    if classified.fatal.is_empty() {
        for result in &classified.tolerable {
            tracing::warn!(
                step = %result.step,
                error = result.error.as_deref().unwrap_or_default(),
                "tolerable step failure"
            );
        }
        return Ok(classified.tolerable);
    }
    Err(FatalFailures {
        failures: classified
            .fatal
            .iter()
            .map(|result| FatalFailure {
                step: result.step,
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            })
            .collect(),
    })
}
