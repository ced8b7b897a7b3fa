//! Progress event port.
//!
//! The executor and batch runner emit events through this sink instead of
//! reaching into presentation state; the default sink does nothing.

use crate::pipeline::StepName;

/// Step-completion notification for one executor invocation.
#[derive(Debug, Clone, Copy)]
pub struct StepEvent<'a> {
    /// The word or subtitle the run is enriching.
    pub subject: &'a str,
    pub step: StepName,
    pub success: bool,
    pub error: Option<&'a str>,
}

/// Record-completion notification for one batch item.
#[derive(Debug, Clone, Copy)]
pub struct RecordEvent<'a> {
    pub subject: &'a str,
    pub steps_run: usize,
    pub complete: bool,
}

/// Observer for workflow progress. All methods default to no-ops.
pub trait ProgressSink {
    fn step_completed(&self, _event: &StepEvent<'_>) {}

    fn record_completed(&self, _event: &RecordEvent<'_>) {}
}

/// The default sink: observes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {}
