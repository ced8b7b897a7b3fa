//! The static workflow graph and its step metadata.
//!
//! Five canonical steps in fixed dependency order. The table is immutable
//! for the process lifetime; the executor always runs steps in this order,
//! never in caller-supplied order.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod classifier;
pub mod context;
pub mod executor;

pub use context::PipelineContext;
pub use executor::{execute, ExecError, ExecutorRun, Oracles};

/// Canonical step names, in workflow order.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum StepName {
    Tokenize,
    G2p,
    Phonetic,
    DictLookup,
    Normalize,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Tokenize => "tokenize",
            StepName::G2p => "g2p",
            StepName::Phonetic => "phonetic",
            StepName::DictLookup => "dict-lookup",
            StepName::Normalize => "normalize",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tokenize" => Ok(StepName::Tokenize),
            "g2p" => Ok(StepName::G2p),
            "phonetic" => Ok(StepName::Phonetic),
            "dict-lookup" => Ok(StepName::DictLookup),
            "normalize" => Ok(StepName::Normalize),
            other => Err(format!("unknown step {other:?}")),
        }
    }
}

/// A context field a step needs present before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    InputText,
    WordText,
    Romanization,
    /// Raw or already-persisted senses; either satisfies the normalize step.
    AnySenses,
}

/// A context field a step writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Tokens,
    Romanization,
    Phonetic,
    RawSenses,
    Senses,
}

impl Output {
    /// Whether this output would satisfy the given requirement.
    pub fn satisfies(&self, requirement: Requirement) -> bool {
        matches!(
            (self, requirement),
            (Output::Romanization, Requirement::Romanization)
                | (Output::RawSenses, Requirement::AnySenses)
                | (Output::Senses, Requirement::AnySenses)
        )
    }
}

/// Static per-step metadata: dependencies, outputs, failure tolerance.
#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    pub name: StepName,
    pub requires: &'static [Requirement],
    pub produces: &'static [Output],
    /// Tolerable failures do not abort the batch; they also never count as
    /// progress.
    pub tolerable: bool,
}

/// The workflow graph. Only `dict-lookup` is tolerable: a missing dictionary
/// entry is an expected outcome, every other failure means the pipeline is
/// broken.
pub const WORKFLOW: [StepSpec; 5] = [
    StepSpec {
        name: StepName::Tokenize,
        requires: &[Requirement::InputText],
        produces: &[Output::Tokens],
        tolerable: false,
    },
    StepSpec {
        name: StepName::G2p,
        requires: &[Requirement::WordText],
        produces: &[Output::Romanization],
        tolerable: false,
    },
    StepSpec {
        name: StepName::Phonetic,
        requires: &[Requirement::WordText, Requirement::Romanization],
        produces: &[Output::Phonetic],
        tolerable: false,
    },
    StepSpec {
        name: StepName::DictLookup,
        requires: &[Requirement::WordText],
        produces: &[Output::RawSenses],
        tolerable: true,
    },
    StepSpec {
        name: StepName::Normalize,
        requires: &[Requirement::WordText, Requirement::AnySenses],
        produces: &[Output::Senses],
        tolerable: false,
    },
];

/// Look up a step's metadata.
pub fn spec_for(step: StepName) -> &'static StepSpec {
    WORKFLOW
        .iter()
        .find(|spec| spec.name == step)
        .expect("every step name appears in the workflow table")
}

/// Sort a requested subset into workflow order, dropping duplicates.
pub fn graph_order(requested: &[StepName]) -> Vec<StepName> {
    let mut ordered: Vec<StepName> = Vec::new();
    for spec in WORKFLOW.iter() {
        if requested.contains(&spec.name) && !ordered.contains(&spec.name) {
            ordered.push(spec.name);
        }
    }
    ordered
}

/// Per-step outcome for one executor run. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: StepName,
    pub success: bool,
    pub error: Option<String>,
}

/// Cooperative cancellation signal threaded through batch runner and
/// executor; checked between records and between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
