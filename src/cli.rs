//! CLI argument parsing for the enrichment pipeline.
//!
//! The CLI is intentionally thin: it wires a store and the HTTP oracles into
//! the core without embedding policy, so the same engine can sit behind a UI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint for the enrichment pipeline.
#[derive(Parser, Debug)]
#[command(
    name = "sensepipe",
    version,
    about = "Schema-gated incremental enrichment for Thai dictionary entries",
    after_help = "Examples:\n  sensepipe init --config pipeline.json\n  sensepipe plan --config pipeline.json --store records.json --word บ้าน\n  sensepipe run --config pipeline.json --store records.json --word บ้าน\n  sensepipe run --config pipeline.json --store records.json\n  sensepipe status --store records.json --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level pipeline commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Plan(PlanArgs),
    Run(RunArgs),
    Status(StatusArgs),
}

/// Init command inputs for bootstrapping a config file.
#[derive(Parser, Debug)]
#[command(about = "Write a pipeline config stub")]
pub struct InitArgs {
    /// Path for the pipeline config JSON
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

/// Plan command inputs: show the steps a record still needs.
#[derive(Parser, Debug)]
#[command(about = "Compute the minimal step set for one word")]
pub struct PlanArgs {
    /// Path to the pipeline config JSON
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Path to the JSON record store
    #[arg(long, value_name = "PATH")]
    pub store: PathBuf,

    /// The Thai headword to plan for
    #[arg(long, value_name = "WORD")]
    pub word: String,

    /// Override the config's target tier (v1, v2, or v3)
    #[arg(long, value_name = "TIER")]
    pub tier: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Run command inputs: enrich one word or every subtitle token.
#[derive(Parser, Debug)]
#[command(about = "Run the enrichment pipeline against the store")]
pub struct RunArgs {
    /// Path to the pipeline config JSON
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Path to the JSON record store
    #[arg(long, value_name = "PATH")]
    pub store: PathBuf,

    /// Process a single word instead of the whole batch
    #[arg(long, value_name = "WORD")]
    pub word: Option<String>,

    /// Override the config's target tier (v1, v2, or v3)
    #[arg(long, value_name = "TIER")]
    pub tier: Option<String>,

    /// Emit a verbose transcript of the run
    #[arg(long)]
    pub verbose: bool,
}

/// Status command inputs for a record store.
#[derive(Parser, Debug)]
#[command(about = "Summarize completeness of the persisted records")]
pub struct StatusArgs {
    /// Path to the pipeline config JSON (target tier comes from here)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the JSON record store
    #[arg(long, value_name = "PATH")]
    pub store: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
