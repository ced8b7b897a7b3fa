//! Command bodies behind the CLI.

use anyhow::{anyhow, Result};

use crate::batch::{BatchOptions, BatchRunner, RecordOutcome};
use crate::cli::{InitArgs, PlanArgs, RunArgs, StatusArgs};
use crate::config;
use crate::contracts::Tier;
use crate::events::{NoopSink, ProgressSink, RecordEvent, StepEvent};
use crate::oracle::HttpOracles;
use crate::pipeline::{CancelToken, Oracles};
use crate::planner;
use crate::schema::Word;
use crate::status;
use crate::store::{self, JsonStore, Store};

pub fn run_init(args: &InitArgs) -> Result<()> {
    if args.config.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            args.config.display()
        ));
    }
    config::write_config(&args.config, &config::default_config())?;
    println!("wrote {}", args.config.display());
    Ok(())
}

pub fn run_plan(args: &PlanArgs) -> Result<()> {
    let cfg = config::load_config(&args.config)?;
    config::validate_config(&cfg)?;
    let store = JsonStore::open(&args.store)?;
    let tier = resolve_tier(cfg.target_tier, args.tier.as_deref())?;

    let word = match store.fetch_word(&args.word)? {
        Some(word) => word,
        None => Word::seed(&args.word)?,
    };
    let senses = store::senses_for_word(&store, &args.word)?;
    let plan = planner::plan(&word, &senses, tier);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else if plan.is_empty() {
        println!("{}: complete at tier {}", args.word, plan.tier);
    } else {
        let steps = plan
            .steps
            .iter()
            .map(|step| step.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{}: needs [{}] at tier {}", args.word, steps, plan.tier);
    }
    Ok(())
}

pub fn run_run(args: &RunArgs) -> Result<()> {
    let cfg = config::load_config(&args.config)?;
    config::validate_config(&cfg)?;
    let mut store = JsonStore::open(&args.store)?;
    let http = HttpOracles::new(&cfg);
    let oracles = Oracles {
        tokenizer: &http,
        g2p: &http,
        phonetic: &http,
        dictionary: &http,
        normalizer: &http,
    };
    let mut options = BatchOptions::from_config(&cfg);
    options.target_tier = resolve_tier(cfg.target_tier, args.tier.as_deref())?;

    let cancel = CancelToken::new();
    let sink: &dyn ProgressSink = if args.verbose { &TranscriptSink } else { &NoopSink };
    let mut runner = BatchRunner {
        store: &mut store,
        oracles,
        options,
        sink,
        cancel: &cancel,
    };

    let outcomes = match args.word.as_deref() {
        Some(word) => vec![runner.process_word(word, None, None)?],
        None => runner.process_all()?,
    };
    print_run_summary(&outcomes);
    Ok(())
}

pub fn run_status(args: &StatusArgs) -> Result<()> {
    let tier = match args.config.as_deref() {
        Some(path) => {
            let cfg = config::load_config(path)?;
            config::validate_config(&cfg)?;
            cfg.target_tier
        }
        None => Tier::default(),
    };
    let store = JsonStore::open(&args.store)?;
    let summary = status::build_status_summary(&store, tier)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        status::print_status(&summary);
    }
    Ok(())
}

fn resolve_tier(config_tier: Tier, cli_override: Option<&str>) -> Result<Tier> {
    match cli_override {
        Some(text) => text.parse().map_err(|err: String| anyhow!(err)),
        None => Ok(config_tier),
    }
}

fn print_run_summary(outcomes: &[RecordOutcome]) {
    let ran = outcomes.iter().filter(|outcome| !outcome.skipped).count();
    let complete = outcomes.iter().filter(|outcome| outcome.complete).count();
    let compensation = outcomes
        .iter()
        .filter(|outcome| outcome.compensation_needed)
        .count();
    println!(
        "{} records ({} run, {} skipped, {} complete, {} needing compensation)",
        outcomes.len(),
        ran,
        outcomes.len() - ran,
        complete,
        compensation
    );
}

/// Verbose transcript sink for `run --verbose`.
struct TranscriptSink;

impl ProgressSink for TranscriptSink {
    fn step_completed(&self, event: &StepEvent<'_>) {
        match event.error {
            Some(error) => eprintln!("  {} {}: failed ({error})", event.subject, event.step),
            None => eprintln!("  {} {}: ok", event.subject, event.step),
        }
    }

    fn record_completed(&self, event: &RecordEvent<'_>) {
        eprintln!(
            "{}: {} steps run, complete={}",
            event.subject, event.steps_run, event.complete
        );
    }
}
