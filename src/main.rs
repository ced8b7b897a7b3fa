use anyhow::Result;
use clap::Parser;

use sensepipe::cli::{Command, RootArgs};
use sensepipe::commands::{run_init, run_plan, run_run, run_status};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = RootArgs::parse();
    match cli.command {
        Command::Init(args) => run_init(&args),
        Command::Plan(args) => run_plan(&args),
        Command::Run(args) => run_run(&args),
        Command::Status(args) => run_status(&args),
    }
}
