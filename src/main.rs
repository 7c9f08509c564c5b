use anyhow::Result;
use clap::Parser;

mod cli;
mod core;
mod util;

use cli::context::AppContext;
use cli::{Cli, Commands};

fn init_tracing(verbose: bool, quiet: bool) {
    let default_directive = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("{}: {}", colored::Colorize::red("error"), e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext::load(cli.config.as_ref(), cli.jobs.as_ref())?;

    match cli.command.unwrap_or(Commands::Run { workers: None, ignore_cache: false }) {
        Commands::Run { workers, ignore_cache } => {
            cli::run::run(ctx, cli.verbose, workers, ignore_cache).await
        }
        Commands::Diff { guid_or_index } => cli::diff::run(&ctx, &guid_or_index),
        Commands::History { guid_or_index, limit } => cli::history::run(&ctx, &guid_or_index, limit),
        Commands::TestFilter { index } => cli::test_filter::run(&ctx, index).await,
        Commands::ListJobs => cli::list_jobs::run(&ctx),
        Commands::Gc => cli::gc::run(&ctx),
        Commands::Clean { guid, retain } => cli::clean::run(&ctx, &guid, retain),
        Commands::Delete { guid } => cli::delete::run(&ctx, &guid),
        Commands::Rollback { timestamp } => cli::rollback::run(&ctx, timestamp),
        Commands::Move { old_guid, new_guid } => cli::move_cmd::run(&ctx, &old_guid, &new_guid),
    }
}
