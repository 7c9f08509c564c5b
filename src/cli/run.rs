use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use crate::cli::context::AppContext;
use crate::core::differ::ReportKind;
use crate::core::orchestrator::{self, Verb};
use crate::core::retrieval::browser::StubBrowserDriver;

/// Run the job list: the Orchestrator pass over every job (§4.5, §10.4).
pub async fn run(ctx: AppContext, verbose: bool, workers: Option<usize>, ignore_cache: bool) -> Result<()> {
    let workers = workers.unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4));
    let browser = Arc::new(StubBrowserDriver);
    let tz = ctx.config.report.tz.clone();

    let results = orchestrator::run_jobs(
        ctx.jobs,
        ctx.store,
        browser,
        workers,
        ignore_cache,
        ReportKind::Text,
        tz,
    )
    .await?;

    let mut errors = 0;
    for result in &results {
        match result.verb {
            Verb::New => println!("{} {}: {}", "NEW".green().bold(), result.job_name, result.guid),
            Verb::Changed => {
                println!("{} {}: {}", "CHANGED".yellow().bold(), result.job_name, result.guid);
                if let Some(diff) = &result.diff {
                    println!("{diff}");
                }
            }
            Verb::ChangedNoReport => {
                if verbose {
                    println!(
                        "{} {}: {} (below reporting threshold)",
                        "CHANGED".dimmed(),
                        result.job_name,
                        result.guid
                    );
                }
            }
            Verb::Unchanged => {
                if verbose {
                    println!("{} {}: {}", "unchanged".dimmed(), result.job_name, result.guid);
                }
            }
            Verb::Ignored => {
                if verbose {
                    println!("{} {}: {}", "ignored".dimmed(), result.job_name, result.guid);
                }
            }
            Verb::Error => {
                if let Some(message) = &result.error {
                    errors += 1;
                    println!("{} {}: {}", "ERROR".red().bold(), result.job_name, message);
                } else if verbose {
                    println!("{} {}: retrying", "error".dimmed(), result.job_name);
                }
            }
        }
    }

    if errors > 0 {
        println!();
        println!("{} {} job(s) reported an error", "Note:".yellow().bold(), errors);
    }

    // §6: individual job errors do not make the run itself fail.
    Ok(())
}
