use anyhow::Result;
use colored::Colorize;

use crate::cli::context::AppContext;
use crate::core::filters::{self, catalog::FilterContext, Artifact};
use crate::core::job::Job;
use crate::core::retrieval::browser::{BrowserDriver, BrowserRequest, StubBrowserDriver};
use crate::core::retrieval::{url, shell, RetrievalOutcome};

/// Dry-run a single job's retrieval and filter chain, without saving
/// anything to the store (§10.4).
pub async fn run(ctx: &AppContext, index: usize) -> Result<()> {
    let job = ctx
        .jobs
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("no job at index {index}"))?;

    let common = job.common();
    let normalized = filters::normalize_filter_list(&common.filter)?;
    let expects_bytes = filters::chain_expects_bytes(&normalized);

    let outcome = match job {
        Job::UrlSimple(url_job) => url::retrieve(url_job, None, None, 0, expects_bytes, true).await,
        Job::UrlBrowser(browser_job) => {
            StubBrowserDriver.fetch(BrowserRequest::from(browser_job)).await
        }
        Job::Shell(shell_job) => shell::retrieve(shell_job, job.name(), expects_bytes),
    };

    let raw = match outcome {
        RetrievalOutcome::Success(raw) => raw,
        RetrievalOutcome::NotModified => {
            println!("{}", "304 Not Modified (dry-run supplies no prior state)".dimmed());
            return Ok(());
        }
        RetrievalOutcome::Failure(failure) => {
            println!(
                "{} {:?}: {}",
                "retrieval failed".red().bold(),
                failure.kind,
                failure.message
            );
            return Ok(());
        }
    };

    let mut artifact = if raw.is_text {
        Artifact::Text(String::from_utf8_lossy(&raw.data).into_owned())
    } else {
        Artifact::Bytes(raw.data)
    };

    let filter_ctx = FilterContext {
        job_name: job.name(),
        job_location: job.location(),
    };
    for filter in &normalized {
        artifact = filters::catalog::apply(&filter.name, &filter.args, artifact, &filter_ctx)?;
    }

    println!("{}", artifact.as_text());
    Ok(())
}
