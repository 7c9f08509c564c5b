use anyhow::Result;
use colored::Colorize;

use crate::cli::context::AppContext;

/// List every job in the job list with its fingerprint (§10.4).
pub fn run(ctx: &AppContext) -> Result<()> {
    for (index, job) in ctx.jobs.iter().enumerate() {
        println!("{:>3}  {}  {}", index, job.guid().dimmed(), job.name());
    }
    Ok(())
}
