use std::collections::HashSet;

use anyhow::Result;
use colored::Colorize;

use crate::cli::context::AppContext;

/// Drop history for fingerprints no longer present in the job list (§10.4).
pub fn run(ctx: &AppContext) -> Result<()> {
    let known: HashSet<String> = ctx.jobs.iter().map(|job| job.guid()).collect();
    let dropped = ctx.store.gc(&known, 1)?;
    ctx.store.copy_temp_to_permanent(true)?;

    if dropped.is_empty() {
        println!("Nothing to collect.");
    } else {
        println!(
            "{} Dropped {} fingerprint(s) no longer in the job list:",
            "OK".green().bold(),
            dropped.len()
        );
        for guid in &dropped {
            println!("  {guid}");
        }
    }
    Ok(())
}
