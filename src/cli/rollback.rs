use anyhow::Result;
use colored::Colorize;

use crate::cli::context::AppContext;

/// Drop every snapshot (of any fingerprint) newer than a timestamp (§10.4).
pub fn run(ctx: &AppContext, timestamp: i64) -> Result<()> {
    let dropped = ctx.store.rollback(timestamp)?;
    ctx.store.copy_temp_to_permanent(true)?;
    println!(
        "{} Dropped {} snapshot(s) newer than {}",
        "OK".green().bold(),
        dropped,
        timestamp
    );
    Ok(())
}
