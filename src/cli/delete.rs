use anyhow::Result;
use colored::Colorize;

use crate::cli::context::AppContext;

/// Delete all history for a fingerprint (§10.4).
pub fn run(ctx: &AppContext, guid: &str) -> Result<()> {
    let resolved = ctx.resolve_guid(guid);
    ctx.store.delete(&resolved)?;
    ctx.store.copy_temp_to_permanent(true)?;
    println!("{} Deleted all history for {}", "OK".green().bold(), resolved);
    Ok(())
}
