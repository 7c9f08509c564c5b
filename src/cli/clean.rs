use anyhow::Result;
use colored::Colorize;

use crate::cli::context::AppContext;

/// Keep only the newest `retain` snapshots for a fingerprint (§10.4).
pub fn run(ctx: &AppContext, guid: &str, retain: usize) -> Result<()> {
    let resolved = ctx.resolve_guid(guid);
    let deleted = ctx.store.clean(&resolved, retain)?;
    ctx.store.copy_temp_to_permanent(true)?;
    println!(
        "{} Removed {} snapshot(s) for {}, retained {}",
        "OK".green().bold(),
        deleted,
        resolved,
        retain
    );
    Ok(())
}
