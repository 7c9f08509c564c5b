use anyhow::Result;
use colored::Colorize;

use crate::cli::context::AppContext;

/// Relocate a fingerprint's history to a new fingerprint (§10.4).
pub fn run(ctx: &AppContext, old_guid: &str, new_guid: &str) -> Result<()> {
    let resolved_old = ctx.resolve_guid(old_guid);
    let moved = ctx.store.move_guid(&resolved_old, new_guid)?;
    ctx.store.copy_temp_to_permanent(true)?;
    println!(
        "{} Moved {} snapshot(s) from {} to {}",
        "OK".green().bold(),
        moved,
        resolved_old,
        new_guid
    );
    Ok(())
}
