use anyhow::{Context, Result};
use colored::Colorize;

use crate::cli::context::AppContext;

/// List a job's snapshot history, newest first (§10.4).
pub fn run(ctx: &AppContext, guid_or_index: &str, limit: usize) -> Result<()> {
    let guid = ctx.resolve_guid(guid_or_index);
    let snapshots = ctx
        .store
        .get_history_snapshots(&guid, Some(limit))
        .with_context(|| format!("loading history for {guid}"))?;

    if snapshots.is_empty() {
        println!("No history for {}", guid.bold());
        return Ok(());
    }

    println!("{} entries for {}:", snapshots.len(), guid.bold());
    for snapshot in &snapshots {
        let ts = chrono::DateTime::from_timestamp(snapshot.timestamp, 0).unwrap_or_default();
        println!(
            "  {}  tries={}  {} bytes  {}",
            ts.to_rfc2822().dimmed(),
            snapshot.tries,
            snapshot.data.len(),
            snapshot.mime
        );
    }

    Ok(())
}
