use anyhow::{Context, Result};
use colored::Colorize;

use crate::cli::context::AppContext;
use crate::core::differ::{self, ComparisonMode, DiffContext, DiffOutcome, ReportKind};
use crate::core::store::Snapshot;

/// Show the diff between a job's two most recent snapshots (§10.4).
pub fn run(ctx: &AppContext, guid_or_index: &str) -> Result<()> {
    let guid = ctx.resolve_guid(guid_or_index);
    let job = ctx.jobs.iter().find(|j| j.guid() == guid);

    let snapshots: Vec<Snapshot> = ctx
        .store
        .get_history_snapshots(&guid, Some(2))
        .with_context(|| format!("loading history for {guid}"))?;

    if snapshots.len() < 2 {
        println!(
            "Not enough history for {} to diff (need at least 2 snapshots, have {})",
            guid.bold(),
            snapshots.len()
        );
        return Ok(());
    }
    let new = &snapshots[0];
    let old = &snapshots[1];

    let common = job.map(|j| j.common());
    let comparison_mode = match common {
        Some(c) if c.additions_only => ComparisonMode::AdditionsOnly,
        Some(c) if c.deletions_only => ComparisonMode::DeletionsOnly,
        _ => ComparisonMode::Full,
    };
    let differ_spec = common.map(|c| c.differ.clone()).unwrap_or_default();
    let normalized = differ::normalize(&differ_spec)?;
    let diff_ctx = DiffContext {
        old_timestamp: chrono::DateTime::from_timestamp(old.timestamp, 0).unwrap_or_default(),
        new_timestamp: chrono::DateTime::from_timestamp(new.timestamp, 0).unwrap_or_default(),
        context_lines: common.and_then(|c| c.contextlines),
        comparison_mode,
        tz: ctx.config.report.tz.clone(),
    };

    match differ::diff(&normalized, &old.data, &new.data, &diff_ctx, ReportKind::Text)? {
        DiffOutcome::Diff(text) => println!("{text}"),
        DiffOutcome::NoReport => println!("No reportable change between the two most recent snapshots."),
    }

    Ok(())
}
