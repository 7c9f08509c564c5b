pub mod clean;
pub mod context;
pub mod delete;
pub mod diff;
pub mod gc;
pub mod history;
pub mod list_jobs;
pub mod move_cmd;
pub mod rollback;
pub mod run;
pub mod test_filter;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "webchanges-rs",
    about = "Change-detection engine: retrieve, filter, diff, and store snapshots of web and shell sources",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config.yaml (defaults to <config dir>/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the job list file (defaults to <config dir>/jobs.yaml)
    #[arg(long, global = true)]
    pub jobs: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the job list: retrieve, filter, diff, and persist each job
    Run {
        /// Number of parallel workers (defaults to the number of CPUs)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Bypass conditional-request caching and ignore any prior ETag/timestamp
        #[arg(long)]
        ignore_cache: bool,
    },

    /// Show the diff between a job's two most recent snapshots
    Diff {
        /// Job fingerprint, or its 0-based index in the job list
        guid_or_index: String,
    },

    /// Show a job's snapshot history
    History {
        /// Job fingerprint, or its 0-based index in the job list
        guid_or_index: String,

        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Dry-run a single job's retrieval and filter chain without saving
    TestFilter {
        /// 0-based index of the job in the job list
        index: usize,
    },

    /// List every job in the job list with its fingerprint
    ListJobs,

    /// Drop history for fingerprints no longer present in the job list
    Gc,

    /// Keep only the newest snapshots for a fingerprint
    Clean {
        /// Job fingerprint
        guid: String,

        /// Number of snapshots to retain
        #[arg(long, default_value = "1")]
        retain: usize,
    },

    /// Delete all history for a fingerprint
    Delete {
        /// Job fingerprint
        guid: String,
    },

    /// Drop every snapshot (of any fingerprint) newer than a timestamp
    Rollback {
        /// Unix timestamp (seconds); snapshots newer than this are dropped
        timestamp: i64,
    },

    /// Relocate a fingerprint's history to a new fingerprint
    Move {
        /// Current fingerprint
        old_guid: String,

        /// New fingerprint
        new_guid: String,
    },
}
