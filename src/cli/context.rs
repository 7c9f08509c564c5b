use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::config::{Config, DatabaseEngine};
use crate::core::job::Job;
use crate::core::job_list;
use crate::core::store::minidb;
use crate::core::store::sqlite::SqliteSnapshotStore;
use crate::core::store::textfile::TextfileSnapshotStore;
use crate::core::store::SnapshotStore;
use crate::util;

/// Resolved config, job list, and snapshot store for a single CLI invocation
/// (§10.2, §10.3). Every subcommand starts from one of these.
pub struct AppContext {
    pub config: Config,
    pub jobs: Vec<Job>,
    pub store: Arc<dyn SnapshotStore>,
}

impl AppContext {
    pub fn load(config_path: Option<&PathBuf>, jobs_path: Option<&PathBuf>) -> Result<Self> {
        let config_dir = util::paths::config_dir()?;
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("creating config directory {}", config_dir.display()))?;

        let config_path = config_path
            .cloned()
            .unwrap_or_else(|| config_dir.join("config.yaml"));
        let config = if config_path.exists() {
            Config::load(&config_path)?
        } else {
            Config::default()
        };

        let jobs_path = jobs_path
            .cloned()
            .unwrap_or_else(|| config_dir.join("jobs.yaml"));
        let jobs_text = std::fs::read_to_string(&jobs_path)
            .with_context(|| format!("reading job list {}", jobs_path.display()))?;
        let jobs = job_list::load_job_list(&jobs_text, &config)
            .with_context(|| format!("parsing job list {}", jobs_path.display()))?;

        let store = open_store(&config, &config_dir)?;

        Ok(Self { config, jobs, store })
    }

    /// Resolve a `<guid-or-index>` CLI argument against the loaded job list
    /// (§10.4): a bare integer is a 0-based index, anything else is taken as
    /// a literal fingerprint.
    pub fn resolve_guid(&self, guid_or_index: &str) -> String {
        match guid_or_index.parse::<usize>() {
            Ok(index) => self
                .jobs
                .get(index)
                .map(|job| job.guid())
                .unwrap_or_else(|| guid_or_index.to_string()),
            Err(_) => guid_or_index.to_string(),
        }
    }
}

fn open_store(config: &Config, config_dir: &Path) -> Result<Arc<dyn SnapshotStore>> {
    match config.database.engine {
        DatabaseEngine::Sqlite3 => {
            let path = config_dir.join("snapshots.db");
            Ok(Arc::new(
                SqliteSnapshotStore::open(&path)
                    .with_context(|| format!("opening snapshot store {}", path.display()))?,
            ))
        }
        DatabaseEngine::Textfiles => {
            let dir = config_dir.join("snapshots");
            Ok(Arc::new(TextfileSnapshotStore::open(&dir)?))
        }
        DatabaseEngine::Minidb => {
            let legacy_path = config_dir.join("cache.db");
            let target_path = config_dir.join("snapshots.db");
            let target = SqliteSnapshotStore::open(&target_path)?;
            if legacy_path.exists() {
                let migrated = minidb::migrate(&legacy_path, &target)
                    .context("migrating legacy minidb snapshot store")?;
                tracing::info!(migrated, "migrated legacy minidb store to the default backing");
            }
            Ok(Arc::new(target))
        }
        DatabaseEngine::Redis => anyhow::bail!(
            "database.engine: redis is named by the original system but out of scope for this build (§10.3) — use sqlite3 or textfiles"
        ),
    }
}
