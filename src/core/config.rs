use serde::{Deserialize, Serialize};

/// The engine's own configuration, stored at `<config_dir>/config.yaml` (§6, §10.2).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub job_defaults: JobDefaults,

    /// Only `report.tz` is read by the core; everything else is passed through
    /// untyped for external reporter collaborators (§6).
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Sqlite3,
    Textfiles,
    Redis,
    Minidb,
}

impl Default for DatabaseEngine {
    fn default() -> Self {
        Self::Sqlite3
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub engine: DatabaseEngine,

    /// Used by `clean_cache` (§4.3). `None` means "unbounded" (no automatic trim).
    #[serde(default)]
    pub max_snapshots: Option<u32>,
}

/// Per-kind default attribute maps merged into each job before normalization
/// (§6: "more-specific overrides less-specific"). Kept as raw YAML mappings
/// rather than typed `Job` fragments since any subset of a job's fields may
/// be defaulted.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JobDefaults {
    #[serde(default)]
    pub all: serde_yaml::Mapping,
    #[serde(default)]
    pub url: serde_yaml::Mapping,
    #[serde(default)]
    pub browser: serde_yaml::Mapping,
    #[serde(default)]
    pub shell: serde_yaml::Mapping,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// IANA timezone name used to render diff timestamps (§4.4).
    pub tz: Option<String>,

    /// Everything else (`report.html`, `report.email`, ...) belongs to
    /// external reporter collaborators; the core never inspects it.
    #[serde(flatten)]
    pub other: serde_yaml::Mapping,
}

impl Config {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Merge `all` then the kind-specific defaults into a raw job mapping,
    /// without overwriting keys already present in `job` (§6).
    pub fn merge_defaults(&self, job: &mut serde_yaml::Mapping, kind_defaults: &serde_yaml::Mapping) {
        for (key, value) in kind_defaults.iter().chain(self.job_defaults.all.iter()) {
            job.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    pub fn kind_defaults(&self, kind: JobKindHint) -> &serde_yaml::Mapping {
        match kind {
            JobKindHint::UrlSimple => &self.job_defaults.url,
            JobKindHint::UrlBrowser => &self.job_defaults.browser,
            JobKindHint::Shell => &self.job_defaults.shell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKindHint {
    UrlSimple,
    UrlBrowser,
    Shell,
}
