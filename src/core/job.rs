use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::core::differ::DifferSpec;
use crate::core::filters::FilterSpec;

/// Attributes shared by every job kind (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonJobAttrs {
    pub name: Option<String>,

    #[serde(default)]
    pub filter: Vec<FilterSpec>,

    #[serde(default)]
    pub differ: DifferSpec,

    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    #[serde(default)]
    pub additions_only: bool,

    #[serde(default)]
    pub deletions_only: bool,

    pub contextlines: Option<usize>,

    #[serde(default = "default_compared_versions")]
    pub compared_versions: usize,

    #[serde(default)]
    pub ignore_connection_errors: bool,

    #[serde(default)]
    pub ignore_timeout_errors: bool,

    #[serde(default)]
    pub ignore_too_many_redirects: bool,

    #[serde(default)]
    pub ignore_http_error_codes: Vec<String>,
}

fn default_max_tries() -> u32 {
    1
}

fn default_compared_versions() -> usize {
    1
}

impl CommonJobAttrs {
    /// §3: additions_only and deletions_only are mutually exclusive.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.additions_only && self.deletions_only {
            anyhow::bail!("additions_only and deletions_only are mutually exclusive");
        }
        if self.compared_versions == 0 {
            anyhow::bail!("compared_versions must be >= 1");
        }
        Ok(())
    }

    /// §4.1/§7: does an HTTP status code match one of this job's ignore
    /// patterns? Patterns may be exact (`"418"`), or a wildcard class
    /// (`"4xx"`, `"5xx"`).
    pub fn ignores_http_status(&self, status: u16) -> bool {
        self.ignore_http_error_codes.iter().any(|pattern| {
            if let Ok(code) = pattern.parse::<u16>() {
                return code == status;
            }
            match pattern.to_ascii_lowercase().as_str() {
                "4xx" => (400..500).contains(&status),
                "5xx" => (500..600).contains(&status),
                _ => false,
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlJob {
    #[serde(flatten)]
    pub common: CommonJobAttrs,

    pub url: String,
    pub method: Option<String>,
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub cookies: std::collections::BTreeMap<String, String>,
    pub data: Option<String>,
    #[serde(default)]
    pub ssl_no_verify: bool,
    pub proxy: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub no_redirects: bool,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserJob {
    #[serde(flatten)]
    pub common: CommonJobAttrs,

    pub url: String,
    #[serde(default)]
    pub use_browser: bool,
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub cookies: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub block_elements: Vec<String>,
    pub user_data_dir: Option<String>,
    #[serde(default)]
    pub switches: Vec<String>,
    pub wait_for: Option<String>,
    #[serde(default = "default_wait_until")]
    pub wait_until: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub ignore_https_errors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellJob {
    #[serde(flatten)]
    pub common: CommonJobAttrs,

    pub command: String,
}

fn default_timeout() -> u64 {
    60
}

fn default_wait_until() -> String {
    "load".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Job {
    UrlSimple(UrlJob),
    UrlBrowser(BrowserJob),
    Shell(ShellJob),
}

impl Job {
    pub fn common(&self) -> &CommonJobAttrs {
        match self {
            Job::UrlSimple(j) => &j.common,
            Job::UrlBrowser(j) => &j.common,
            Job::Shell(j) => &j.common,
        }
    }

    pub fn name(&self) -> &str {
        self.common()
            .name
            .as_deref()
            .unwrap_or_else(|| self.location())
    }

    /// The canonical location string a job's fingerprint is derived from (§3).
    pub fn location(&self) -> &str {
        match self {
            Job::UrlSimple(j) => &j.url,
            Job::UrlBrowser(j) => &j.url,
            Job::Shell(j) => &j.command,
        }
    }

    /// SHA-1 of the canonical location string (§3). Stable under
    /// serialize/deserialize since it depends only on `location()`.
    pub fn guid(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.location().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.common().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_job(command: &str) -> Job {
        Job::Shell(ShellJob {
            common: CommonJobAttrs {
                name: None,
                filter: vec![],
                differ: DifferSpec::default(),
                max_tries: 1,
                additions_only: false,
                deletions_only: false,
                contextlines: None,
                compared_versions: 1,
                ignore_connection_errors: false,
                ignore_timeout_errors: false,
                ignore_too_many_redirects: false,
                ignore_http_error_codes: vec![],
            },
            command: command.to_string(),
        })
    }

    #[test]
    fn test_fingerprint_stable_for_same_location() {
        let a = shell_job("echo hello");
        let b = shell_job("echo hello");
        assert_eq!(a.guid(), b.guid());
    }

    #[test]
    fn test_fingerprint_differs_for_different_location() {
        let a = shell_job("echo hello");
        let b = shell_job("echo goodbye");
        assert_ne!(a.guid(), b.guid());
    }

    #[test]
    fn test_fingerprint_is_sha1_hex() {
        let job = shell_job("echo hello");
        assert_eq!(job.guid().len(), 40);
        assert!(job.guid().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_mutually_exclusive_comparison_modes_rejected() {
        let mut job = shell_job("echo hello");
        if let Job::Shell(ref mut s) = job {
            s.common.additions_only = true;
            s.common.deletions_only = true;
        }
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_ignores_http_status_wildcard() {
        let job = shell_job("echo hello");
        let mut common = job.common().clone();
        common.ignore_http_error_codes = vec!["4xx".to_string()];
        assert!(common.ignores_http_status(404));
        assert!(!common.ignores_http_status(500));
    }

    #[test]
    fn test_ignores_http_status_exact() {
        let mut common = shell_job("echo hello").common().clone();
        common.ignore_http_error_codes = vec!["418".to_string()];
        assert!(common.ignores_http_status(418));
        assert!(!common.ignores_http_status(419));
    }
}
