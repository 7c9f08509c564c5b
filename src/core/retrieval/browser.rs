use crate::core::job::BrowserJob;

use super::{FailureKind, RetrievalFailure, RetrievalOutcome};

/// A structured request handed to a headless-browser driver (§4.1).
pub struct BrowserRequest {
    pub url: String,
    pub headers: std::collections::BTreeMap<String, String>,
    pub cookies: std::collections::BTreeMap<String, String>,
    pub block_elements: Vec<String>,
    pub switches: Vec<String>,
    pub user_data_dir: Option<String>,
    pub wait_for: Option<String>,
    pub wait_until: String,
    pub timeout_secs: u64,
    pub ignore_https_errors: bool,
}

impl From<&BrowserJob> for BrowserRequest {
    fn from(job: &BrowserJob) -> Self {
        Self {
            url: job.url.clone(),
            headers: job.headers.clone(),
            cookies: job.cookies.clone(),
            block_elements: job.block_elements.clone(),
            switches: job.switches.clone(),
            user_data_dir: job.user_data_dir.clone(),
            wait_for: job.wait_for.clone(),
            wait_until: job.wait_until.clone(),
            timeout_secs: job.timeout,
            ignore_https_errors: job.ignore_https_errors,
        }
    }
}

/// Trait-object seam for a headless-browser driver (§4.1, §5). Browser jobs
/// are serialized through a single shared, reference-counted instance
/// because launch is expensive and stateful; this crate ships no real
/// browser engine (§10.6), only the seam and a stub that reports the
/// capability as absent.
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn fetch(&self, request: BrowserRequest) -> RetrievalOutcome;
}

/// Always reports the browser capability as unsupported in this build.
pub struct StubBrowserDriver;

#[async_trait::async_trait]
impl BrowserDriver for StubBrowserDriver {
    async fn fetch(&self, _request: BrowserRequest) -> RetrievalOutcome {
        RetrievalOutcome::Failure(RetrievalFailure {
            kind: FailureKind::BrowserUnsupported,
            message: "no headless-browser driver is bundled in this build".to_string(),
        })
    }
}
