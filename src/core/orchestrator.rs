//! Ties the Job, filter, differ, and store layers into the per-run loop
//! (§4.5): load prior → retrieve → classify → filter → compare → diff →
//! save, with staged writes promoted once at the end of the run.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::differ::{self, ComparisonMode, DiffContext, DiffOutcome, ReportKind};
use crate::core::errors::ErrorClass;
use crate::core::filters::catalog::FilterContext;
use crate::core::filters::{self, Artifact, NormalizedFilter};
use crate::core::job::{CommonJobAttrs, Job};
use crate::core::retrieval::browser::{BrowserDriver, BrowserRequest};
use crate::core::retrieval::{self, RawRetrieval, RetrievalFailure, RetrievalOutcome};
use crate::core::store::{Snapshot, SnapshotStore};

/// What the orchestrator decided for a single job (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    New,
    Unchanged,
    Changed,
    ChangedNoReport,
    Error,
    Ignored,
}

/// One job's outcome for a run (§4.5, the `run` command's report).
#[derive(Debug, Clone)]
pub struct JobResult {
    pub guid: String,
    pub job_name: String,
    pub verb: Verb,
    pub diff: Option<String>,
    pub error: Option<String>,
}

impl JobResult {
    /// Whether this result belongs in the user-facing report. Retries below
    /// `max_tries` are saved silently (§4.5 step 2, §7).
    pub fn is_reportable(&self) -> bool {
        matches!(self.verb, Verb::Changed | Verb::Error if self.diff.is_some() || self.error.is_some())
    }
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Run every job in `jobs`, gating concurrency with a bounded semaphore
/// (§5) and promoting staged writes once at the end (§4.5 step 6, §9).
pub async fn run_jobs(
    jobs: Vec<Job>,
    store: Arc<dyn SnapshotStore>,
    browser: Arc<dyn BrowserDriver>,
    workers: usize,
    ignore_cache: bool,
    report_kind: ReportKind,
    tz: Option<String>,
) -> Result<Vec<JobResult>> {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(workers.max(1)));
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let store = store.clone();
        let browser = browser.clone();
        let semaphore = semaphore.clone();
        let tz = tz.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            process_job(job, store, browser, ignore_cache, report_kind, tz).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.context("job task panicked")?);
    }

    store
        .copy_temp_to_permanent(true)
        .context("promoting staged snapshot writes")?;

    Ok(results)
}

async fn process_job(
    job: Job,
    store: Arc<dyn SnapshotStore>,
    browser: Arc<dyn BrowserDriver>,
    ignore_cache: bool,
    report_kind: ReportKind,
    tz: Option<String>,
) -> JobResult {
    let guid = job.guid();
    let name = job.name().to_string();

    match run_one(&job, &guid, store.as_ref(), browser.as_ref(), ignore_cache, report_kind, tz.as_deref()).await {
        Ok(result) => result,
        Err(e) => {
            warn!(job = %name, guid = %guid, error = %e, "job processing failed");
            JobResult {
                guid,
                job_name: name,
                verb: Verb::Error,
                diff: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn run_one(
    job: &Job,
    guid: &str,
    store: &dyn SnapshotStore,
    browser: &dyn BrowserDriver,
    ignore_cache: bool,
    report_kind: ReportKind,
    tz: Option<&str>,
) -> Result<JobResult> {
    let common = job.common();
    let job_name = job.name().to_string();

    let prior = store.load(guid).context("loading prior snapshot")?;

    let normalized_filters = filters::normalize_filter_list(&common.filter)?;
    let expects_bytes = filters::chain_expects_bytes(&normalized_filters);

    debug!(job = %job_name, guid = %guid, "retrieving");
    let outcome = retrieve(job, &prior, expects_bytes, ignore_cache, browser).await;

    match outcome {
        RetrievalOutcome::NotModified => {
            let prior = prior.context("304 Not Modified with no prior snapshot to reuse")?;
            store.save(
                guid,
                Snapshot {
                    data: prior.data,
                    timestamp: now_ts(),
                    tries: 0,
                    etag: prior.etag,
                    mime: prior.mime,
                },
            )?;
            Ok(JobResult {
                guid: guid.to_string(),
                job_name,
                verb: Verb::Unchanged,
                diff: None,
                error: None,
            })
        }
        RetrievalOutcome::Failure(failure) => {
            let class = retrieval::classify(common, &failure);
            handle_failure(guid, &job_name, common, store, prior, class, &failure)
        }
        RetrievalOutcome::Success(raw) => handle_success(
            guid,
            &job_name,
            job,
            common,
            store,
            prior,
            &normalized_filters,
            raw,
            report_kind,
            tz,
        ),
    }
}

async fn retrieve(
    job: &Job,
    prior: &Option<Snapshot>,
    expects_bytes: bool,
    ignore_cache: bool,
    browser: &dyn BrowserDriver,
) -> RetrievalOutcome {
    match job {
        Job::UrlSimple(url_job) => {
            let (etag, ts, tries) = match prior {
                Some(s) => (Some(s.etag.clone()), Some(s.timestamp), s.tries),
                None => (None, None, 0),
            };
            retrieval::url::retrieve(url_job, etag.as_deref(), ts, tries, expects_bytes, ignore_cache).await
        }
        Job::UrlBrowser(browser_job) => browser.fetch(BrowserRequest::from(browser_job)).await,
        Job::Shell(shell_job) => {
            let shell_job = shell_job.clone();
            let name = job.name().to_string();
            tokio::task::spawn_blocking(move || retrieval::shell::retrieve(&shell_job, &name, expects_bytes))
                .await
                .unwrap_or_else(|e| {
                    RetrievalOutcome::Failure(RetrievalFailure {
                        kind: retrieval::FailureKind::ShellNonZero,
                        message: e.to_string(),
                    })
                })
        }
    }
}

fn handle_failure(
    guid: &str,
    job_name: &str,
    common: &CommonJobAttrs,
    store: &dyn SnapshotStore,
    prior: Option<Snapshot>,
    class: ErrorClass,
    failure: &RetrievalFailure,
) -> Result<JobResult> {
    match class {
        ErrorClass::Ignored => Ok(JobResult {
            guid: guid.to_string(),
            job_name: job_name.to_string(),
            verb: Verb::Ignored,
            diff: None,
            error: None,
        }),
        ErrorClass::NotModified => {
            unreachable!("NotModified is resolved before classification is reached")
        }
        ErrorClass::Transient => {
            if let Some(prior) = prior {
                store.save(
                    guid,
                    Snapshot {
                        timestamp: now_ts(),
                        ..prior
                    },
                )?;
            }
            Ok(JobResult {
                guid: guid.to_string(),
                job_name: job_name.to_string(),
                verb: Verb::Error,
                diff: None,
                error: Some(failure.message.clone()),
            })
        }
        ErrorClass::Fatal => {
            let (tries, data, etag, mime) = match &prior {
                Some(p) => (p.tries + 1, p.data.clone(), p.etag.clone(), p.mime.clone()),
                None => (1, Vec::new(), String::new(), "text/plain".to_string()),
            };
            store.save(
                guid,
                Snapshot {
                    data,
                    timestamp: now_ts(),
                    tries,
                    etag,
                    mime,
                },
            )?;
            let error = if tries < common.max_tries {
                None
            } else {
                Some(failure.message.clone())
            };
            Ok(JobResult {
                guid: guid.to_string(),
                job_name: job_name.to_string(),
                verb: Verb::Error,
                diff: None,
                error,
            })
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_success(
    guid: &str,
    job_name: &str,
    job: &Job,
    common: &CommonJobAttrs,
    store: &dyn SnapshotStore,
    prior: Option<Snapshot>,
    normalized_filters: &[NormalizedFilter],
    raw: RawRetrieval,
    report_kind: ReportKind,
    tz: Option<&str>,
) -> Result<JobResult> {
    let ctx = FilterContext {
        job_name,
        job_location: job.location(),
    };
    let input = if raw.is_text {
        Artifact::Text(String::from_utf8_lossy(&raw.data).into_owned())
    } else {
        Artifact::Bytes(raw.data)
    };
    let artifact = apply_filter_chain(normalized_filters, input, &ctx)?;
    let canonical = artifact.into_bytes();
    let now = now_ts();

    let Some(prior) = prior else {
        store.save(
            guid,
            Snapshot {
                data: canonical,
                timestamp: now,
                tries: 0,
                etag: raw.etag,
                mime: raw.mime,
            },
        )?;
        return Ok(JobResult {
            guid: guid.to_string(),
            job_name: job_name.to_string(),
            verb: Verb::New,
            diff: None,
            error: None,
        });
    };

    if canonical == prior.data {
        store.save(
            guid,
            Snapshot {
                data: canonical,
                timestamp: now,
                tries: 0,
                etag: raw.etag,
                mime: raw.mime,
            },
        )?;
        return Ok(JobResult {
            guid: guid.to_string(),
            job_name: job_name.to_string(),
            verb: Verb::Unchanged,
            diff: None,
            error: None,
        });
    }

    if common.compared_versions > 1 {
        let history = store.get_history_data(guid, Some(common.compared_versions))?;
        if let Some((_, matched_ts)) = history.iter().find(|(data, _)| *data == canonical) {
            // §9: the matched entry is already in history; align the new
            // save's timestamp to it rather than stamping a fresh "now",
            // since the data itself hasn't actually changed.
            store.save(
                guid,
                Snapshot {
                    data: canonical,
                    timestamp: *matched_ts,
                    tries: 0,
                    etag: raw.etag,
                    mime: raw.mime,
                },
            )?;
            return Ok(JobResult {
                guid: guid.to_string(),
                job_name: job_name.to_string(),
                verb: Verb::Unchanged,
                diff: None,
                error: None,
            });
        }
    }

    let comparison_mode = if common.additions_only {
        ComparisonMode::AdditionsOnly
    } else if common.deletions_only {
        ComparisonMode::DeletionsOnly
    } else {
        ComparisonMode::Full
    };
    let normalized_differ = differ::normalize(&common.differ)?;
    let diff_ctx = DiffContext {
        old_timestamp: chrono::DateTime::from_timestamp(prior.timestamp, 0).unwrap_or_default(),
        new_timestamp: chrono::DateTime::from_timestamp(now, 0).unwrap_or_default(),
        context_lines: common.contextlines,
        comparison_mode,
        tz: tz.map(str::to_string),
    };
    let outcome = differ::diff(&normalized_differ, &prior.data, &canonical, &diff_ctx, report_kind)?;

    store.save(
        guid,
        Snapshot {
            data: canonical,
            timestamp: now,
            tries: 0,
            etag: raw.etag,
            mime: raw.mime,
        },
    )?;

    match outcome {
        DiffOutcome::Diff(text) => Ok(JobResult {
            guid: guid.to_string(),
            job_name: job_name.to_string(),
            verb: Verb::Changed,
            diff: Some(text),
            error: None,
        }),
        DiffOutcome::NoReport => Ok(JobResult {
            guid: guid.to_string(),
            job_name: job_name.to_string(),
            verb: Verb::ChangedNoReport,
            diff: None,
            error: None,
        }),
    }
}

fn apply_filter_chain(
    normalized: &[NormalizedFilter],
    mut artifact: Artifact,
    ctx: &FilterContext,
) -> Result<Artifact, crate::core::errors::WcError> {
    for filter in normalized {
        artifact = filters::catalog::apply(&filter.name, &filter.args, artifact, ctx)?;
    }
    Ok(artifact)
}
