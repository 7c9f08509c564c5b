use serde::Deserialize;
use serde_yaml::Value;

use crate::core::config::{Config, JobKindHint};
use crate::core::errors::WcError;
use crate::core::job::{BrowserJob, Job, ShellJob, UrlJob};

const COMMON_KEYS: &[&str] = &[
    "name",
    "filter",
    "differ",
    "max_tries",
    "additions_only",
    "deletions_only",
    "contextlines",
    "compared_versions",
    "ignore_connection_errors",
    "ignore_timeout_errors",
    "ignore_too_many_redirects",
    "ignore_http_error_codes",
];

const URL_KEYS: &[&str] = &[
    "url", "method", "headers", "cookies", "data", "ssl_no_verify", "proxy", "timeout",
    "no_redirects", "encoding",
];

const BROWSER_KEYS: &[&str] = &[
    "url",
    "use_browser",
    "headers",
    "cookies",
    "block_elements",
    "user_data_dir",
    "switches",
    "wait_for",
    "wait_until",
    "timeout",
    "ignore_https_errors",
];

const SHELL_KEYS: &[&str] = &["command"];

/// Infer a job's variant from which top-level keys are present (§6): a
/// `command` key means shell, `use_browser: true` means browser, otherwise a
/// bare `url` means url-simple.
fn infer_kind(map: &serde_yaml::Mapping) -> Result<JobKindHint, WcError> {
    if map.contains_key(Value::String("command".to_string())) {
        return Ok(JobKindHint::Shell);
    }
    if map
        .get(Value::String("use_browser".to_string()))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        return Ok(JobKindHint::UrlBrowser);
    }
    if map.contains_key(Value::String("url".to_string())) {
        return Ok(JobKindHint::UrlSimple);
    }
    Err(WcError::MalformedJob(
        0,
        "job has none of `command`, `use_browser`, or `url` — cannot infer its kind".to_string(),
    ))
}

fn allowed_keys(kind: JobKindHint) -> Vec<&'static str> {
    let specific: &[&str] = match kind {
        JobKindHint::UrlSimple => URL_KEYS,
        JobKindHint::UrlBrowser => BROWSER_KEYS,
        JobKindHint::Shell => SHELL_KEYS,
    };
    COMMON_KEYS.iter().chain(specific).copied().collect()
}

fn reject_unknown_keys(map: &serde_yaml::Mapping, kind: JobKindHint) -> Result<(), WcError> {
    let allowed = allowed_keys(kind);
    for key in map.keys() {
        let Value::String(key) = key else { continue };
        if !allowed.contains(&key.as_str()) {
            return Err(WcError::UnknownJobKey(key.clone()));
        }
    }
    Ok(())
}

/// Parse a single job document, after `config`'s `job_defaults` have been
/// merged in (§6). Index is used only for error messages.
pub fn parse_job(mut value: Value, config: &Config, index: usize) -> Result<Job, WcError> {
    let map = value
        .as_mapping_mut()
        .ok_or_else(|| WcError::MalformedJob(index, "job document must be a mapping".to_string()))?;

    let kind = infer_kind(map)?;
    let kind_defaults = config.kind_defaults(kind).clone();
    config.merge_defaults(map, &kind_defaults);

    reject_unknown_keys(map, kind)?;

    let job = match kind {
        JobKindHint::Shell => Job::Shell(
            serde_yaml::from_value::<ShellJob>(value)
                .map_err(|e| WcError::MalformedJob(index, e.to_string()))?,
        ),
        JobKindHint::UrlBrowser => Job::UrlBrowser(
            serde_yaml::from_value::<BrowserJob>(value)
                .map_err(|e| WcError::MalformedJob(index, e.to_string()))?,
        ),
        JobKindHint::UrlSimple => Job::UrlSimple(
            serde_yaml::from_value::<UrlJob>(value)
                .map_err(|e| WcError::MalformedJob(index, e.to_string()))?,
        ),
    };

    job.validate()
        .map_err(|e| WcError::MalformedJob(index, e.to_string()))?;
    Ok(job)
}

/// Load a multi-document YAML job-list file (§6): one mapping per document.
pub fn load_job_list(text: &str, config: &Config) -> Result<Vec<Job>, WcError> {
    let mut jobs = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = Value::deserialize(document)
            .map_err(|e| WcError::MalformedJob(index, e.to_string()))?;
        if matches!(value, Value::Null) {
            continue;
        }
        jobs.push(parse_job(value, config, index)?);
    }
    Ok(jobs)
}
