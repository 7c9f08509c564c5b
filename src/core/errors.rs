use thiserror::Error;

#[derive(Debug, Error)]
pub enum WcError {
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("unknown differ '{0}'")]
    UnknownDiffer(String),

    #[error("unknown sub-directive '{0}' for filter '{1}'")]
    UnknownSubDirective(String, String),

    #[error("malformed job at index {0}: {1}")]
    MalformedJob(usize, String),

    #[error("unknown top-level key '{0}' in job document")]
    UnknownJobKey(String),

    #[error("filter '{0}' requires binary input but received text")]
    FilterExpectedBytes(String),

    #[error("http request to {0} returned status {1}")]
    HttpStatus(String, u16),

    #[error("shell command failed with exit code {code:?}: {stderr}")]
    ShellCommandFailed { code: Option<i32>, stderr: String },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("browser retrieval is not supported by this build: {0}")]
    BrowserUnsupported(String),

    #[error("differ '{0}' is not implemented in this build: {1}")]
    DifferUnsupported(&'static str, &'static str),

    #[error("filter '{0}' is not implemented in this build: {1}")]
    FilterUnsupported(&'static str, &'static str),

    #[error("snapshot store write failed: {0}")]
    StoreWrite(String),

    #[error("job fingerprint '{0}' has no history")]
    GuidNotFound(String),

    #[error("hooks file {0} is not safe to load")]
    UnsafeHooksFile(String),

    #[error("GOOGLE_AI_API_KEY is not set; the ai_google differ cannot run")]
    MissingGoogleApiKey,
}

/// Outcome of a single retrieval attempt, classified per the job's ignore
/// predicates and the source of the failure. Distinct from `WcError` because
/// the same underlying error (e.g. HTTP 429) is transient or fatal depending
/// on job configuration, not on the error's own type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    Ignored,
    NotModified,
    Transient,
    Fatal,
}
