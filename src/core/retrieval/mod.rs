pub mod browser;
pub mod shell;
pub mod url;

use crate::core::errors::ErrorClass;
use crate::core::job::CommonJobAttrs;

/// A successful retrieval, prior to filtering (§4.1).
#[derive(Debug, Clone)]
pub struct RawRetrieval {
    pub data: Vec<u8>,
    pub is_text: bool,
    pub etag: String,
    pub mime: String,
}

/// What a retrieval attempt produced, before error classification (§4.1, §4.5).
#[derive(Debug)]
pub enum RetrievalOutcome {
    Success(RawRetrieval),
    NotModified,
    Failure(RetrievalFailure),
}

/// The raw cause of a failed retrieval, independent of how the job's ignore
/// predicates will classify it (§4.1, §7).
#[derive(Debug, Clone)]
pub struct RetrievalFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connection,
    Timeout,
    TooManyRedirects,
    TooManyRequests,
    HttpStatus(u16),
    ShellNonZero,
    BrowserUnsupported,
}

/// Classify a retrieval failure per §4.1/§7: `ignored` when a per-job
/// predicate matches, `transient` for 429/browser-connection-closed
/// (§4.1 treats both the same way), else `fatal`.
pub fn classify(common: &CommonJobAttrs, failure: &RetrievalFailure) -> ErrorClass {
    match failure.kind {
        FailureKind::TooManyRequests => ErrorClass::Transient,
        FailureKind::Connection if common.ignore_connection_errors => ErrorClass::Ignored,
        FailureKind::Connection => ErrorClass::Fatal,
        FailureKind::Timeout if common.ignore_timeout_errors => ErrorClass::Ignored,
        FailureKind::Timeout => ErrorClass::Fatal,
        FailureKind::TooManyRedirects if common.ignore_too_many_redirects => ErrorClass::Ignored,
        FailureKind::TooManyRedirects => ErrorClass::Fatal,
        FailureKind::HttpStatus(code) if common.ignores_http_status(code) => ErrorClass::Ignored,
        FailureKind::HttpStatus(_) => ErrorClass::Fatal,
        FailureKind::ShellNonZero => ErrorClass::Fatal,
        FailureKind::BrowserUnsupported => ErrorClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common() -> CommonJobAttrs {
        CommonJobAttrs {
            name: None,
            filter: vec![],
            differ: crate::core::differ::DifferSpec::default(),
            max_tries: 1,
            additions_only: false,
            deletions_only: false,
            contextlines: None,
            compared_versions: 1,
            ignore_connection_errors: false,
            ignore_timeout_errors: false,
            ignore_too_many_redirects: false,
            ignore_http_error_codes: vec![],
        }
    }

    #[test]
    fn test_429_is_always_transient() {
        let failure = RetrievalFailure {
            kind: FailureKind::TooManyRequests,
            message: "too many requests".to_string(),
        };
        assert_eq!(classify(&common(), &failure), ErrorClass::Transient);
    }

    #[test]
    fn test_connection_error_ignored_when_configured() {
        let mut c = common();
        c.ignore_connection_errors = true;
        let failure = RetrievalFailure {
            kind: FailureKind::Connection,
            message: "refused".to_string(),
        };
        assert_eq!(classify(&c, &failure), ErrorClass::Ignored);
    }

    #[test]
    fn test_connection_error_fatal_by_default() {
        let failure = RetrievalFailure {
            kind: FailureKind::Connection,
            message: "refused".to_string(),
        };
        assert_eq!(classify(&common(), &failure), ErrorClass::Fatal);
    }

    #[test]
    fn test_http_status_matches_ignore_list() {
        let mut c = common();
        c.ignore_http_error_codes = vec!["404".to_string()];
        let failure = RetrievalFailure {
            kind: FailureKind::HttpStatus(404),
            message: "not found".to_string(),
        };
        assert_eq!(classify(&c, &failure), ErrorClass::Ignored);
    }
}
