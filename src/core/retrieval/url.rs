use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;

use crate::core::job::UrlJob;

use super::{FailureKind, RawRetrieval, RetrievalFailure, RetrievalOutcome};

/// Build a client scoped to a single job's retrieval config (§4.1, §6):
/// SSL verification toggle, proxy (falling back to `HTTP_PROXY`/`HTTPS_PROXY`
/// when the job doesn't set one), timeout, and redirect policy.
fn build_client(job: &UrlJob) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(job.ssl_no_verify)
        .timeout(Duration::from_secs(job.timeout))
        .redirect(if job.no_redirects {
            Policy::none()
        } else {
            Policy::default()
        });

    let proxy_url = job.proxy.clone().or_else(|| {
        std::env::var("HTTPS_PROXY")
            .or_else(|_| std::env::var("HTTP_PROXY"))
            .ok()
    });
    if let Some(proxy_url) = proxy_url
        && let Ok(proxy) = reqwest::Proxy::all(&proxy_url)
    {
        builder = builder.proxy(proxy);
    }

    builder.build()
}

/// Decode a retrieved body per the job's `encoding` override (§4.1). An
/// unrecognized label falls back to UTF-8, same as no override at all.
fn decode_body(bytes: &[u8], encoding: Option<&str>) -> String {
    match encoding {
        Some(label) => {
            let codec = encoding_rs::Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8);
            let (text, _, _) = codec.decode(bytes);
            text.into_owned()
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Retrieve a `url-simple` job (§4.1). `expects_bytes` comes from the job's
/// filter chain (§4.2): when the first filter requires binary input, the
/// body is returned undecoded.
pub async fn retrieve(
    job: &UrlJob,
    prior_etag: Option<&str>,
    prior_timestamp: Option<i64>,
    prior_tries: u32,
    expects_bytes: bool,
    ignore_cache: bool,
) -> RetrievalOutcome {
    let client = match build_client(job) {
        Ok(c) => c,
        Err(e) => {
            return RetrievalOutcome::Failure(RetrievalFailure {
                kind: FailureKind::Connection,
                message: e.to_string(),
            })
        }
    };

    let method = match job.method.as_deref() {
        Some(m) => match m.to_ascii_uppercase().parse::<reqwest::Method>() {
            Ok(m) => m,
            Err(e) => {
                return RetrievalOutcome::Failure(RetrievalFailure {
                    kind: FailureKind::Connection,
                    message: e.to_string(),
                })
            }
        },
        None if job.data.is_some() => reqwest::Method::POST,
        None => reqwest::Method::GET,
    };

    let mut request = client.request(method, &job.url);

    let mut headers = HeaderMap::new();
    for (key, value) in &job.headers {
        if let (Ok(name), Ok(val)) = (
            HeaderName::try_from(key.as_str()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, val);
        }
    }

    let use_conditional = !ignore_cache && prior_tries == 0;
    if use_conditional
        && let Some(etag) = prior_etag
        && let Some(ts) = prior_timestamp
    {
        if let Ok(v) = HeaderValue::from_str(etag) {
            headers.insert(HeaderName::from_static("if-none-match"), v);
        }
        let imf = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.to_rfc2822())
            .unwrap_or_default();
        if let Ok(v) = HeaderValue::from_str(&imf) {
            headers.insert(HeaderName::from_static("if-modified-since"), v);
        }
    } else {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-cache"),
        );
    }

    if !job.cookies.is_empty() {
        let cookie_header = job
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        if let Ok(v) = HeaderValue::from_str(&cookie_header) {
            headers.insert(HeaderName::from_static("cookie"), v);
        }
    }

    request = request.headers(headers);
    if let Some(body) = &job.data {
        request = request.body(body.clone());
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() => {
            return RetrievalOutcome::Failure(RetrievalFailure {
                kind: FailureKind::Timeout,
                message: e.to_string(),
            })
        }
        Err(e) if e.is_redirect() => {
            return RetrievalOutcome::Failure(RetrievalFailure {
                kind: FailureKind::TooManyRedirects,
                message: e.to_string(),
            })
        }
        Err(e) => {
            return RetrievalOutcome::Failure(RetrievalFailure {
                kind: FailureKind::Connection,
                message: e.to_string(),
            })
        }
    };

    let status = response.status();
    if status.as_u16() == 304 {
        return RetrievalOutcome::NotModified;
    }
    if status.as_u16() == 429 {
        return RetrievalOutcome::Failure(RetrievalFailure {
            kind: FailureKind::TooManyRequests,
            message: "429 Too Many Requests".to_string(),
        });
    }
    if !status.is_success() {
        return RetrievalOutcome::Failure(RetrievalFailure {
            kind: FailureKind::HttpStatus(status.as_u16()),
            message: format!("HTTP status {status}"),
        });
    }

    let etag = response
        .headers()
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/plain")
        .to_string();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("text/plain")
        .trim()
        .to_string();

    let bytes = match response.bytes().await {
        Ok(b) => b.to_vec(),
        Err(e) => {
            return RetrievalOutcome::Failure(RetrievalFailure {
                kind: FailureKind::Connection,
                message: e.to_string(),
            })
        }
    };

    // §4.1: an explicit encoding override always wins; absent one, this
    // build decodes as UTF-8.
    let is_text = !expects_bytes;
    if is_text {
        let text = decode_body(&bytes, job.encoding.as_deref());
        RetrievalOutcome::Success(RawRetrieval {
            data: text.into_bytes(),
            is_text: true,
            etag,
            mime,
        })
    } else {
        RetrievalOutcome::Success(RawRetrieval {
            data: bytes,
            is_text: false,
            etag,
            mime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::CommonJobAttrs;

    fn job(url: &str) -> UrlJob {
        UrlJob {
            common: CommonJobAttrs {
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
            },
            url: url.to_string(),
            method: None,
            headers: Default::default(),
            cookies: Default::default(),
            data: None,
            ssl_no_verify: true,
            proxy: None,
            timeout: 5,
            no_redirects: false,
            encoding: None,
        }
    }

    #[test]
    fn test_decode_body_defaults_to_utf8() {
        assert_eq!(decode_body("héllo".as_bytes(), None), "héllo");
    }

    #[test]
    fn test_decode_body_honors_explicit_non_utf8_encoding() {
        // 'é' in ISO-8859-1 is the single byte 0xE9.
        let latin1 = [b'h', 0xE9, b'l', b'l', b'o'];
        assert_eq!(decode_body(&latin1, Some("iso-8859-1")), "héllo");
    }

    #[test]
    fn test_decode_body_unrecognized_label_falls_back_to_utf8() {
        assert_eq!(decode_body(b"hello", Some("not-a-real-charset")), "hello");
    }

    #[tokio::test]
    async fn test_connection_refused_classified_as_connection() {
        let j = job("http://127.0.0.1:1");
        let outcome = retrieve(&j, None, None, 0, false, false).await;
        match outcome {
            RetrievalOutcome::Failure(f) => {
                assert!(matches!(f.kind, FailureKind::Connection | FailureKind::Timeout))
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
