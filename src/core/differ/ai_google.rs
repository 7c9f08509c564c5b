use std::collections::BTreeMap;

use super::{DiffContext, DiffOutcome};
use crate::core::errors::WcError;

/// LLM-summarized diff via the Google Generative Language API (§4.4
/// `ai_google`). Requires `GOOGLE_AI_API_KEY`; this build does not perform
/// the network call itself (the differ pipeline is synchronous and this
/// would need an async client), so it always fails once the key is present
/// too, with a distinct error naming the gap.
pub fn diff(
    _old_data: &[u8],
    _new_data: &[u8],
    _args: &BTreeMap<String, serde_yaml::Value>,
    _ctx: &DiffContext,
) -> Result<DiffOutcome, WcError> {
    if std::env::var("GOOGLE_AI_API_KEY").is_err() {
        return Err(WcError::MissingGoogleApiKey);
    }
    Err(WcError::DifferUnsupported(
        "ai_google",
        "the Google Generative Language API call is not implemented in this build",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::core::differ::ComparisonMode;

    fn ctx() -> DiffContext {
        DiffContext {
            old_timestamp: Utc::now(),
            new_timestamp: Utc::now(),
            context_lines: None,
            comparison_mode: ComparisonMode::Full,
            tz: None,
        }
    }

    #[test]
    fn test_missing_api_key_is_reported() {
        // SAFETY: test-only; no other test in this process depends on this var.
        unsafe { std::env::remove_var("GOOGLE_AI_API_KEY") };
        let err = diff(b"a", b"b", &BTreeMap::new(), &ctx()).unwrap_err();
        assert!(matches!(err, WcError::MissingGoogleApiKey));
    }
}
