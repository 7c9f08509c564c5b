use std::collections::BTreeMap;
use std::io::Write as _;
use std::process::Command;

use super::{format_timestamp, DiffContext, DiffOutcome};
use crate::core::errors::WcError;

/// Shells out to an external diff tool (§4.4 `command`). Old and new data are
/// written to temp files whose paths are substituted for `$OLD_FILE` /
/// `$NEW_FILE` in the configured command. Exit code 0 means the tool found
/// nothing worth reporting; exit code 1 reports the tool's stdout under a
/// mandated header; any other exit code (or a killed/missing-status process)
/// is a genuine tool failure.
pub fn diff(
    old_data: &[u8],
    new_data: &[u8],
    args: &BTreeMap<String, serde_yaml::Value>,
    ctx: &DiffContext,
) -> Result<DiffOutcome, WcError> {
    let template = args
        .get("command")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WcError::MalformedJob(0, "command differ requires a 'command' argument".to_string()))?;

    let mut old_file = tempfile::NamedTempFile::new()
        .map_err(|e| WcError::StoreWrite(format!("failed to create temp file: {e}")))?;
    old_file
        .write_all(old_data)
        .map_err(|e| WcError::StoreWrite(format!("failed to write temp file: {e}")))?;

    let mut new_file = tempfile::NamedTempFile::new()
        .map_err(|e| WcError::StoreWrite(format!("failed to create temp file: {e}")))?;
    new_file
        .write_all(new_data)
        .map_err(|e| WcError::StoreWrite(format!("failed to write temp file: {e}")))?;

    let command_line = template
        .replace("$OLD_FILE", &old_file.path().display().to_string())
        .replace("$NEW_FILE", &new_file.path().display().to_string());

    let output = Command::new("sh")
        .arg("-c")
        .arg(&command_line)
        .output()
        .map_err(|e| WcError::ShellCommandFailed { code: None, stderr: e.to_string() })?;

    match output.status.code() {
        Some(0) => Ok(DiffOutcome::NoReport),
        Some(1) => {
            let header = format!(
                "Using differ 'command'\nOld: {}\nNew: {}\n{}\n",
                format_timestamp(ctx.old_timestamp, ctx.tz.as_deref()),
                format_timestamp(ctx.new_timestamp, ctx.tz.as_deref()),
                "-".repeat(32),
            );
            let body = String::from_utf8_lossy(&output.stdout).into_owned();
            Ok(DiffOutcome::Diff(format!("{header}{body}")))
        }
        code => Err(WcError::ShellCommandFailed {
            code,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::differ::ComparisonMode;
    use chrono::Utc;

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
    fn test_missing_command_arg_is_malformed() {
        let args = BTreeMap::new();
        let err = diff(b"a", b"b", &args, &ctx()).unwrap_err();
        assert!(matches!(err, WcError::MalformedJob(_, _)));
    }

    #[test]
    fn test_diff_command_reports_tool_output_with_header() {
        let mut args = BTreeMap::new();
        args.insert(
            "command".to_string(),
            serde_yaml::Value::String("diff $OLD_FILE $NEW_FILE".to_string()),
        );
        let outcome = diff(b"a\n", b"b\n", &args, &ctx()).unwrap();
        match outcome {
            DiffOutcome::Diff(body) => {
                assert!(body.starts_with("Using differ 'command'"));
                assert!(body.contains("Old:"));
                assert!(body.contains("New:"));
            }
            other => panic!("expected Diff, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_exit_is_no_report() {
        let mut args = BTreeMap::new();
        args.insert("command".to_string(), serde_yaml::Value::String("true".to_string()));
        let outcome = diff(b"a", b"b", &args, &ctx()).unwrap();
        assert_eq!(outcome, DiffOutcome::NoReport);
    }

    #[test]
    fn test_exit_code_above_one_is_error() {
        let mut args = BTreeMap::new();
        args.insert("command".to_string(), serde_yaml::Value::String("exit 2".to_string()));
        let err = diff(b"a", b"b", &args, &ctx()).unwrap_err();
        assert!(matches!(err, WcError::ShellCommandFailed { code: Some(2), .. }));
    }
}
