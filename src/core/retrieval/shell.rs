use std::process::Command;

use crate::core::job::ShellJob;

use super::{FailureKind, RawRetrieval, RetrievalFailure, RetrievalOutcome};

/// Retrieve a `shell` job (§4.1). Spawns the command in a subshell, injecting
/// `URLWATCH_JOB_NAME`/`URLWATCH_JOB_LOCATION` into the child's environment
/// without mutating the parent process's (`Command::env` only affects the
/// spawned child, per the standard library contract).
pub fn retrieve(job: &ShellJob, job_name: &str, expects_bytes: bool) -> RetrievalOutcome {
    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(&job.command)
        .env("URLWATCH_JOB_NAME", job_name)
        .env("URLWATCH_JOB_LOCATION", &job.command)
        .output();

    let output = match output {
        Ok(o) => o,
        Err(e) => {
            return RetrievalOutcome::Failure(RetrievalFailure {
                kind: FailureKind::ShellNonZero,
                message: e.to_string(),
            })
        }
    };

    if !output.status.success() {
        return RetrievalOutcome::Failure(RetrievalFailure {
            kind: FailureKind::ShellNonZero,
            message: format!(
                "exit code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    if expects_bytes {
        RetrievalOutcome::Success(RawRetrieval {
            data: output.stdout,
            is_text: false,
            etag: String::new(),
            mime: "application/octet-stream".to_string(),
        })
    } else {
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        RetrievalOutcome::Success(RawRetrieval {
            data: text.into_bytes(),
            is_text: true,
            etag: String::new(),
            mime: "text/plain".to_string(),
        })
    }
}
