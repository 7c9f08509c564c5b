mod common;

use predicates::prelude::*;

use common::{HttpFixture, TestEnv};

#[test]
fn test_first_run_reports_new() {
    let env = TestEnv::new();
    env.write_jobs("command: echo hello\nname: greeting\n");

    env.command()
        .args(["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NEW"))
        .stdout(predicate::str::contains("greeting"));
}

#[test]
fn test_second_run_unchanged_is_quiet() {
    let env = TestEnv::new();
    env.write_jobs("command: echo hello\nname: greeting\n");

    env.command().args(["run"]).assert().success();

    // Without --verbose, unchanged jobs produce no per-job line.
    env.command()
        .args(["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NEW").not())
        .stdout(predicate::str::contains("ERROR").not());
}

#[test]
fn test_verbose_second_run_shows_unchanged() {
    let env = TestEnv::new();
    env.write_jobs("command: echo hello\nname: greeting\n");

    env.command().args(["run"]).assert().success();

    env.command()
        .args(["--verbose", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));
}

#[test]
fn test_changed_job_shows_diff() {
    let fixture = HttpFixture::spawn(vec!["version one\n", "version two\n"]);
    let env = TestEnv::new();
    env.write_jobs(&format!("url: {}\nname: page\n", fixture.url()));

    env.command().args(["run"]).assert().success();

    env.command()
        .args(["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CHANGED"))
        .stdout(predicate::str::contains("version two"));
}

#[test]
fn test_failing_job_reports_error_after_max_tries() {
    let env = TestEnv::new();
    env.write_jobs("command: exit 7\nname: flaky\nmax_tries: 1\n");

    env.command()
        .args(["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ERROR"))
        .stdout(predicate::str::contains("flaky"));
}

#[test]
fn test_retry_cap_suppresses_early_errors() {
    let env = TestEnv::new();
    env.write_jobs("command: exit 7\nname: flaky\nmax_tries: 3\n");

    env.command()
        .args(["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ERROR").not());

    env.command()
        .args(["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ERROR").not());

    env.command()
        .args(["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ERROR"));
}

#[test]
fn test_list_jobs_shows_every_job() {
    let env = TestEnv::new();
    env.write_jobs("command: echo one\nname: first\n---\ncommand: echo two\nname: second\n");

    env.command()
        .args(["list-jobs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("first"))
        .stdout(predicate::str::contains("second"));
}

#[test]
fn test_history_after_two_runs() {
    let env = TestEnv::new();
    env.write_jobs("command: echo hello\nname: greeting\n");

    env.command().args(["run"]).assert().success();
    env.command().args(["run"]).assert().success();

    env.command()
        .args(["history", "0", "--limit", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("entries for"));
}

#[test]
fn test_diff_needs_two_snapshots() {
    let env = TestEnv::new();
    env.write_jobs("command: echo hello\nname: greeting\n");

    env.command().args(["run"]).assert().success();

    env.command()
        .args(["diff", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not enough history"));
}

#[test]
fn test_gc_drops_fingerprint_no_longer_in_job_list() {
    let env = TestEnv::new();
    env.write_jobs("command: echo one\nname: first\n");
    env.command().args(["run"]).assert().success();

    // Replace the job list with an unrelated job; the old fingerprint is
    // now orphaned.
    env.write_jobs("command: echo two\nname: second\n");

    env.command()
        .args(["gc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dropped 1 fingerprint"));
}

#[test]
fn test_delete_removes_history() {
    let env = TestEnv::new();
    env.write_jobs("command: echo one\nname: first\n");
    env.command().args(["run"]).assert().success();

    env.command()
        .args(["delete", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted"));

    env.command()
        .args(["history", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No history"));
}
