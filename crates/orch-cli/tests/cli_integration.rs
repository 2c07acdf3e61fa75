use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn version_flag_prints_binary_name() {
    let mut cmd = Command::cargo_bin("orch").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("orch"));
}

#[test]
fn help_flag_lists_run_subcommand() {
    let mut cmd = Command::cargo_bin("orch").unwrap();
    cmd.arg("--help").assert().success().stdout(predicate::str::contains("run"));
}

#[test]
fn run_without_prompt_starts_a_turn_and_prints_summary() {
    let workspace = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("orch").unwrap();
    cmd.arg("--cwd")
        .arg(workspace.path())
        .arg("run")
        .arg("--session")
        .arg("s1")
        .assert()
        .success()
        .stdout(predicate::str::contains("turn 1 complete"));
}

#[test]
fn run_with_prompt_records_a_tool_call_and_cost_total() {
    let workspace = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("orch").unwrap();
    cmd.arg("--cwd")
        .arg(workspace.path())
        .arg("run")
        .arg("hello there")
        .arg("--session")
        .arg("s1")
        .assert()
        .success()
        .stdout(predicate::str::contains("tokens:"));
}

#[test]
fn replay_with_no_sessions_reports_argument_error() {
    let workspace = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("orch").unwrap();
    cmd.arg("--cwd").arg(workspace.path()).arg("run").arg("--replay").assert().failure().code(2);
}

#[test]
fn undo_after_a_plain_run_reports_nothing_to_roll_back() {
    let workspace = TempDir::new().unwrap();

    Command::cargo_bin("orch")
        .unwrap()
        .arg("--cwd")
        .arg(workspace.path())
        .arg("run")
        .arg("--session")
        .arg("s1")
        .assert()
        .success();

    Command::cargo_bin("orch")
        .unwrap()
        .arg("--cwd")
        .arg(workspace.path())
        .arg("run")
        .arg("--undo")
        .arg("--session")
        .arg("s1")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("no patch sets to roll back"));
}
