use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("taskdesk")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("signin"))
        .stdout(predicate::str::contains("signup"))
        .stdout(predicate::str::contains("signout"))
        .stdout(predicate::str::contains("whoami"))
        .stdout(predicate::str::contains("tasks"));
}

#[test]
fn test_tasks_help_shows_subcommands() {
    cargo_bin_cmd!("taskdesk")
        .args(["tasks", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("edit"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn test_unknown_status_is_rejected_by_parser() {
    cargo_bin_cmd!("taskdesk")
        .args(["tasks", "list", "--status", "archived"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown task status 'archived'"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("taskdesk")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}
