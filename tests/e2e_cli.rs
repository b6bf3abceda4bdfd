use assert_cmd::{cargo, prelude::*};
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("data.db")
}

fn cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("nestegg"));
    cmd.arg("--db").arg(db_path(dir));
    cmd
}

fn run(dir: &TempDir, args: &[&str]) {
    cmd(dir).args(args).assert().success();
}

/// Seeds one user with a savings account holding a single deposit.
fn seed(dir: &TempDir) {
    run(dir, &["init"]);
    run(dir, &["users", "add", "asha"]);
    run(
        dir,
        &[
            "investments",
            "add",
            "asha",
            "salary account",
            "SAVINGS_ACCOUNT",
            "2024-01-01",
        ],
    );
    run(
        dir,
        &[
            "transactions",
            "add",
            "1",
            "DEPOSIT",
            "2024-01-05",
            "2000.00",
        ],
    );
}

#[test]
fn init_creates_database_file() {
    let dir = TempDir::new().unwrap();
    assert!(!db_path(&dir).exists());

    cmd(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database initialized"));

    assert!(db_path(&dir).exists());
}

#[test]
fn snapshot_calculate_reports_net_worth() {
    let dir = TempDir::new().unwrap();
    seed(&dir);

    cmd(&dir)
        .args(["snapshots", "calculate", "asha", "--month", "2024-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-02"))
        .stdout(predicate::str::contains("2,000.00"));

    cmd(&dir)
        .args(["snapshots", "networth", "asha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-02  2,000.00"));
}

#[test]
fn json_output_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    seed(&dir);

    let output = cmd(&dir)
        .args(["--json", "snapshots", "calculate", "asha", "--month", "2024-02"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON output");
    assert_eq!(value["totalMinor"], 200_000);
    assert_eq!(value["snapshotsCalculated"], 1);
}

#[test]
fn unknown_user_is_a_clean_failure() {
    let dir = TempDir::new().unwrap();
    run(&dir, &["init"]);

    cmd(&dir)
        .args(["xirr", "nobody", "SHARES"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown user"));
}

#[test]
fn investments_list_shows_added_holdings() {
    let dir = TempDir::new().unwrap();
    seed(&dir);

    cmd(&dir)
        .args(["investments", "list", "asha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SAVINGS_ACCOUNT"))
        .stdout(predicate::str::contains("salary account"));
}
