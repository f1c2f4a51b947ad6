use assert_cmd::Command;
use predicates::prelude::*;

fn ragline() -> Command {
    Command::cargo_bin("ragline").unwrap()
}

#[test]
fn help_lists_subcommands() {
    ragline()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("schema"));
}

#[test]
fn schema_prints_config_shape() {
    ragline()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"retrieve\""))
        .stdout(predicate::str::contains("\"rrf_k\""))
        .stdout(predicate::str::contains("\"strategies\""));
}

#[test]
fn init_writes_a_loadable_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ragline.yaml");

    ragline()
        .args(["init", "--output"])
        .arg(&path)
        .assert()
        .success();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("rrf_k"));
    assert!(written.contains("strategies"));
}

#[test]
fn init_refuses_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ragline.yaml");
    std::fs::write(&path, "version: 1\n").unwrap();

    ragline()
        .args(["init", "--output"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn ask_help_documents_thread_scope() {
    ragline()
        .args(["ask", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("in-process"))
        .stdout(predicate::str::contains("outlive"));
}

#[test]
fn ask_fails_cleanly_when_config_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.yaml");

    ragline()
        .args(["ask", "why are checkouts failing", "--config"])
        .arg(&path)
        .assert()
        .failure();
}
