use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn xtailor() -> Command {
    let mut cmd = Command::cargo_bin("xtailor").expect("binary exists");
    cmd.env_remove("XTAILOR_OUTPUT").env("XTAILOR_LOG", "warn");
    cmd
}

#[test]
fn help_displays_usage() {
    xtailor()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("export"));
}

#[test]
fn check_summarizes_fixture() {
    xtailor()
        .arg("check")
        .arg(fixture("merge-order.xml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("2 rules · 2 variables"));
}

#[test]
fn check_fails_without_profile() {
    xtailor()
        .arg("check")
        .arg(fixture("invalid/no-profile.xml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no Profile element"));
}

#[test]
fn list_emits_json() {
    xtailor()
        .args(["list", "--json", "--filter", "telnet"])
        .arg(fixture("unprefixed.xml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"rule\""))
        .stdout(predicate::str::contains("\"severity\": \"info\""))
        .stdout(predicate::str::contains("rsh").not());
}

#[test]
fn export_to_stdout_escapes_values() {
    xtailor()
        .args(["export", "--output", "-"])
        .arg(fixture("escaped-values.xml"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<?xml"))
        .stdout(predicate::str::contains("&lt;no &quot;exceptions&quot;&gt;"));
}

#[test]
fn export_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.xml");
    xtailor()
        .current_dir(dir.path())
        .args(["export", "--raw", "-o"])
        .arg(&output)
        .arg(fixture("merge-order.xml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    let written = std::fs::read_to_string(output).unwrap();
    assert!(written.contains("var_password_pam_minlen\">16</xccdf:set-value>"));
}

#[test]
fn completions_are_generated() {
    xtailor()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xtailor"));
}
