use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn inspect_prints_every_package() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mesh-wizard"));
    cmd.arg("inspect")
        .arg(fixture("fixtures/easymesh"))
        .assert()
        .success()
        .stdout(predicate::str::contains("# network"))
        .stdout(predicate::str::contains("# wireless"))
        .stdout(predicate::str::contains("config interface 'ahwlan'"));
}

#[test]
fn inspect_package_prints_only_that_package() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mesh-wizard"));
    cmd.arg("inspect")
        .arg(fixture("fixtures/easymesh"))
        .arg("--package")
        .arg("wireless")
        .assert()
        .success()
        .stdout(predicate::str::contains("config wifi-device 'radio0'"))
        .stdout(predicate::str::contains("\toption type 'morse'"))
        .stdout(predicate::str::contains("# network").not());
}

#[test]
fn inspect_unknown_package_fails() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mesh-wizard"));
    cmd.arg("inspect")
        .arg(fixture("fixtures/easymesh"))
        .arg("--package")
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("package 'nope' not found"));
}

#[test]
fn inspect_reports_parse_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("network"), "option proto dhcp\n").expect("write");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mesh-wizard"));
    cmd.arg("inspect")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}
