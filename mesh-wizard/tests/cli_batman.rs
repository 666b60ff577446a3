use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use uci_core::{parse_file, Package};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn batman_cmd(config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mesh-wizard"));
    cmd.arg("batman").arg(config);
    cmd
}

fn read(dir: &Path, package: &str) -> Package {
    parse_file(&dir.join(package)).expect("parse written package")
}

#[test]
fn batman_attaches_halow_to_a_tuned_device() {
    let out = tempdir().expect("tempdir");
    let planned = out.path().join("config");

    batman_cmd(&fixture("fixtures/easymesh"))
        .args(["--gw-mode", "server"])
        .arg("--output")
        .arg(&planned)
        .assert()
        .success()
        .stdout(predicate::str::contains("~ network.bat0.proto='batadv'"))
        .stdout(predicate::str::contains("~ mesh11sd.mesh_params.mesh_fwding='0'"));

    let network = read(&planned, "network");
    let bat0 = network.section("bat0").expect("bat0");
    assert_eq!(bat0.get_str("gw_mode"), Some("server"));
    assert_eq!(bat0.get_str("routing_algo"), Some("BATMAN_V"));
    let hardif = network.section("batmesh0").expect("batmesh0");
    assert_eq!(hardif.get_str("proto"), Some("batadv_hardif"));
    assert_eq!(hardif.get_str("master"), Some("bat0"));

    let wireless = read(&planned, "wireless");
    assert_eq!(
        wireless.section("default_radio0").and_then(|s| s.get_str("network")),
        Some("batmesh0")
    );
}

#[test]
fn batman_on_its_own_output_changes_nothing() {
    let out = tempdir().expect("tempdir");
    let first = out.path().join("first");

    batman_cmd(&fixture("fixtures/easymesh"))
        .arg("--output")
        .arg(&first)
        .assert()
        .success();
    batman_cmd(&first)
        .assert()
        .success()
        .stdout(predicate::str::contains("no changes"));
}

#[test]
fn batman_refuses_to_overwrite_its_input() {
    let dir = fixture("fixtures/easymesh");
    batman_cmd(&dir)
        .arg("--output")
        .arg(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
}
