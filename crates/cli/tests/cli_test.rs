//! Command line behaviour of the erlcheck binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn erlcheck() -> Command {
    Command::cargo_bin("erlcheck").unwrap()
}

#[test]
fn test_help_lists_flags() {
    erlcheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--nooutdir"))
        .stdout(predicate::str::contains("--load <NAMING> <MYNAME> <TARGETNAME>"));
}

#[test]
fn test_no_files_is_a_usage_error() {
    erlcheck().assert().code(2);
}

#[test]
fn test_unknown_flag_is_a_usage_error() {
    erlcheck()
        .args(["--frobnicate", "a.erl"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--frobnicate"));
}

#[test]
fn test_bad_naming_mode_is_a_usage_error() {
    erlcheck()
        .args(["--load", "medium", "me", "app@host", "a.erl"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown naming mode"));
}

#[test]
fn test_malformed_settings_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(".erlcheck.json"), "{ not json").unwrap();

    erlcheck()
        .current_dir(temp_dir.path())
        .arg("a.erl")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("settings"));
}

/// A stand-in for `erlc` that prints a diagnostic and exits with `code`.
#[cfg(unix)]
fn fake_erlc(dir: &Path, code: i32) {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-erlc");
    fs::write(
        &script,
        format!("#!/bin/sh\necho \"fake erlc $*\"\nexit {code}\n"),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    fs::write(
        dir.join(".erlcheck.json"),
        format!(r#"{{ "erlc": "{}" }}"#, script.display()),
    )
    .unwrap();
}

#[cfg(unix)]
#[test]
fn test_exit_status_follows_compiler() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.erl"), "-module(a).\n").unwrap();

    fake_erlc(temp_dir.path(), 0);
    erlcheck()
        .current_dir(temp_dir.path())
        .arg("a.erl")
        .assert()
        .success()
        .stdout(predicate::str::contains("+strong_validation"));

    fake_erlc(temp_dir.path(), 1);
    erlcheck()
        .current_dir(temp_dir.path())
        .args(["--", "a.erl"])
        .assert()
        .code(1);
}
