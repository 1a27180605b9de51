// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn populated_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("alpha.txt"), b"a").unwrap();
    fs::write(dir.path().join("beta.txt"), b"b").unwrap();
    fs::create_dir(dir.path().join("gamma")).unwrap();
    dir
}

fn lsdents() -> Command {
    Command::cargo_bin("lsdents").unwrap()
}

#[test]
fn lists_directory() {
    let dir = populated_dir();

    lsdents()
        .arg("--reader")
        .arg("local")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(" openat(AT_FDCWD, \""))
        .stdout(predicate::str::contains("O_RDONLY|O_DIRECTORY|O_CLOEXEC) = "))
        .stdout(predicate::str::contains(" getdents64("))
        .stdout(predicate::str::contains("d_name=\"alpha.txt\""))
        .stdout(predicate::str::contains("d_name=\"beta.txt\""))
        .stdout(predicate::str::contains("d_type=DT_DIR, d_name=\"gamma\""))
        .stdout(predicate::str::contains("d_type=DT_REG"))
        .stdout(predicate::str::ends_with(", 32768) = 0 (bytes)\n"));
}

#[test]
fn reads_buffer_through_process_vm_readv() {
    let dir = populated_dir();

    lsdents()
        .args(["--reader", "vm", "--buffer-size", "64"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("d_name=\".\""))
        .stdout(predicate::str::contains("d_name=\"alpha.txt\""))
        .stdout(predicate::str::contains("d_name=\"beta.txt\""))
        .stdout(predicate::str::contains("d_type=DT_DIR, d_name=\"gamma\""))
        .stdout(predicate::str::contains("...").not())
        .stdout(predicate::str::ends_with(", 64) = 0 (bytes)\n"));
}

#[test]
fn compact_counts_entries() {
    let dir = populated_dir();

    // ".", "..", and the three created entries.
    lsdents()
        .args(["--reader", "local", "--verbosity", "compact"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(" /* 5 entries */, 32768) = "))
        .stdout(predicate::str::contains("d_name=").not());
}

#[test]
fn small_buffer_needs_several_calls() {
    let dir = populated_dir();

    let assert = lsdents()
        .args(["--reader", "local", "--buffer-size", "48"])
        .arg(dir.path())
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.matches(" getdents64(").count() > 2, "{stdout}");
    assert!(stdout.contains("d_name=\"alpha.txt\""), "{stdout}");
}

#[test]
fn raw_constants() {
    let dir = populated_dir();

    lsdents()
        .args(["--reader", "local", "--xlat", "raw"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("d_type=0x4, d_name=\"gamma\""))
        .stdout(predicate::str::contains("DT_").not());
}

#[cfg(target_arch = "x86_64")]
#[test]
fn legacy_getdents() {
    let dir = populated_dir();

    lsdents()
        .args(["--reader", "local", "--legacy"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(" getdents("))
        .stdout(predicate::str::contains("d_name=\"gamma\", d_type=DT_DIR"));
}

#[test]
fn missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();

    lsdents()
        .arg(dir.path().join("nope"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("= -1 ENOENT (No such file or directory)"));
}
