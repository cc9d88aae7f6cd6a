// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! End-to-end tests of the `furnace` binary. These exercise real
//! namespace creation, `pivot_root`, and device node creation, so they
//! need `CAP_SYS_ADMIN`/`CAP_MKNOD` (in practice, real root) and are
//! marked `#[ignore]`; run explicitly with `cargo test -- --ignored` as
//! root against a populated root filesystem directory.

use std::path::Path;
use std::process::Command;

fn furnace() -> Command {
    Command::new(env!("CARGO_BIN_EXE_furnace"))
}

fn require_rootfs() -> String {
    std::env::var("FURNACE_TEST_ROOTFS")
        .expect("set FURNACE_TEST_ROOTFS to a populated root filesystem directory to run this test")
}

#[test]
#[ignore = "needs real root and a populated rootfs directory (FURNACE_TEST_ROOTFS)"]
fn exit_code_is_propagated() {
    let rootfs = require_rootfs();
    let status = furnace()
        .args([rootfs.as_str(), "--persistent", "--", "sh", "-c", "exit 42"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(42));
}

#[test]
#[ignore = "needs real root and a populated rootfs directory (FURNACE_TEST_ROOTFS)"]
fn process_tree_is_small() {
    let rootfs = require_rootfs();
    let output = furnace()
        .args([rootfs.as_str(), "--persistent", "--", "ps", "-e", "--no-headers"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let line_count = String::from_utf8_lossy(&output.stdout).lines().count();
    assert!(line_count <= 3, "expected at most 3 processes inside the container, saw {line_count}");
}

#[test]
#[ignore = "needs real root and a populated rootfs directory (FURNACE_TEST_ROOTFS)"]
fn rootfs_is_not_visible_as_a_mount_point_from_outside() {
    let rootfs = require_rootfs();
    let status = furnace()
        .args([rootfs.as_str(), "--persistent", "--", "true"])
        .status()
        .unwrap();
    assert!(status.success());
    let mounts = std::fs::read_to_string("/proc/mounts").unwrap();
    assert!(
        !mounts.lines().any(|line| line.split(' ').nth(1) == Some(rootfs.as_str())),
        "root directory leaked out as a host mount point"
    );
}

#[test]
#[ignore = "needs real root and a populated rootfs directory (FURNACE_TEST_ROOTFS)"]
fn bind_mounted_file_is_visible_inside_and_changes_persist_outside() {
    let rootfs = require_rootfs();
    let host_dir = tempfile::tempdir().unwrap();
    std::fs::write(host_dir.path().join("greeting"), b"hello").unwrap();

    let volume_spec = format!("{}:/mnt/host:rw", host_dir.path().display());
    let status = furnace()
        .args([
            rootfs.as_str(),
            "--persistent",
            "--volume",
            &volume_spec,
            "--",
            "sh",
            "-c",
            "echo world >> /mnt/host/greeting",
        ])
        .status()
        .unwrap();
    assert!(status.success());

    let contents = std::fs::read_to_string(host_dir.path().join("greeting")).unwrap();
    assert_eq!(contents, "hello\nworld\n");
}

#[test]
#[ignore = "needs real root and a populated rootfs directory (FURNACE_TEST_ROOTFS)"]
fn readonly_volume_rejects_writes() {
    let rootfs = require_rootfs();
    let host_dir = tempfile::tempdir().unwrap();
    std::fs::write(host_dir.path().join("greeting"), b"hello").unwrap();

    let volume_spec = format!("{}:/mnt/host:ro", host_dir.path().display());
    let status = furnace()
        .args([
            rootfs.as_str(),
            "--persistent",
            "--volume",
            &volume_spec,
            "--",
            "sh",
            "-c",
            "echo nope >> /mnt/host/greeting",
        ])
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
#[ignore = "needs real root and a populated rootfs directory (FURNACE_TEST_ROOTFS)"]
fn networking_isolated_shows_only_loopback() {
    let rootfs = require_rootfs();
    let output = furnace()
        .args([rootfs.as_str(), "--persistent", "--isolate-networking", "--", "ip", "address", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let interface_count = stdout.lines().filter(|l| l.chars().next().is_some_and(|c| c.is_ascii_digit())).count();
    assert_eq!(interface_count, 1, "only the loopback interface should be present");
}

#[test]
#[ignore = "needs real root and a populated rootfs directory (FURNACE_TEST_ROOTFS)"]
fn host_network_bind_mounts_resolv_conf_readonly_when_not_isolated() {
    let rootfs = require_rootfs();
    let host_resolv_conf = std::fs::read(Path::new("/etc/resolv.conf")).unwrap();

    let output = furnace()
        .args([rootfs.as_str(), "--persistent", "--", "cat", "/etc/resolv.conf"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout, host_resolv_conf);

    let status = furnace()
        .args([rootfs.as_str(), "--persistent", "--", "sh", "-c", "echo x >> /etc/resolv.conf"])
        .status()
        .unwrap();
    assert!(!status.success(), "resolv.conf must be readonly inside the container");
}
