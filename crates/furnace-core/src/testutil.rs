// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! Test-only support for running this crate's unit tests inside a fresh
//! mount namespace, so mount/bind-mount tests can run as an unprivileged
//! user in CI the same way they would with real root.

use nix::errno::Errno;
use nix::mount::{mount, MsFlags};
use nix::sched::{unshare, CloneFlags};
use nix::unistd::{getgid, getuid};

fn enter_unprivileged_user_namespace() {
    let uid = getuid();
    let gid = getgid();
    unshare(CloneFlags::CLONE_NEWUSER).expect("failed to create an unprivileged user namespace");
    std::fs::write("/proc/self/setgroups", "deny").expect("writing /proc/self/setgroups");
    std::fs::write("/proc/self/uid_map", format!("0 {uid} 1\n")).expect("writing /proc/self/uid_map");
    std::fs::write("/proc/self/gid_map", format!("0 {gid} 1\n")).expect("writing /proc/self/gid_map");
}

pub extern "C" fn ctor_enter_mount_namespace() {
    match unshare(CloneFlags::CLONE_NEWNS) {
        Err(Errno::EPERM) => {
            enter_unprivileged_user_namespace();
            unshare(CloneFlags::CLONE_NEWNS).expect("failed to enter a mount namespace");
        }
        other => other.expect("failed to enter a mount namespace"),
    }
    mount(
        Some(""),
        "/",
        Some(""),
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        Some(""),
    )
    .expect("failed to remount file systems as private");
}
