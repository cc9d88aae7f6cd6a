// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! Static data tables: the default mount catalogue, default device nodes,
//! the namespace-flag mapping, and the host-network bind-mount set. Pure
//! data, no behavior.

use nix::mount::MsFlags;
use nix::sched::CloneFlags;

/// One entry of the default mount catalogue. Order matters: entries mount
/// under previously-mounted entries (e.g. `/dev/pts` mounts under `/dev`).
pub struct DefaultMount {
    pub destination: &'static str,
    pub fstype: &'static str,
    pub flags: MsFlags,
    pub options: Option<&'static str>,
}

pub const DEFAULT_MOUNTS: &[DefaultMount] = &[
    DefaultMount {
        destination: "proc",
        fstype: "proc",
        flags: MsFlags::empty(),
        options: None,
    },
    DefaultMount {
        destination: "dev",
        fstype: "tmpfs",
        flags: MsFlags::from_bits_truncate(MsFlags::MS_NOSUID.bits() | MsFlags::MS_STRICTATIME.bits()),
        options: Some("mode=755,size=65536k"),
    },
    DefaultMount {
        destination: "dev/pts",
        fstype: "devpts",
        flags: MsFlags::from_bits_truncate(MsFlags::MS_NOSUID.bits() | MsFlags::MS_NOEXEC.bits()),
        options: Some("newinstance,ptmxmode=0666,mode=0620,gid=5"),
    },
    DefaultMount {
        destination: "dev/shm",
        fstype: "tmpfs",
        flags: MsFlags::from_bits_truncate(
            MsFlags::MS_NOSUID.bits() | MsFlags::MS_NOEXEC.bits() | MsFlags::MS_NODEV.bits(),
        ),
        options: Some("mode=1777,size=65536k"),
    },
    DefaultMount {
        destination: "dev/mqueue",
        fstype: "mqueue",
        flags: MsFlags::from_bits_truncate(
            MsFlags::MS_NOSUID.bits() | MsFlags::MS_NOEXEC.bits() | MsFlags::MS_NODEV.bits(),
        ),
        options: None,
    },
    DefaultMount {
        destination: "sys",
        fstype: "sysfs",
        flags: MsFlags::from_bits_truncate(
            MsFlags::MS_NOSUID.bits()
                | MsFlags::MS_NOEXEC.bits()
                | MsFlags::MS_NODEV.bits()
                | MsFlags::MS_RDONLY.bits(),
        ),
        options: None,
    },
    DefaultMount {
        destination: "run",
        fstype: "tmpfs",
        flags: MsFlags::from_bits_truncate(
            MsFlags::MS_NOSUID.bits() | MsFlags::MS_NOEXEC.bits() | MsFlags::MS_NODEV.bits(),
        ),
        options: Some("mode=1777,size=65536k"),
    },
];

pub struct DefaultDeviceNode {
    pub name: &'static str,
    pub major: u64,
    pub minor: u64,
}

pub const DEFAULT_DEVICE_NODES: &[DefaultDeviceNode] = &[
    DefaultDeviceNode { name: "null", major: 1, minor: 3 },
    DefaultDeviceNode { name: "zero", major: 1, minor: 5 },
    DefaultDeviceNode { name: "full", major: 1, minor: 7 },
    DefaultDeviceNode { name: "tty", major: 5, minor: 0 },
    DefaultDeviceNode { name: "random", major: 1, minor: 8 },
    DefaultDeviceNode { name: "urandom", major: 1, minor: 9 },
];

pub const DEFAULT_DEVICE_NODE_MODE: u32 = 0o666;

pub const LOOP_CONTROL_MAJOR: u64 = 10;
pub const LOOP_CONTROL_MINOR: u64 = 237;
pub const LOOP_DEVICE_MODE: u32 = 0o660;
pub const LOOP_DEVICE_MAJOR: u64 = 7;

/// The fixed hostname every container gets, regardless of what the caller
/// passes as a virtual hostname for the interactive shell prompt.
pub const CONTAINER_HOSTNAME: &str = "localhost";

/// One namespace kind this runtime knows how to unshare into, paired with
/// its `clone(2)` flag and the name under which its presence can be probed
/// via `/proc/self/ns/<name>`.
pub struct NamespaceKind {
    pub proc_name: &'static str,
    pub flag: CloneFlags,
}

pub const PID_NAMESPACE: NamespaceKind = NamespaceKind { proc_name: "pid", flag: CloneFlags::CLONE_NEWPID };

pub const NON_PID_NAMESPACES: &[NamespaceKind] = &[
    NamespaceKind { proc_name: "cgroup", flag: CloneFlags::CLONE_NEWCGROUP },
    NamespaceKind { proc_name: "ipc", flag: CloneFlags::CLONE_NEWIPC },
    NamespaceKind { proc_name: "uts", flag: CloneFlags::CLONE_NEWUTS },
    NamespaceKind { proc_name: "mnt", flag: CloneFlags::CLONE_NEWNS },
];

pub const NETWORK_NAMESPACE: NamespaceKind = NamespaceKind { proc_name: "net", flag: CloneFlags::CLONE_NEWNET };

/// Bind mounts added automatically unless the caller asked for network
/// isolation: `(source, destination, readonly)`.
pub const HOST_NETWORK_BIND_MOUNTS: &[(&str, &str, bool)] =
    &[("/etc/resolv.conf", "etc/resolv.conf", true)];
