// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! The PID1 routine: the ordered sequence of steps that turns a freshly
//! forked, about-to-be-reexec'd process into the container's init. Driven
//! by the `furnace-pid1` binary, which deserializes [`Pid1Params`] from
//! `argv[1]` and calls [`run`].

use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use nix::mount::MsFlags;
use nix::sched::CloneFlags;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::{read, sethostname, setsid, write};
use serde::{Deserialize, Serialize};

use crate::catalog::{
    CONTAINER_HOSTNAME, DEFAULT_DEVICE_NODES, DEFAULT_DEVICE_NODE_MODE, DEFAULT_MOUNTS,
    LOOP_CONTROL_MAJOR, LOOP_CONTROL_MINOR, LOOP_DEVICE_MAJOR, LOOP_DEVICE_MODE, NON_PID_NAMESPACES,
    NETWORK_NAMESPACE,
};
use crate::config::BindMount;
use crate::error::{CoreError, Result};
use crate::mount::create_mount_target;
use crate::sys;

pub const READY_TOKEN: &[u8; 3] = b"RDY";

/// Wire configuration passed to the re-exec'd PID1 binary as a single JSON
/// argument.
#[derive(Debug, Serialize, Deserialize)]
pub struct Pid1Params {
    pub root_dir: PathBuf,
    pub control_read: RawFd,
    pub control_write: RawFd,
    pub isolate_networking: bool,
    pub bind_mounts: Vec<BindMount>,
}

struct LoopDevice {
    name: String,
    minor: u64,
}

/// True for names matching `loop[0-9]+`, the glob the original enumeration
/// used (`Path('/dev').glob('loop[0-9]*')`).
fn is_loop_device_name(name: &str) -> bool {
    match name.strip_prefix("loop") {
        Some(rest) if !rest.is_empty() => rest.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Enumerates host loop devices by `major == 7` block device nodes under
/// `/dev`. Must run before [`create_namespaces`]: once the mount namespace
/// is unshared and root is pivoted, the host's `/dev` is no longer visible.
fn enumerate_loop_devices() -> Result<Vec<LoopDevice>> {
    use nix::sys::stat::{major, stat};

    let mut devices = Vec::new();
    let dev_dir = Path::new("/dev");
    let entries = std::fs::read_dir(dev_dir).map_err(|e| CoreError::io(dev_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::io(dev_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_loop_device_name(&name) {
            continue;
        }
        let path = entry.path();
        let st = stat(&path).map_err(|e| CoreError::os("stat", e))?;
        let rdev = st.st_rdev;
        if major(rdev) == LOOP_DEVICE_MAJOR {
            devices.push(LoopDevice { name, minor: nix::sys::stat::minor(rdev) });
        }
    }
    Ok(devices)
}

fn enable_zombie_reaping() -> Result<()> {
    // We are PID 1 so orphans reparent to us; ignoring SIGCHLD tells the
    // kernel to reap automatically instead of leaving zombies for a waitpid
    // we will never call.
    unsafe { signal(Signal::SIGCHLD, SigHandler::SigIgn) }.map_err(|e| CoreError::os("signal", e))?;
    Ok(())
}

fn create_namespaces(isolate_networking: bool) -> Result<()> {
    let mut flags = CloneFlags::empty();
    for ns in NON_PID_NAMESPACES {
        if Path::new("/proc/self/ns").join(ns.proc_name).exists() {
            flags |= ns.flag;
        } else {
            tracing::warn!(namespace = ns.proc_name, "namespace type not supported on this system");
        }
    }
    if isolate_networking {
        if Path::new("/proc/self/ns").join(NETWORK_NAMESPACE.proc_name).exists() {
            flags |= NETWORK_NAMESPACE.flag;
        } else {
            tracing::warn!("network namespace not supported on this system");
        }
    }
    sys::unshare_namespaces(flags)
}

fn create_bind_mounts(root_dir: &Path, bind_mounts: &[BindMount]) -> Result<()> {
    for bm in bind_mounts {
        let destination = root_dir.join(bm.relative_destination());
        create_mount_target(&bm.source, &destination)?;
        sys::bind_mount(&bm.source, &destination)?;
        if bm.readonly {
            // A readonly bind mount cannot be established atomically; the
            // kernel requires a second MS_REMOUNT pass.
            sys::remount_readonly(&destination)?;
        }
    }
    Ok(())
}

fn setup_root_mount(root_dir: &Path, bind_mounts: &[BindMount]) -> Result<()> {
    // MS_SLAVE lets host mount events propagate in without letting
    // in-container mounts leak back out to the host.
    sys::mount_fs(
        Some(Path::new("")),
        Path::new("/"),
        Some(""),
        MsFlags::MS_REC | MsFlags::MS_SLAVE,
        Some(""),
    )?;
    create_bind_mounts(root_dir, bind_mounts)?;
    if !sys::is_mount_point(root_dir)? {
        sys::bind_mount(root_dir, root_dir)?;
    }
    let old_root = root_dir.join("old_root");
    std::fs::create_dir_all(&old_root).map_err(|e| CoreError::io(&old_root, e))?;
    sys::chdir_to(root_dir)?;
    sys::pivot_root(Path::new("."), Path::new("old_root"))?;
    sys::chroot_to(Path::new("."))?;
    Ok(())
}

fn mount_defaults() -> Result<()> {
    for m in DEFAULT_MOUNTS {
        let destination = Path::new("/").join(m.destination);
        std::fs::create_dir_all(&destination).map_err(|e| CoreError::io(&destination, e))?;
        sys::mount_fs(None, &destination, Some(m.fstype), m.flags, m.options)?;
    }
    Ok(())
}

fn create_device_node(name: &str, major: u64, minor: u64, mode: u32, block: bool) -> Result<()> {
    sys::mknod_dev(Path::new("/dev"), name, major, minor, mode, block)
}

fn create_default_dev_nodes() -> Result<()> {
    for d in DEFAULT_DEVICE_NODES {
        create_device_node(d.name, d.major, d.minor, DEFAULT_DEVICE_NODE_MODE, false)?;
    }
    Ok(())
}

fn create_loop_devices(loop_devices: &[LoopDevice]) -> Result<()> {
    create_device_node("loop-control", LOOP_CONTROL_MAJOR, LOOP_CONTROL_MINOR, LOOP_DEVICE_MODE, false)?;
    for loop_dev in loop_devices {
        create_device_node(&loop_dev.name, LOOP_DEVICE_MAJOR, loop_dev.minor, LOOP_DEVICE_MODE, true)?;
    }
    Ok(())
}

/// Runs `systemd-tmpfiles --create --prefix <dst>` for every tmpfs mount in
/// the catalogue, matching the original's behavior of populating
/// `/run/lock`, `/tmp`, etc. If the binary is missing, logs a warning and
/// moves on instead of failing startup.
fn create_tmpfs_dirs() -> Result<()> {
    if !Path::new("/bin/systemd-tmpfiles").exists() {
        tracing::warn!("systemd-tmpfiles not present; /tmp and /run will not be populated");
        return Ok(());
    }
    for m in DEFAULT_MOUNTS {
        if m.fstype != "tmpfs" {
            continue;
        }
        let destination = Path::new("/").join(m.destination);
        let output = std::process::Command::new("/bin/systemd-tmpfiles")
            .arg("--create")
            .arg("--prefix")
            .arg(&destination)
            .output()
            .map_err(|e| CoreError::io("/bin/systemd-tmpfiles", e))?;
        if !output.stdout.is_empty() || !output.stderr.is_empty() {
            tracing::debug!(
                stdout = %String::from_utf8_lossy(&output.stdout),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "systemd-tmpfiles output"
            );
        }
    }
    Ok(())
}

fn umount_old_root() -> Result<()> {
    let old_root = Path::new("/old_root");
    sys::umount_detach(old_root)?;
    std::fs::remove_dir(old_root).map_err(|e| CoreError::io(old_root, e))?;
    Ok(())
}

/// Runs the full PID1 protocol: namespace creation, the root pivot, the
/// default mount/device catalogue, the loop-device table, tmpfs
/// population, old-root teardown, hostname assignment, and finally the
/// ready handshake over the control pipe. Blocks until the control pipe is
/// closed (normal teardown) or a byte arrives (never sent in practice, but
/// harmless either way), then returns.
pub fn run(params: Pid1Params) -> Result<i32> {
    if sys::raw_getpid() != 1 {
        return Err(CoreError::InvariantViolation(
            "not actually running as PID 1, refusing to continue".to_string(),
        ));
    }

    let loop_devices = enumerate_loop_devices()?;

    setsid().map_err(|e| CoreError::os("setsid", e))?;
    enable_zombie_reaping()?;
    create_namespaces(params.isolate_networking)?;
    setup_root_mount(&params.root_dir, &params.bind_mounts)?;
    mount_defaults()?;
    create_default_dev_nodes()?;
    create_loop_devices(&loop_devices)?;
    create_tmpfs_dirs()?;
    umount_old_root()?;
    sethostname(CONTAINER_HOSTNAME).map_err(|e| CoreError::os("sethostname", e))?;

    write(params.control_write, READY_TOKEN).map_err(|e| CoreError::os("write", e))?;
    tracing::debug!("container started");

    let mut buf = [0u8; 1];
    let _ = read(params.control_read, &mut buf);
    tracing::debug!("control pipe closed, stopping");

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_loop_device_names() {
        assert!(is_loop_device_name("loop0"));
        assert!(is_loop_device_name("loop12"));
        assert!(!is_loop_device_name("loop"));
        assert!(!is_loop_device_name("loop-control"));
        assert!(!is_loop_device_name("sda1"));
    }

    #[test]
    fn pid1_params_round_trip_through_json() {
        let params = Pid1Params {
            root_dir: PathBuf::from("/var/lib/furnace/root"),
            control_read: 7,
            control_write: 8,
            isolate_networking: true,
            bind_mounts: vec![BindMount::new("/src", "/dst", true)],
        };
        let json = serde_json::to_string(&params).unwrap();
        let round_tripped: Pid1Params = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped.root_dir, params.root_dir);
        assert_eq!(round_tripped.control_read, params.control_read);
        assert_eq!(round_tripped.isolate_networking, params.isolate_networking);
        assert_eq!(round_tripped.bind_mounts.len(), 1);
    }
}
