// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! Thin wrappers over the kernel primitives the rest of the crate is built
//! from: mounting, namespace unsharing/entering, the root pivot, and the two
//! calls (`clone`'s fork half and `getpid`) that have to bypass libc's
//! process-identity caching because we call them around namespace switches
//! libc doesn't know happened.

use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::sched::{setns, unshare, CloneFlags};
use nix::unistd::{chdir, chroot, fork, pivot_root as nix_pivot_root, ForkResult, Pid};

use crate::error::{CoreError, Result};

pub fn mount_fs(
    source: Option<&Path>,
    target: &Path,
    fstype: Option<&str>,
    flags: MsFlags,
    options: Option<&str>,
) -> Result<()> {
    mount(source, target, fstype, flags, options).map_err(|e| CoreError::os("mount", e))
}

pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    mount_fs(Some(source), target, None, MsFlags::MS_BIND, None)
}

pub fn remount_readonly(target: &Path) -> Result<()> {
    mount_fs(
        None,
        target,
        None,
        MsFlags::MS_REMOUNT | MsFlags::MS_BIND | MsFlags::MS_RDONLY,
        None,
    )
}

pub fn umount_detach(target: &Path) -> Result<()> {
    umount2(target, MntFlags::MNT_DETACH).map_err(|e| CoreError::os("umount2", e))
}

/// Tries a plain unmount first; falls back to a lazy detach and logs a
/// warning. Never returns an error: a stuck mount at teardown must not stop
/// the rest of the teardown from proceeding.
pub fn umount_best_effort(target: &Path) {
    if nix::mount::umount(target).is_err() {
        tracing::warn!(path = %target.display(), "umount failed, detaching instead");
        if let Err(e) = umount_detach(target) {
            tracing::warn!(path = %target.display(), error = %e, "detach unmount also failed");
        }
    }
}

pub fn unshare_namespaces(flags: CloneFlags) -> Result<()> {
    unshare(flags).map_err(|e| CoreError::os("unshare", e))
}

pub fn setns_fd(fd: RawFd, ns: CloneFlags) -> Result<()> {
    setns(fd, ns).map_err(|e| CoreError::os("setns", e))
}

pub fn pivot_root(new_root: &Path, put_old: &Path) -> Result<()> {
    nix_pivot_root(new_root, put_old).map_err(|e| CoreError::os("pivot_root", e))
}

pub fn chdir_to(path: &Path) -> Result<()> {
    chdir(path).map_err(|e| CoreError::os("chdir", e))
}

pub fn chroot_to(path: &Path) -> Result<()> {
    chroot(path).map_err(|e| CoreError::os("chroot", e))
}

pub enum ForkOutcome {
    Parent(Pid),
    Child,
}

pub fn fork_process() -> Result<ForkOutcome> {
    match unsafe { fork() }.map_err(|e| CoreError::os("fork", e))? {
        ForkResult::Parent { child } => Ok(ForkOutcome::Parent(child)),
        ForkResult::Child => Ok(ForkOutcome::Child),
    }
}

/// Raw `getpid(2)`, bypassing libc's cached pid. Needed because PID1's
/// sanity check runs immediately after a PID-namespace-affecting fork, a
/// transition libc's caching layer does not know to invalidate.
pub fn raw_getpid() -> i32 {
    unsafe { libc::syscall(libc::SYS_getpid) as i32 }
}

/// Parses `/proc/self/mounts`, undoing the octal-escape encoding the kernel
/// uses for whitespace and backslashes in paths, and returns the set of
/// currently mounted destination paths.
pub fn mount_points() -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string("/proc/self/mounts")
        .map_err(|e| CoreError::io("/proc/self/mounts", e))?;
    Ok(text
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(unescape_octal)
        .map(PathBuf::from)
        .collect())
}

pub fn is_mount_point(path: &Path) -> Result<bool> {
    let canonical = path
        .canonicalize()
        .map_err(|e| CoreError::io(path, e))?;
    Ok(mount_points()?.contains(&canonical))
}

fn unescape_octal(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Ok(value) = u8::from_str_radix(
                std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or_default(),
                8,
            ) {
                out.push(value as char);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

/// Creates a character or block device node at `/dev/<name>`, then chmods it
/// separately: `mknod` honors the calling process's umask, so the requested
/// mode has to be applied afterward.
pub fn mknod_dev(
    dev_dir: &Path,
    name: &str,
    major: u64,
    minor: u64,
    mode: u32,
    block: bool,
) -> Result<()> {
    use nix::sys::stat::{makedev, mknod, Mode, SFlag};

    let path = dev_dir.join(name);
    let kind = if block { SFlag::S_IFBLK } else { SFlag::S_IFCHR };
    mknod(&path, kind, Mode::empty(), makedev(major, minor)).map_err(|e| CoreError::os("mknod", e))?;
    std::fs::set_permissions(&path, std::os::unix::fs::PermissionsExt::from_mode(mode))
        .map_err(|e| CoreError::io(&path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_octal_roundtrips_space() {
        assert_eq!(unescape_octal(r"/mnt/a\040b"), "/mnt/a b");
    }

    #[test]
    fn unescape_octal_passes_through_plain_paths() {
        assert_eq!(unescape_octal("/proc"), "/proc");
    }
}
