// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! The mount-scope component: an RAII guard around an established mount
//! point, and a small tagged enum describing how to establish one (bind,
//! overlay, or a generic fstype+flags+options mount).

use std::path::{Path, PathBuf};

use nix::mount::MsFlags;

use crate::error::Result;
use crate::sys;

/// Unmounts its destination on drop. The release path never raises: if a
/// plain unmount fails, it falls back to a lazy detach and logs a warning,
/// matching the rest of this crate's policy of never letting teardown fail
/// the caller.
#[must_use]
pub struct MountGuard {
    destination: Option<PathBuf>,
}

impl MountGuard {
    fn new(destination: PathBuf) -> Self {
        Self { destination: Some(destination) }
    }

    /// Forgets this mount point without unmounting it, for mounts that will
    /// be torn down transitively by an ancestor's recursive unmount.
    pub fn leak(mut self) {
        self.destination = None;
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        if let Some(destination) = self.destination.take() {
            sys::umount_best_effort(&destination);
        }
    }
}

pub enum MountSpec<'a> {
    Bind { source: &'a Path, readonly: bool },
    Overlay { lower_dirs: &'a [PathBuf], upper_dir: &'a Path, work_dir: &'a Path },
    Generic { fstype: &'a str, flags: MsFlags, options: Option<&'a str> },
}

impl<'a> MountSpec<'a> {
    pub fn acquire(&self, destination: &Path) -> Result<MountGuard> {
        match self {
            MountSpec::Bind { source, readonly } => {
                sys::bind_mount(source, destination)?;
                if *readonly {
                    sys::remount_readonly(destination)?;
                }
            }
            MountSpec::Overlay { lower_dirs, upper_dir, work_dir } => {
                let options = overlay_options(lower_dirs, upper_dir, work_dir);
                sys::mount_fs(None, destination, Some("overlay"), MsFlags::empty(), Some(&options))?;
            }
            MountSpec::Generic { fstype, flags, options } => {
                sys::mount_fs(None, destination, Some(fstype), *flags, options.as_deref())?;
            }
        }
        Ok(MountGuard::new(destination.to_path_buf()))
    }
}

fn overlay_options(lower_dirs: &[PathBuf], upper_dir: &Path, work_dir: &Path) -> String {
    let lowerdir = lower_dirs
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":");
    format!(
        "lowerdir={lowerdir},upperdir={upperdir},workdir={workdir}",
        lowerdir = lowerdir,
        upperdir = upper_dir.display(),
        workdir = work_dir.display(),
    )
}

/// Ensures a bind mount's destination exists before mounting: a file source
/// gets a touched, zero-length destination file (removing a stale symlink
/// first); anything else gets a directory. Parent directories are created
/// as needed.
pub fn create_mount_target(source: &Path, destination: &Path) -> Result<()> {
    if source.is_file() {
        if destination.is_symlink() {
            std::fs::remove_file(destination).map_err(|e| crate::error::CoreError::io(destination, e))?;
        }
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| crate::error::CoreError::io(parent, e))?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(destination)
            .map_err(|e| crate::error::CoreError::io(destination, e))?;
    } else {
        std::fs::create_dir_all(destination).map_err(|e| crate::error::CoreError::io(destination, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_options_join_lowerdirs_with_colon() {
        let lowers = vec![PathBuf::from("/a"), PathBuf::from("/b")];
        let options = overlay_options(&lowers, Path::new("/up"), Path::new("/work"));
        assert_eq!(options, "lowerdir=/a:/b,upperdir=/up,workdir=/work");
    }

    #[test]
    fn create_mount_target_for_file_source_touches_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("src_file");
        std::fs::write(&source, b"hi").unwrap();
        let destination = tmp.path().join("nested").join("dst_file");
        create_mount_target(&source, &destination).unwrap();
        assert!(destination.is_file());
        assert_eq!(std::fs::metadata(&destination).unwrap().len(), 0);
    }

    #[test]
    fn create_mount_target_for_dir_source_makes_destination_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("src_dir");
        std::fs::create_dir(&source).unwrap();
        let destination = tmp.path().join("nested").join("dst_dir");
        create_mount_target(&source, &destination).unwrap();
        assert!(destination.is_dir());
    }

    fn ensure_no_mount_under(dir: &Path) -> std::io::Result<()> {
        for line in std::fs::read_to_string("/proc/mounts")?.lines() {
            let mount_point = Path::new(line.split(' ').nth(1).expect("malformed /proc/mounts line"));
            assert!(
                !mount_point.starts_with(dir),
                "mount {} left behind under {}",
                mount_point.display(),
                dir.display()
            );
        }
        Ok(())
    }

    #[test]
    fn bind_mount_round_trips_and_unmounts_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("marker"), b"hi").unwrap();
        let destination = tmp.path().join("destination");
        std::fs::create_dir(&destination).unwrap();

        let guard = MountSpec::Bind { source: &source, readonly: false }
            .acquire(&destination)
            .expect("bind mount should succeed under an unprivileged mount namespace");
        assert!(destination.join("marker").is_file());

        drop(guard);
        ensure_no_mount_under(&destination).unwrap();
    }

    #[test]
    fn readonly_bind_mount_rejects_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        std::fs::create_dir(&source).unwrap();
        let destination = tmp.path().join("destination");
        std::fs::create_dir(&destination).unwrap();

        let _guard = MountSpec::Bind { source: &source, readonly: true }
            .acquire(&destination)
            .expect("readonly bind mount should succeed");
        let result = std::fs::write(destination.join("should_fail"), b"nope");
        assert!(result.is_err());
    }

    #[test]
    fn overlay_mount_round_trips_and_unmounts_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let lower = tmp.path().join("lower");
        let upper = tmp.path().join("upper");
        let work = tmp.path().join("work");
        let mount_point = tmp.path().join("merged");
        for dir in [&lower, &upper, &work, &mount_point] {
            std::fs::create_dir(dir).unwrap();
        }
        std::fs::write(lower.join("from_lower"), b"hi").unwrap();

        let lower_dirs = vec![lower.clone()];
        let guard = MountSpec::Overlay { lower_dirs: &lower_dirs, upper_dir: &upper, work_dir: &work }
            .acquire(&mount_point)
            .expect("overlay mount should succeed under an unprivileged mount namespace");
        assert!(mount_point.join("from_lower").is_file());
        std::fs::write(mount_point.join("new_file"), b"written").unwrap();
        assert!(upper.join("new_file").is_file());

        drop(guard);
        ensure_no_mount_under(&mount_point).unwrap();
    }
}
