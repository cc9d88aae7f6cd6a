// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! The re-entry facade: lets the supervisor run further commands inside an
//! already-running container. Holds two sets of namespace file descriptors
//! (the caller's own, and the container's) opened once at container start,
//! since re-opening `/proc/<pid>/ns/<kind>` can fail once the mount
//! namespace has already changed.

use std::fs::File;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use nix::sched::CloneFlags;
use nix::unistd::Pid;

use crate::catalog::{NETWORK_NAMESPACE, NON_PID_NAMESPACES, PID_NAMESPACE};
use crate::error::{CoreError, Result};
use crate::sys;

struct NamespaceFds {
    original_pid: File,
    container_pid: File,
    /// `(original fd, container fd, clone flag)` for every non-PID
    /// namespace this runtime manages.
    others: Vec<(File, File, CloneFlags)>,
}

/// Re-entry handle into a running container's namespaces.
pub struct ReentryFacade {
    container_pid: Pid,
    fds: NamespaceFds,
}

impl ReentryFacade {
    pub fn open(container_pid: Pid) -> Result<Self> {
        let original_pid = open_ns("self", PID_NAMESPACE.proc_name)?;
        let container_pid_fd = open_ns(&container_pid.to_string(), PID_NAMESPACE.proc_name)?;

        // Every non-PID namespace is opened and entered unconditionally,
        // net included: when networking isn't isolated the container
        // shares the host's net namespace anyway, so entering it is a
        // no-op, but when it is isolated this is the only thing that makes
        // `status()` observe it.
        let mut others = Vec::with_capacity(NON_PID_NAMESPACES.len() + 1);
        for ns in NON_PID_NAMESPACES.iter().chain(std::iter::once(&NETWORK_NAMESPACE)) {
            let orig = open_ns("self", ns.proc_name)?;
            let theirs = open_ns(&container_pid.to_string(), ns.proc_name)?;
            others.push((orig, theirs, ns.flag));
        }

        Ok(Self {
            container_pid,
            fds: NamespaceFds { original_pid, container_pid: container_pid_fd, others },
        })
    }

    pub fn container_pid(&self) -> Pid {
        self.container_pid
    }

    /// Runs `command` inside the container and waits for it, the way
    /// [`std::process::Command::status`] does outside one.
    pub fn status(&self, command: &mut Command) -> Result<ExitStatus> {
        self.enter_pid_namespace()?;

        let other_fds: Vec<(RawFd, CloneFlags)> =
            self.fds.others.iter().map(|(_, theirs, flag)| (theirs.as_raw_fd(), *flag)).collect();
        // SAFETY: runs in the forked child between fork and exec; setns and
        // the raw fd reads below are async-signal-safe.
        unsafe {
            command.pre_exec(move || {
                for (fd, flag) in &other_fds {
                    nix::sched::setns(*fd, *flag)
                        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                }
                Ok(())
            });
        }

        let spawn_result = command
            .spawn()
            .map_err(|e| CoreError::io(command.get_program().to_string_lossy().as_ref(), e));
        // The PID namespace of the calling thread only affects the next
        // fork's children, so it must be restored right after spawning,
        // not after the child exits.
        self.restore_pid_namespace()?;

        crate::process::wait_with_signal_forwarding(spawn_result?)
    }

    /// Same as [`ReentryFacade::status`] but inherits stdio and is meant
    /// for interactive use; kept distinct so callers don't have to guess
    /// whether output was captured.
    pub fn spawn_interactive(&self, command: &mut Command) -> Result<ExitStatus> {
        command.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
        self.status(command)
    }

    fn enter_pid_namespace(&self) -> Result<()> {
        sys::setns_fd(self.fds.container_pid.as_raw_fd(), PID_NAMESPACE.flag)
    }

    fn restore_pid_namespace(&self) -> Result<()> {
        sys::setns_fd(self.fds.original_pid.as_raw_fd(), PID_NAMESPACE.flag)
    }

    pub fn interactive_shell(&self, virtual_hostname: &str) -> Result<ExitStatus> {
        let mut cmd = Command::new("bash");
        cmd.args(["--norc", "--noprofile", "-i"]);
        cmd.env_clear();
        cmd.env(
            "PS1",
            format!("furnace-debug@{virtual_hostname} \u{1b}[32m\\w\u{1b}[0m # "),
        );
        self.spawn_interactive(&mut cmd)
    }
}

fn open_ns(pid_component: &str, ns_name: &str) -> Result<File> {
    let path = Path::new("/proc").join(pid_component).join("ns").join(ns_name);
    File::open(&path).map_err(|e| CoreError::io(path, e))
}

/// Translates a process exit status into a shell-style exit code: the exit
/// code itself on a normal exit, `128 + signal` on a signal death.
pub fn status_to_exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        code
    } else if let Some(signal) = status.signal() {
        128 + signal
    } else {
        unreachable!("process exit status is neither an exit code nor a signal")
    }
}
