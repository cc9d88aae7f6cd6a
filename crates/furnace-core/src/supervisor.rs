// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! The PID1 supervisor: owns the container's init process for its whole
//! lifetime. Starting one unshares a PID namespace on the calling thread
//! (affecting only the next fork's children), forks, re-execs the child
//! into the `furnace-pid1` binary, restores the parent's own PID
//! namespace, and blocks for the ready handshake. Dropping one sends
//! `SIGKILL` to PID1, which takes the whole container's process tree with
//! it.

use std::fs::File;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

use nix::sched::CloneFlags;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{close, pipe, read, waitpid, Pid};

use crate::config::ContainerConfig;
use crate::error::{CoreError, Result};
use crate::pid1::{Pid1Params, READY_TOKEN};
use crate::sys::{self, ForkOutcome};

pub struct Pid1Supervisor {
    pid: Pid,
    shutdown_write: Option<RawFd>,
}

impl Pid1Supervisor {
    /// Starts the container's PID1. `pid1_exe` is the path to the
    /// `furnace-pid1` binary; the caller locates it (typically as a sibling
    /// of its own executable) because the supervisor has no fixed
    /// installation layout of its own to assume.
    pub fn start(config: &ContainerConfig, pid1_exe: &Path) -> Result<Self> {
        let (ready_read, ready_write) = pipe().map_err(|e| CoreError::os("pipe", e))?;
        let (shutdown_read, shutdown_write) = pipe().map_err(|e| CoreError::os("pipe", e))?;

        // Unshare affects only the calling thread and only the next fork's
        // children; the parent itself stays in its current PID namespace.
        sys::unshare_namespaces(CloneFlags::CLONE_NEWPID)?;

        match sys::fork_process()? {
            ForkOutcome::Child => {
                let _ = close(ready_read);
                let _ = close(shutdown_write);
                let params = Pid1Params {
                    root_dir: config.root_dir.clone(),
                    control_read: shutdown_read,
                    control_write: ready_write,
                    isolate_networking: config.isolate_networking,
                    bind_mounts: config.effective_bind_mounts(),
                };
                // Does not return. Any failure here is reported and the
                // child exits immediately without running parent-side
                // cleanup.
                exec_pid1(pid1_exe, &params);
            }
            ForkOutcome::Parent(pid) => {
                let _ = close(shutdown_read);
                let _ = close(ready_write);

                let original_pidns = File::open("/proc/self/ns/pid")
                    .map_err(|e| CoreError::io("/proc/self/ns/pid", e))?;
                sys::setns_fd(original_pidns.as_raw_fd(), CloneFlags::CLONE_NEWPID)?;
                drop(original_pidns);

                let result = wait_for_ready(ready_read);
                let _ = close(ready_read);
                result?;

                Ok(Self { pid, shutdown_write: Some(shutdown_write) })
            }
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Kills PID1 (and transitively every process in the container) and
    /// reaps it. Safe to call more than once.
    pub fn kill(&mut self) -> Result<()> {
        if let Some(fd) = self.shutdown_write.take() {
            let _ = close(fd);
        }
        match kill(self.pid, Signal::SIGKILL) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
            Err(e) => return Err(CoreError::os("kill", e)),
        }
        match waitpid(self.pid, None) {
            Ok(_) | Err(nix::errno::Errno::ECHILD) => Ok(()),
            Err(e) => Err(CoreError::os("waitpid", e)),
        }
    }
}

impl Drop for Pid1Supervisor {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            tracing::warn!(error = %e, "failed to kill container PID1 during teardown");
        }
    }
}

fn wait_for_ready(ready_read: RawFd) -> Result<()> {
    let mut buf = [0u8; 3];
    let mut filled = 0;
    while filled < buf.len() {
        let n = read(ready_read, &mut buf[filled..]).map_err(|e| CoreError::os("read", e))?;
        if n == 0 {
            return Err(CoreError::Startup(
                "container PID1 exited before sending the ready signal".to_string(),
            ));
        }
        filled += n;
    }
    if &buf != READY_TOKEN {
        return Err(CoreError::Startup("container PID1 did not send the ready signal".to_string()));
    }
    Ok(())
}

fn exec_pid1(pid1_exe: &Path, params: &Pid1Params) -> ! {
    let json = match serde_json::to_string(params) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("furnace-pid1: failed to serialize startup parameters: {e}");
            nix::unistd::_exit(1);
        }
    };
    let exe = exe_cstring(pid1_exe);
    let arg0 = exe.clone();
    let arg1 = std::ffi::CString::new(json).expect("JSON config must not contain NUL bytes");
    let err = nix::unistd::execv(&exe, &[arg0, arg1]).unwrap_err();
    eprintln!("furnace-pid1: exec of {} failed: {}", pid1_exe.display(), err);
    nix::unistd::_exit(1);
}

fn exe_cstring(path: &Path) -> std::ffi::CString {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::CString::new(path.as_os_str().as_bytes())
        .expect("executable path must not contain NUL bytes")
}
