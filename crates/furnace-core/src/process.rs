// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! Runs an already-spawned child to completion with the same signal
//! handling furnace's own supervisor needs: forward `SIGTERM` to the
//! child, ignore `SIGINT` (the terminal already delivers it to the whole
//! foreground process group, including the child), and reap on `SIGCHLD`.

use std::process::{Child, ExitStatus};

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use signal_hook::consts::signal::{SIGCHLD, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::error::{CoreError, Result};

pub fn wait_with_signal_forwarding(mut child: Child) -> Result<ExitStatus> {
    let mut signals =
        Signals::new([SIGCHLD, SIGINT, SIGTERM]).map_err(|e| CoreError::io("signalfd", e))?;

    for signal in signals.forever() {
        match signal {
            SIGCHLD => {
                if let Some(status) = child.try_wait().map_err(|e| CoreError::io("waitpid", e))? {
                    return Ok(status);
                }
            }
            SIGINT => {}
            SIGTERM => {
                let pid = Pid::from_raw(child.id() as i32);
                nix::sys::signal::kill(pid, Signal::SIGTERM).map_err(|e| CoreError::os("kill", e))?;
            }
            _ => unreachable!("Signals was only registered for SIGCHLD/SIGINT/SIGTERM"),
        }
    }
    unreachable!("Signals::forever never terminates")
}
