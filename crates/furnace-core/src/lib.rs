// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! Kernel primitives, mount scope, config catalogue, PID1 routine, PID1
//! supervisor, and the re-entry facade that together implement a
//! lightweight Linux container: namespace isolation, a `pivot_root`-based
//! rootfs switch, and a small default mount/device-node catalogue.

pub mod catalog;
pub mod config;
pub mod error;
pub mod facade;
pub mod mount;
pub mod pid1;
pub mod process;
pub mod sys;
pub mod supervisor;

#[cfg(test)]
mod testutil;

// Run unit tests inside a fresh mount namespace so mount/bind-mount tests
// behave the same whether or not the test runner has real root.
#[cfg(test)]
#[used]
#[link_section = ".init_array"]
static _CTOR: extern "C" fn() = testutil::ctor_enter_mount_namespace;

pub use config::{BindMount, ContainerConfig};
pub use error::{CoreError, Result};

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use facade::ReentryFacade;
use supervisor::Pid1Supervisor;

/// A running container: the supervised PID1 process plus the re-entry
/// facade used to run further commands inside it. Dropping this kills the
/// container and everything in it.
pub struct Container {
    supervisor: Pid1Supervisor,
    facade: ReentryFacade,
}

impl Container {
    /// Starts a container for `config`. `pid1_exe` is the path to the
    /// `furnace-pid1` binary to re-exec into.
    pub fn start(config: &ContainerConfig, pid1_exe: &Path) -> Result<Self> {
        let supervisor = Pid1Supervisor::start(config, pid1_exe)?;
        let facade = ReentryFacade::open(supervisor.pid())?;
        Ok(Self { supervisor, facade })
    }

    pub fn pid(&self) -> nix::unistd::Pid {
        self.supervisor.pid()
    }

    pub fn run(&self, command: &mut Command) -> Result<ExitStatus> {
        self.facade.status(command)
    }

    pub fn interactive_shell(&self, virtual_hostname: &str) -> Result<ExitStatus> {
        self.facade.interactive_shell(virtual_hostname)
    }
}

/// Locates the `furnace-pid1` binary as a sibling of the currently running
/// executable, matching the way the original CLI's own binary is laid out
/// next to its helper.
pub fn sibling_pid1_exe() -> Result<PathBuf> {
    let current = std::env::current_exe().map_err(|e| CoreError::io("<current exe>", e))?;
    let dir = current.parent().ok_or_else(|| {
        CoreError::Startup("current executable has no parent directory".to_string())
    })?;
    Ok(dir.join("furnace-pid1"))
}
