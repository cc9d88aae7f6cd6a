// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! `furnace`: a lightweight container implementation built on Linux
//! namespaces, `pivot_root`, and a small curated default mount/device-node
//! catalogue.

mod logging;

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use furnace_core::mount::MountSpec;
use furnace_core::{BindMount, Container, ContainerConfig};

/// A lightweight container implementation built on Linux namespaces.
#[derive(Parser, Debug)]
#[command(name = "furnace", version, about)]
struct Cli {
    /// This directory will be the root directory of the container.
    root_dir: PathBuf,

    /// The command that will be run. If empty, furnace drops into an
    /// interactive shell.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    cmd: Vec<String>,

    /// Virtual hostname setting for the interactive shell prompt.
    #[arg(short = 'H', long, default_value = "container")]
    hostname: String,

    /// Create an isolated network namespace for the container.
    #[arg(short = 'i', long)]
    isolate_networking: bool,

    /// Do not create a temporary overlay on top of the root directory; the
    /// changes will be persistent.
    #[arg(short = 'p', long)]
    persistent: bool,

    /// Add a volume from the host machine to the container, in the form
    /// `/source/from/the/host:/path/in/the/container:rw` (readonly is the
    /// default when no `ro`/`rw` label is given).
    #[arg(short = 'v', long = "volume", value_name = "src:dst:{rw,ro}")]
    volumes: Vec<BindMount>,
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("FATAL: furnace: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    tracing::info!(root_dir = %cli.root_dir.display(), persistent = cli.persistent, "starting container");

    if cli.persistent {
        run_container(&cli.root_dir, &cli)
    } else {
        run_with_temporary_overlay(&cli)
    }
}

fn run_with_temporary_overlay(cli: &Cli) -> Result<i32> {
    let work_dir = tempfile::Builder::new().suffix("_overlay_work").tempdir()?;
    let rw_dir = tempfile::Builder::new().suffix("_overlay_rw").tempdir()?;
    let mount_dir = tempfile::Builder::new().suffix("_overlay_mount").tempdir()?;

    let spec = MountSpec::Overlay {
        lower_dirs: std::slice::from_ref(&cli.root_dir),
        upper_dir: rw_dir.path(),
        work_dir: work_dir.path(),
    };
    let _guard = spec
        .acquire(mount_dir.path())
        .context("mounting the temporary overlay")?;

    run_container(mount_dir.path(), cli)
}

fn run_container(root_dir: &Path, cli: &Cli) -> Result<i32> {
    let mut config = ContainerConfig::new(root_dir).isolate_networking(cli.isolate_networking);
    config = config.bind_mounts(cli.volumes.iter().cloned());

    let pid1_exe = furnace_core::sibling_pid1_exe().context("locating the furnace-pid1 helper binary")?;
    let container = Container::start(&config, &pid1_exe).context("starting the container")?;

    let status = if cli.cmd.is_empty() {
        container
            .interactive_shell(&cli.hostname)
            .context("running the interactive shell")?
    } else {
        let mut command = Command::new(&cli.cmd[0]);
        command.args(&cli.cmd[1..]);
        container.run(&mut command).context("running the command")?
    };

    Ok(furnace_core::facade::status_to_exit_code(status))
}
