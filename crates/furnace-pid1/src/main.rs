// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! Re-exec target the supervisor exits into to become the container's
//! PID1. Takes its entire configuration as a single JSON argument; never
//! invoked directly by a user.

use furnace_core::pid1::{self, Pid1Params};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("FURNACE_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let raw = match std::env::args().nth(1) {
        Some(raw) => raw,
        None => {
            eprintln!("furnace-pid1: expected a single JSON configuration argument");
            std::process::exit(1);
        }
    };

    let params: Pid1Params = match serde_json::from_str(&raw) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("furnace-pid1: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::debug!(root_dir = %params.root_dir.display(), "received startup configuration");

    match pid1::run(params) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("furnace-pid1: {e}");
            std::process::exit(1);
        }
    }
}
