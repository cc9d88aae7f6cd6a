// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

//! The data model: a container's configuration, and the `BindMount` type
//! along with its `src:dst[:ro|rw]` string form used by the CLI.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindMount {
    pub source: PathBuf,
    /// Interpreted relative to the container root even when given as an
    /// absolute path: an absolute destination of `/mounted/as/absolute` and
    /// a relative destination of `mounted/as/absolute` mean the same thing.
    pub destination: PathBuf,
    pub readonly: bool,
}

impl BindMount {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, readonly: bool) -> Self {
        Self {
            source: source.into(),
            destination: relativize(&destination.into()),
            readonly,
        }
    }

    pub fn relative_destination(&self) -> &Path {
        &self.destination
    }
}

fn relativize(path: &Path) -> PathBuf {
    match path.strip_prefix("/") {
        Ok(stripped) => stripped.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

impl FromStr for BindMount {
    type Err = CoreError;

    /// Parses `src:dst` or `src:dst:ro`/`src:dst:rw`. Readonly is the
    /// default when no label is given.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parts = spec.splitn(3, ':');
        let source = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::Config(format!("missing source in volume spec {spec:?}")))?;
        let destination = parts
            .next()
            .ok_or_else(|| CoreError::Config(format!(
                "volume spec {spec:?} must have the form src:dst or src:dst:ro|rw"
            )))?;
        let readonly = match parts.next() {
            None => true,
            Some("ro") => true,
            Some("rw") => false,
            Some(other) => {
                return Err(CoreError::Config(format!(
                    "unrecognized volume mode {other:?}, use \"ro\" or \"rw\""
                )))
            }
        };
        Ok(BindMount::new(source, destination, readonly))
    }
}

#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub root_dir: PathBuf,
    pub isolate_networking: bool,
    pub bind_mounts: Vec<BindMount>,
}

impl ContainerConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            isolate_networking: false,
            bind_mounts: Vec::new(),
        }
    }

    pub fn isolate_networking(mut self, isolate: bool) -> Self {
        self.isolate_networking = isolate;
        self
    }

    pub fn push_bind_mount(mut self, bind_mount: BindMount) -> Self {
        self.bind_mounts.push(bind_mount);
        self
    }

    pub fn bind_mounts(mut self, bind_mounts: impl IntoIterator<Item = BindMount>) -> Self {
        self.bind_mounts.extend(bind_mounts);
        self
    }

    /// The full set of bind mounts PID1 should establish: the caller's own
    /// mounts, plus the host-network set when networking isn't isolated.
    pub fn effective_bind_mounts(&self) -> Vec<BindMount> {
        let mut mounts = self.bind_mounts.clone();
        if !self.isolate_networking {
            for (source, destination, readonly) in crate::catalog::HOST_NETWORK_BIND_MOUNTS {
                mounts.push(BindMount::new(*source, *destination, *readonly));
            }
        }
        mounts
    }
}
