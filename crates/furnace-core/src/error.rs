// Copyright 2026 The Furnace Authors
// Use of this source code is governed by an LGPL-2.1-or-later license that
// can be found in the LICENSE file.

use std::path::PathBuf;

/// The four error kinds the rest of the system distinguishes between: a bad
/// configuration supplied by the caller, a failing kernel primitive, a
/// failure during container startup that leaves no container to clean up,
/// and a violation of an invariant this crate relies on (e.g. not actually
/// being PID 1 inside the new namespace).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: nix::Error,
    },

    #[error("container startup failed: {0}")]
    Startup(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    pub fn os(op: &'static str, source: nix::Error) -> Self {
        CoreError::Os { op, source }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
