// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-unique monotone identifiers for tasks and jobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a task instance.
///
/// Minted monotonically per process; the numbering restarts with the
/// Manager (tasks do not survive a restart).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

/// Unique identifier for a job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl TaskId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl JobId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TaskId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<u64> for JobId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Monotone id source starting at zero.
#[derive(Debug, Default)]
pub struct IdGen(AtomicU64);

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next id, strictly greater than every id returned before.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
