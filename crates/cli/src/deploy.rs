// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ct deploy`: start the worker daemon detached and confirm it came up.

use ct_worker::lockfile::{is_pid_alive, LockFile};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

const LOCKFILE_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to spawn worker daemon: {0}")]
    SpawnFailed(std::io::Error),

    #[error("worker daemon did not create its lockfile within {LOCKFILE_WAIT:?}")]
    LockfileTimeout,

    #[error("worker daemon exited during startup: {0}")]
    ExitedEarly(String),
}

/// Start `ctwd` detached and wait for its lockfile.
///
/// A live daemon makes deploy a warning no-op. After the lockfile appears
/// its recorded PID is checked against the spawned child; a mismatch is
/// reported but not fatal (another daemon won the race cleanly).
pub fn deploy(settings_path: Option<&PathBuf>) -> Result<String, DeployError> {
    let lock_path = ct_worker::default_lockfile_path();

    if let Some(pid) = LockFile::read_pid(&lock_path) {
        if is_pid_alive(pid) {
            return Ok(format!(
                "warning: worker daemon already running (pid {pid}), nothing to do"
            ));
        }
    }

    let binary = find_ctwd_binary();
    let mut command = Command::new(&binary);
    if let Some(path) = settings_path {
        command.arg("--settings").arg(path);
    }
    let mut child = command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(DeployError::SpawnFailed)?;
    let spawned_pid = child.id();

    match LockFile::await_creation(&lock_path, LOCKFILE_WAIT) {
        Some(recorded_pid) if recorded_pid == spawned_pid => {
            Ok(format!("worker daemon started (pid {recorded_pid})"))
        }
        Some(recorded_pid) => Ok(format!(
            "warning: lockfile records pid {recorded_pid}, expected spawned pid {spawned_pid}"
        )),
        None => {
            // Distinguish a crash from a hang.
            match child.try_wait() {
                Ok(Some(status)) => Err(DeployError::ExitedEarly(status.to_string())),
                _ => Err(DeployError::LockfileTimeout),
            }
        }
    }
}

/// Locate the `ctwd` binary: explicit override, sibling of the current
/// executable, else rely on PATH.
fn find_ctwd_binary() -> PathBuf {
    if let Ok(path) = std::env::var("CT_WORKER_DAEMON") {
        return PathBuf::from(path);
    }

    if let Ok(current) = std::env::current_exe() {
        if let Some(dir) = current.parent() {
            let sibling = dir.join("ctwd");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from("ctwd")
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
