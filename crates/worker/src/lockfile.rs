// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Singleton lockfile: plain text holding the owning PID as ASCII decimal.

use fs2::FileExt;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LockFileError {
    #[error("another daemon is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("lockfile contended at {0}")]
    Contended(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Exclusive ownership of the per-host daemon lockfile.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    pid: u32,
    // Held for the fs2 advisory lock; released on drop.
    _file: std::fs::File,
}

impl LockFile {
    /// Acquire the lockfile for this process.
    ///
    /// A live PID in an existing file refuses the start; a stale file is
    /// removed first. Exclusive creation plus an advisory lock close the
    /// race between two simultaneous starters.
    pub fn acquire(path: &Path) -> Result<Self, LockFileError> {
        if let Some(pid) = Self::read_pid(path) {
            if is_pid_alive(pid) {
                return Err(LockFileError::AlreadyRunning { pid });
            }
            warn!(path = %path.display(), pid, "removing stale lockfile");
            std::fs::remove_file(path)?;
        }

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let pid = Self::read_pid(path).unwrap_or(0);
                return Err(LockFileError::AlreadyRunning { pid });
            }
            Err(e) => return Err(e.into()),
        };

        file.try_lock_exclusive()
            .map_err(|_| LockFileError::Contended(path.to_path_buf()))?;

        let pid = std::process::id();
        writeln!(file, "{pid}")?;
        file.sync_all()?;

        info!(path = %path.display(), pid, "lockfile acquired");
        Ok(Self { path: path.to_path_buf(), pid, _file: file })
    }

    /// The PID recorded in a lockfile, if one is readable.
    pub fn read_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    /// Spin until the lockfile appears, returning its recorded PID.
    ///
    /// Used by the front-end `deploy` after spawning the daemon.
    pub fn await_creation(path: &Path, timeout: Duration) -> Option<u32> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pid) = Self::read_pid(path) {
                return Some(pid);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the lockfile iff it still records our PID.
    pub fn release(self) {
        match Self::read_pid(&self.path) {
            Some(pid) if pid == self.pid => {
                if let Err(e) = std::fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %e, "failed to remove lockfile");
                } else {
                    info!(path = %self.path.display(), "lockfile released");
                }
            }
            other => {
                warn!(
                    path = %self.path.display(),
                    recorded = ?other,
                    own = self.pid,
                    "lockfile no longer ours, leaving it in place"
                );
            }
        }
    }
}

/// Whether a PID names a live process (signal 0 probe).
pub fn is_pid_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(test)]
#[path = "lockfile_tests.rs"]
mod tests;
