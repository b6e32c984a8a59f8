// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process settings: a JSON file with documented defaults, published as
//! copy-on-write snapshots.
//!
//! Readers call [`SettingsStore::snapshot`] and hold a consistent
//! `Arc<Settings>`; [`SettingsStore::publish`] swaps the current snapshot
//! and then invokes registered change callbacks outside the lock. Unknown
//! keys in the file are tolerated; missing keys take the defaults below.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The recognized settings record. Interval-valued fields are fractional
/// seconds in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP front worker count hint for the Manager.
    pub mgr_num_workers: usize,
    pub logger_path: PathBuf,
    pub log_std_out: bool,
    pub log_level: String,
    /// Seconds of keep-alive silence before a Worker is marked for deletion.
    pub worker_timeout: f64,
    pub build_dir: PathBuf,
    /// Scheduler worker-thread count.
    pub job_threads: usize,
    /// Failures strictly above this count escalate a job to FAILED.
    pub job_failures_limit: usize,
    pub unregister_retries: u32,
    pub retry_timestep: f64,
    pub thread_retries: u32,
    /// Worker control-daemon command port (localhost only).
    pub process_port: u16,
    pub manager_port: u16,
    pub connection_retries: u32,
    pub gentle_stop_timeout: f64,
    pub ka_interval: f64,
    pub audit_interval: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mgr_num_workers: 4,
            logger_path: PathBuf::from("tune.log"),
            log_std_out: false,
            log_level: "info".to_string(),
            worker_timeout: 60.0,
            build_dir: PathBuf::from("."),
            job_threads: 4,
            job_failures_limit: 3,
            unregister_retries: 3,
            retry_timestep: 1.0,
            thread_retries: 5,
            process_port: 3127,
            manager_port: 8000,
            connection_retries: 5,
            gentle_stop_timeout: 30.0,
            ka_interval: 10.0,
            audit_interval: 0.1,
        }
    }
}

impl Settings {
    /// Parse a settings file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(SettingsError::Read { path: path.to_path_buf(), source: e }),
        };

        serde_json::from_str(&raw)
            .map_err(|e| SettingsError::Malformed { path: path.to_path_buf(), source: e })
    }

    pub fn worker_timeout_interval(&self) -> Duration {
        Duration::from_secs_f64(self.worker_timeout.max(0.0))
    }

    pub fn retry_timestep_interval(&self) -> Duration {
        Duration::from_secs_f64(self.retry_timestep.max(0.0))
    }

    pub fn gentle_stop_interval(&self) -> Duration {
        Duration::from_secs_f64(self.gentle_stop_timeout.max(0.0))
    }

    pub fn ka_interval_interval(&self) -> Duration {
        Duration::from_secs_f64(self.ka_interval.max(0.0))
    }

    pub fn audit_interval_interval(&self) -> Duration {
        Duration::from_secs_f64(self.audit_interval.max(0.0))
    }
}

type ChangeCallback = Box<dyn Fn(&Settings) + Send + Sync>;

/// Copy-on-publish settings holder with change callbacks.
pub struct SettingsStore {
    current: RwLock<Arc<Settings>>,
    callbacks: Mutex<Vec<ChangeCallback>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Load from disk and wrap in a store.
    pub fn open(path: &Path) -> Result<Self, SettingsError> {
        Ok(Self::new(Settings::load(path)?))
    }

    /// A consistent snapshot of the current settings.
    pub fn snapshot(&self) -> Arc<Settings> {
        Arc::clone(&self.current.read())
    }

    /// Register a callback invoked after every publish.
    pub fn on_change(&self, callback: impl Fn(&Settings) + Send + Sync + 'static) {
        self.callbacks.lock().push(Box::new(callback));
    }

    /// Swap in a new snapshot and notify subscribers.
    ///
    /// Callbacks run after publication, outside the snapshot lock, so a
    /// callback reading back through the store sees the new record.
    pub fn publish(&self, settings: Settings) {
        let snapshot = Arc::new(settings);
        *self.current.write() = Arc::clone(&snapshot);

        let callbacks = self.callbacks.lock();
        for callback in callbacks.iter() {
            callback(&snapshot);
        }
    }

    /// Re-read the file and publish if the record changed.
    ///
    /// Returns whether a new snapshot was published.
    pub fn reload(&self, path: &Path) -> Result<bool, SettingsError> {
        let fresh = Settings::load(path)?;
        if fresh == *self.snapshot() {
            return Ok(false);
        }
        self.publish(fresh);
        Ok(true)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
