// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker registry: the fleet of remote executors across their session
//! lifecycle.
//!
//! Registrations land in a staging queue first; a background audit thread
//! publishes them into the live map in one step and signals a move epoch,
//! so a partially constructed record is never observable. The same thread
//! reaps sessions that time out or are marked for deletion.

use crate::worker::{Worker, WorkerInfo, WorkerSocket};
use ct_core::{ResultCode, SessionToken, SettingsStore, TokenMint};
use ct_wire::WorkerAuth;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Oldest worker protocol version the Manager still accepts.
pub const MIN_WORKER_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{}", .0.as_str())]
    Code(ResultCode),

    #[error("worker version {got} is older than the supported minimum {min}")]
    VersionTooOld { got: u32, min: u32 },
}

struct WorkerMgrFields {
    settings: Arc<SettingsStore>,
    token_mint: TokenMint,
    live: RwLock<HashMap<String, Arc<Worker>>>,
    queue: Mutex<Vec<Arc<Worker>>>,
    move_epoch: watch::Sender<u64>,
    should_work: AtomicBool,
}

/// Tracks the Worker fleet.
pub struct WorkerMgr {
    fields: Arc<WorkerMgrFields>,
    auditor: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl WorkerMgr {
    pub fn new(settings: Arc<SettingsStore>) -> Arc<Self> {
        let (move_epoch, _) = watch::channel(0u64);
        let fields = Arc::new(WorkerMgrFields {
            settings,
            token_mint: TokenMint::new(),
            live: RwLock::new(HashMap::new()),
            queue: Mutex::new(Vec::new()),
            move_epoch,
            should_work: AtomicBool::new(true),
        });

        let auditor = spawn_auditor(Arc::clone(&fields));
        info!("worker registry started");

        Arc::new(Self { fields, auditor: Mutex::new(Some(auditor)) })
    }

    /// Stage a new registration. The session token is returned immediately;
    /// the record becomes connectable once the audit thread publishes it.
    pub fn register(&self, info: WorkerInfo) -> Result<SessionToken, RegistrationError> {
        if info.version < MIN_WORKER_VERSION {
            return Err(RegistrationError::VersionTooOld {
                got: info.version,
                min: MIN_WORKER_VERSION,
            });
        }

        let mut queue = self.fields.queue.lock();

        if queue.iter().any(|worker| worker.is_same(&info.name)) {
            info!(worker = %info.name, "registration refused, name already queued");
            return Err(RegistrationError::Code(ResultCode::WorkerAlreadyRegistered));
        }
        {
            let live = self.fields.live.read();
            if live.get(&info.name).is_some_and(|w| !w.is_marked_for_delete()) {
                info!(worker = %info.name, "registration refused, name already live");
                return Err(RegistrationError::Code(ResultCode::WorkerAlreadyRegistered));
            }
        }

        let token = self.fields.token_mint.mint();
        let name = info.name.clone();
        queue.push(Arc::new(Worker::new(info, token)));

        info!(worker = %name, token = %token, "worker registered");
        Ok(token)
    }

    /// Authenticated unregister: marks the session for deletion; the audit
    /// thread reaps it. A second call observes `WORKER_NOT_FOUND`.
    pub fn unregister(&self, auth: &WorkerAuth) -> ResultCode {
        let Some(worker) = self.find(&auth.name) else {
            info!(worker = %auth.name, "unregister refused, worker not found");
            return ResultCode::WorkerNotFound;
        };
        if worker.session_token() != auth.session_token {
            info!(worker = %auth.name, "unregister refused, token mismatch");
            return ResultCode::InvalidToken;
        }

        worker.mark_for_delete();
        ResultCode::Success
    }

    /// Authenticated keep-alive bump.
    pub fn bump_ka(&self, auth: &WorkerAuth) -> ResultCode {
        let Some(worker) = self.find(&auth.name) else {
            debug!(worker = %auth.name, "keep-alive refused, worker not found");
            return ResultCode::WorkerNotFound;
        };
        if worker.session_token() != auth.session_token {
            debug!(worker = %auth.name, "keep-alive refused, token mismatch");
            return ResultCode::InvalidToken;
        }

        worker.bump_activity();
        ResultCode::Success
    }

    /// Look a worker up by name in the staging queue and the live map.
    pub fn find(&self, name: &str) -> Option<Arc<Worker>> {
        {
            let queue = self.fields.queue.lock();
            if let Some(worker) = queue.iter().find(|w| w.is_same(name)) {
                return Some(Arc::clone(worker));
            }
        }
        let live = self.fields.live.read();
        live.get(name).filter(|w| !w.is_marked_for_delete()).cloned()
    }

    /// Workers currently able to carry jobs.
    pub fn connected_workers(&self) -> Vec<Arc<Worker>> {
        let live = self.fields.live.read();
        live.values().filter(|w| w.is_connected()).cloned().collect()
    }

    /// Wait for one registration-move pass so a connect that raced its own
    /// registration sees the published record.
    ///
    /// Bounded: a wedged audit thread turns this into a short delay instead
    /// of a hang, and the live-map lookup afterwards still decides.
    pub async fn await_registration_move(&self) {
        let mut rx = self.fields.move_epoch.subscribe();
        let interval = self.fields.settings.snapshot().audit_interval_interval();
        let bound = (interval * 10).max(Duration::from_millis(100));
        if tokio::time::timeout(bound, rx.changed()).await.is_err() {
            warn!("registration-move signal timed out, consulting live map anyway");
        }
    }

    /// Bond an authenticated channel to its worker record.
    ///
    /// Callers run [`WorkerMgr::await_registration_move`] once first; only
    /// the live map is consulted here.
    pub fn accept_connection(&self, auth: &WorkerAuth, socket: WorkerSocket) -> ResultCode {
        let worker = {
            let live = self.fields.live.read();
            live.get(&auth.name).cloned()
        };
        let Some(worker) = worker else {
            info!(worker = %auth.name, "connection refused, worker not found");
            return ResultCode::WorkerNotFound;
        };
        if worker.session_token() != auth.session_token {
            info!(worker = %auth.name, "connection refused, token mismatch");
            return ResultCode::InvalidToken;
        }

        let code = worker.attach_socket(socket);
        if code.is_success() {
            worker.bump_activity();
            info!(worker = %auth.name, "worker channel bonded");
        } else {
            info!(worker = %auth.name, code = %code, "worker channel refused");
        }
        code
    }

    /// One audit pass: publish staged registrations, then reap timed-out
    /// and condemned sessions. Exposed for deterministic tests.
    pub fn audit_pass(&self) {
        audit_pass(&self.fields);
    }

    pub fn shutdown(&self) {
        self.fields.should_work.store(false, Ordering::Release);
        if let Some(handle) = self.auditor.lock().take() {
            let _ = handle.join();
        }
        info!("worker registry stopped");
    }
}

fn spawn_auditor(fields: Arc<WorkerMgrFields>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        // Drift-compensated cadence: a slow pass shortens the next sleep.
        let mut debt = Duration::ZERO;
        while fields.should_work.load(Ordering::Acquire) {
            let interval = fields
                .settings
                .snapshot()
                .audit_interval_interval()
                .max(Duration::from_millis(10));
            interruptible_sleep(&fields, interval.saturating_sub(debt));
            if !fields.should_work.load(Ordering::Acquire) {
                break;
            }

            let start = Instant::now();
            audit_pass(&fields);
            debt = start.elapsed().min(interval);
        }
    })
}

/// Sleep in short slices so shutdown is observed promptly.
fn interruptible_sleep(fields: &WorkerMgrFields, duration: Duration) {
    let deadline = Instant::now() + duration;
    while fields.should_work.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
    }
}

fn audit_pass(fields: &WorkerMgrFields) {
    // 1. Publish staged registrations in one step, then signal the move.
    {
        let mut queue = fields.queue.lock();
        if !queue.is_empty() {
            let mut live = fields.live.write();
            for worker in queue.drain(..) {
                if worker.is_marked_for_delete() {
                    continue;
                }
                debug!(worker = %worker.name(), "registration published to live map");
                live.insert(worker.name().to_string(), worker);
            }
        }
    }
    fields.move_epoch.send_modify(|epoch| *epoch += 1);

    // 2+3. Time out silent workers, drop condemned ones.
    let timeout = fields.settings.snapshot().worker_timeout_interval();
    let now = Instant::now();
    let mut live = fields.live.write();
    live.retain(|name, worker| {
        if worker.is_marked_for_delete() {
            info!(worker = %name, "reaping worker marked for deletion");
            return false;
        }
        let inactivity = worker.inactivity(now);
        if inactivity > timeout {
            info!(worker = %name, ?inactivity, "worker timed out");
            worker.mark_for_delete();
            return false;
        }
        true
    });
}

#[cfg(test)]
#[path = "worker_mgr_tests.rs"]
mod tests;
