// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker entity: a remote executor's registry record.

use ct_core::{ObjectModel, ResultCode, SessionToken, TaskId};
use ct_wire::RpcEnvelope;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Worker session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Registered,
    Connected,
    Configured,
    MarkedForDelete,
}

ct_core::simple_display! {
    WorkerState {
        Registered => "REGISTERED",
        Connected => "CONNECTED",
        Configured => "CONFIGURED",
        MarkedForDelete => "MARKED_FOR_DELETE",
    }
}

/// Declared identity and capacity, immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub name: String,
    pub version: u32,
    pub cpus: u32,
    pub memory_mb: u64,
}

ct_core::builder! {
    pub struct WorkerInfoBuilder => WorkerInfo {
        into {
            name: String = "test-worker",
        }
        set {
            version: u32 = 1,
            cpus: u32 = 2,
            memory_mb: u64 = 256,
        }
    }
}

/// Handle to a worker's live channel: an outbound frame queue plus the
/// token that tears the socket task down.
#[derive(Debug, Clone)]
pub struct WorkerSocket {
    pub tx: mpsc::Sender<RpcEnvelope>,
    pub cancel: CancellationToken,
}

struct WorkerFields {
    state: WorkerState,
    last_activity: Instant,
    socket: Option<WorkerSocket>,
    inflight_jobs: usize,
    /// Task generations already materialized on this worker.
    configured_tasks: HashMap<TaskId, u64>,
}

/// A registered remote executor.
pub struct Worker {
    info: WorkerInfo,
    session_token: SessionToken,
    model: ObjectModel<WorkerFields>,
}

impl Worker {
    pub fn new(info: WorkerInfo, session_token: SessionToken) -> Self {
        Self {
            info,
            session_token,
            model: ObjectModel::new(WorkerFields {
                state: WorkerState::Registered,
                last_activity: Instant::now(),
                socket: None,
                inflight_jobs: 0,
                configured_tasks: HashMap::new(),
            }),
        }
    }

    pub fn info(&self) -> &WorkerInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn session_token(&self) -> SessionToken {
        self.session_token
    }

    pub fn state(&self) -> WorkerState {
        self.model.read().state
    }

    /// Name match that ignores sessions already condemned.
    pub fn is_same(&self, name: &str) -> bool {
        self.info.name == name && !self.is_marked_for_delete()
    }

    pub fn is_marked_for_delete(&self) -> bool {
        self.model.read().state == WorkerState::MarkedForDelete
    }

    /// A worker can carry jobs once its channel is attached.
    pub fn is_connected(&self) -> bool {
        let fields = self.model.read();
        matches!(fields.state, WorkerState::Connected | WorkerState::Configured)
            && fields.socket.is_some()
    }

    /// Terminal transition. Closes any attached socket as part of the flip.
    pub fn mark_for_delete(&self) {
        let socket = {
            let mut fields = self.model.write();
            if fields.state == WorkerState::MarkedForDelete {
                return;
            }
            fields.state = WorkerState::MarkedForDelete;
            fields.socket.take()
        };
        self.model.bump_generation();

        if let Some(socket) = socket {
            socket.cancel.cancel();
        }
        info!(worker = %self.info.name, "worker marked for deletion");
    }

    /// Attach the channel socket. Allowed only from `REGISTERED` with no
    /// socket already bonded.
    pub fn attach_socket(&self, socket: WorkerSocket) -> ResultCode {
        let mut fields = self.model.write();
        match fields.state {
            WorkerState::MarkedForDelete => ResultCode::WorkerMarkedForDelete,
            WorkerState::Connected | WorkerState::Configured => ResultCode::WorkerAlreadyConnected,
            WorkerState::Registered if fields.socket.is_some() => {
                ResultCode::WorkerAlreadyConnected
            }
            WorkerState::Registered => {
                fields.socket = Some(socket);
                fields.state = WorkerState::Connected;
                fields.last_activity = Instant::now();
                drop(fields);
                self.model.bump_generation();
                ResultCode::Success
            }
        }
    }

    /// Drop the socket after a channel teardown, returning the worker to
    /// `REGISTERED` so a reconnect can bond a fresh socket.
    pub fn detach_socket(&self) {
        let mut fields = self.model.write();
        fields.socket = None;
        fields.configured_tasks.clear();
        if matches!(fields.state, WorkerState::Connected | WorkerState::Configured) {
            fields.state = WorkerState::Registered;
            drop(fields);
            self.model.bump_generation();
        }
    }

    /// Clone the outbound frame queue, if a socket is attached.
    pub fn channel_sender(&self) -> Option<mpsc::Sender<RpcEnvelope>> {
        self.model.read().socket.as_ref().map(|s| s.tx.clone())
    }

    pub fn bump_activity(&self) {
        self.model.write().last_activity = Instant::now();
    }

    pub fn inactivity(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.model.read().last_activity)
    }

    pub fn inflight_jobs(&self) -> usize {
        self.model.read().inflight_jobs
    }

    pub fn on_job_started(&self) {
        self.model.write().inflight_jobs += 1;
    }

    pub fn on_job_completed(&self) {
        let mut fields = self.model.write();
        fields.inflight_jobs = fields.inflight_jobs.saturating_sub(1);
    }

    pub fn on_job_failed(&self) {
        let mut fields = self.model.write();
        fields.inflight_jobs = fields.inflight_jobs.saturating_sub(1);
    }

    pub fn is_task_configured(&self, task_id: TaskId, generation: u64) -> bool {
        self.model.read().configured_tasks.get(&task_id) == Some(&generation)
    }

    /// Record a task generation as materialized; first setup also moves the
    /// session to `CONFIGURED`.
    pub fn note_task_configured(&self, task_id: TaskId, generation: u64) {
        let mut fields = self.model.write();
        fields.configured_tasks.insert(task_id, generation);
        if fields.state == WorkerState::Connected {
            fields.state = WorkerState::Configured;
            drop(fields);
            self.model.bump_generation();
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
