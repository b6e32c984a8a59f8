// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job entity: one unit of work for a task generation.
//!
//! State machine: `CREATED → PREPARED → INFLIGHT → COMPLETED → HARDENED`,
//! with `FAILED` reachable from any workable state. Only `PREPARED` and
//! `COMPLETED` are workable; `INFLIGHT` and `FAILED` sit in scheduler
//! queues as bookkeeping.

use crate::task::{TaskError, TestTask};
use crate::worker::Worker;
use crate::exec;
use ct_core::{JobId, ObjectModel, OperationInProgress, TaskId};
use ct_wire::{RpcEnvelope, RunTestArgs, METHOD_RUN_TEST, METHOD_SETUP_TASK};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Created,
    Prepared,
    Inflight,
    Completed,
    Hardened,
    Failed,
}

impl JobState {
    /// States the scheduler actively pulls and runs.
    pub fn is_workable(&self) -> bool {
        matches!(self, JobState::Prepared | JobState::Completed)
    }

    /// States that may sit in scheduler queues.
    pub fn is_queueable(&self) -> bool {
        matches!(
            self,
            JobState::Prepared | JobState::Inflight | JobState::Completed | JobState::Failed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Hardened | JobState::Failed)
    }
}

ct_core::simple_display! {
    JobState {
        Created => "CREATED",
        Prepared => "PREPARED",
        Inflight => "INFLIGHT",
        Completed => "COMPLETED",
        Hardened => "HARDENED",
        Failed => "FAILED",
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {job_id} is {got}, expected {expected}")]
    WrongState { job_id: JobId, expected: &'static str, got: JobState },

    #[error("job already attached to a worker")]
    AlreadyAttached,

    #[error("job not attached to a worker")]
    NotAttached,

    #[error("worker {0} is not connected")]
    WorkerNotConnected(String),

    #[error("worker channel closed")]
    ChannelClosed,

    #[error("job belongs to a stale task generation")]
    StaleGeneration,

    #[error("job was aborted during dispatch")]
    Aborted,

    #[error("another operation is in progress for this job")]
    OperationInProgress(#[from] OperationInProgress),

    #[error("failed to encode channel frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Exec(#[from] exec::ExecError),
}

/// What `try_to_fail` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Failure logged; the job detached and may be re-dispatched.
    Retrying,
    /// The failure log exceeded the limit; the job is terminal.
    Failed,
}

/// What a successful run step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The test was shipped to the worker; the job is now `INFLIGHT`.
    Dispatched,
    /// The result was folded back; the job is now `HARDENED`.
    Hardened,
}

struct JobFields {
    state: JobState,
    worker: Option<Arc<Worker>>,
    failure_reasons: Vec<String>,
    result_payload: String,
}

pub struct TestJobRequest {
    id: JobId,
    task: Arc<TestTask>,
    task_generation: u64,
    model: ObjectModel<JobFields>,
}

impl TestJobRequest {
    /// Create a job bound to the task's current generation.
    pub fn new(id: JobId, task: Arc<TestTask>) -> Self {
        let task_generation = task.generation();
        Self {
            id,
            task,
            task_generation,
            model: ObjectModel::new(JobFields {
                state: JobState::Created,
                worker: None,
                failure_reasons: Vec::new(),
                result_payload: String::new(),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn task(&self) -> &Arc<TestTask> {
        &self.task
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    pub fn task_generation(&self) -> u64 {
        self.task_generation
    }

    pub fn state(&self) -> JobState {
        self.model.read().state
    }

    pub fn is_attached(&self) -> bool {
        self.model.read().worker.is_some()
    }

    pub fn worker(&self) -> Option<Arc<Worker>> {
        self.model.read().worker.clone()
    }

    pub fn failure_reasons(&self) -> Vec<String> {
        self.model.read().failure_reasons.clone()
    }

    pub fn failure_count(&self) -> usize {
        self.model.read().failure_reasons.len()
    }

    pub fn result_payload(&self) -> String {
        self.model.read().result_payload.clone()
    }

    /// Attach a connected worker, moving `CREATED → PREPARED`.
    pub fn prepare(&self, worker: Arc<Worker>) -> Result<(), JobError> {
        let mut fields = self.model.write();
        if fields.worker.is_some() {
            return Err(JobError::AlreadyAttached);
        }
        if fields.state != JobState::Created {
            return Err(JobError::WrongState {
                job_id: self.id,
                expected: "CREATED",
                got: fields.state,
            });
        }
        if !worker.is_connected() {
            return Err(JobError::WorkerNotConnected(worker.name().to_string()));
        }

        debug!(job = %self.id, worker = %worker.name(), "job prepared");
        fields.worker = Some(worker);
        fields.state = JobState::Prepared;
        Ok(())
    }

    /// Detach from the worker, reverting a non-terminal job to `CREATED`.
    pub fn detach(&self) -> Result<(), JobError> {
        let mut fields = self.model.write();
        if fields.worker.take().is_none() {
            return Err(JobError::NotAttached);
        }
        if !fields.state.is_terminal() {
            fields.state = JobState::Created;
        }
        Ok(())
    }

    /// Record the transport-delivered result, moving `INFLIGHT → COMPLETED`.
    pub fn complete(&self, payload: String) -> Result<(), JobError> {
        let mut fields = self.model.write();
        if fields.state != JobState::Inflight {
            return Err(JobError::WrongState {
                job_id: self.id,
                expected: "INFLIGHT",
                got: fields.state,
            });
        }
        fields.result_payload = payload;
        fields.state = JobState::Completed;
        Ok(())
    }

    /// Log a failure reason. Strictly more than `failures_limit` reasons
    /// escalates to `FAILED`; otherwise the job detaches for a retry.
    pub fn try_to_fail(&self, reason: impl Into<String>, failures_limit: usize) -> FailOutcome {
        let reason = reason.into();
        let (counted_worker, outcome) = {
            let mut fields = self.model.write();
            fields.failure_reasons.push(reason.clone());
            // Only a dispatched job has been counted against its worker's
            // load; a merely-prepared one must not decrement it.
            let was_inflight = fields.state == JobState::Inflight;
            let worker = fields.worker.take();

            let outcome = if fields.failure_reasons.len() > failures_limit {
                fields.state = JobState::Failed;
                FailOutcome::Failed
            } else {
                fields.state = JobState::Created;
                FailOutcome::Retrying
            };
            (worker.filter(|_| was_inflight), outcome)
        };

        if let Some(worker) = counted_worker {
            worker.on_job_failed();
        }

        match outcome {
            FailOutcome::Failed => info!(job = %self.id, %reason, "job failed permanently"),
            FailOutcome::Retrying => debug!(job = %self.id, %reason, "job failure logged, will retry"),
        }
        outcome
    }

    /// Unconditionally fail the job (stale-generation aborts).
    pub fn force_fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let counted_worker = {
            let mut fields = self.model.write();
            fields.failure_reasons.push(reason.clone());
            let was_inflight = fields.state == JobState::Inflight;
            fields.state = JobState::Failed;
            fields.worker.take().filter(|_| was_inflight)
        };
        if let Some(worker) = counted_worker {
            worker.on_job_failed();
        }
        info!(job = %self.id, %reason, "job aborted");
    }

    /// Execute the handler for the job's current workable state.
    pub fn run(&self) -> Result<RunOutcome, JobError> {
        let _op = self.model.perform_operation()?;

        let (state, worker) = {
            let fields = self.model.read();
            (fields.state, fields.worker.clone())
        };

        match state {
            JobState::Prepared => self.run_prepared(worker),
            JobState::Completed => self.run_completed(),
            got => Err(JobError::WrongState {
                job_id: self.id,
                expected: "PREPARED|COMPLETED",
                got,
            }),
        }
    }

    /// `PREPARED`: ship the test to the attached worker.
    fn run_prepared(&self, worker: Option<Arc<Worker>>) -> Result<RunOutcome, JobError> {
        let worker = worker.ok_or(JobError::NotAttached)?;
        if !worker.is_connected() {
            return Err(JobError::WorkerNotConnected(worker.name().to_string()));
        }
        if self.task.generation() != self.task_generation {
            return Err(JobError::StaleGeneration);
        }

        // First dispatch of this (task, generation) to this worker carries
        // the task materialization. Channel order guarantees the worker
        // processes it before the test itself.
        if !worker.is_task_configured(self.task_id(), self.task_generation) {
            let setup = self.task.setup_args()?;
            self.send(&worker, RpcEnvelope::new(METHOD_SETUP_TASK, setup)?)?;
            worker.note_task_configured(self.task_id(), self.task_generation);
        }

        let args = self.task.prepare_test_args()?;
        let envelope = RpcEnvelope::new(
            METHOD_RUN_TEST,
            RunTestArgs {
                job_id: self.id.as_u64(),
                task_id: self.task_id().as_u64(),
                generation: self.task_generation,
                args,
                seed: seed_for(self.id, self.task_generation),
            },
        )?;
        self.send(&worker, envelope)?;

        {
            let mut fields = self.model.write();
            if fields.state != JobState::Prepared {
                return Err(JobError::Aborted);
            }
            fields.state = JobState::Inflight;
        }
        worker.on_job_started();
        debug!(job = %self.id, worker = %worker.name(), "test dispatched");
        Ok(RunOutcome::Dispatched)
    }

    /// `COMPLETED`: fold the result payload back into the task.
    fn run_completed(&self) -> Result<RunOutcome, JobError> {
        let payload = {
            let fields = self.model.read();
            if fields.state != JobState::Completed {
                return Err(JobError::WrongState {
                    job_id: self.id,
                    expected: "COMPLETED",
                    got: fields.state,
                });
            }
            fields.result_payload.clone()
        };

        self.task.sync_test_results(&payload)?;

        let worker = {
            let mut fields = self.model.write();
            if fields.state != JobState::Completed {
                return Err(JobError::Aborted);
            }
            fields.state = JobState::Hardened;
            fields.worker.take()
        };
        if let Some(worker) = worker {
            worker.on_job_completed();
        }
        debug!(job = %self.id, "job hardened");
        Ok(RunOutcome::Hardened)
    }

    fn send(&self, worker: &Worker, envelope: RpcEnvelope) -> Result<(), JobError> {
        let sender = worker
            .channel_sender()
            .ok_or_else(|| JobError::WorkerNotConnected(worker.name().to_string()))?;
        exec::block_on(sender.send(envelope))?.map_err(|_| JobError::ChannelClosed)
    }
}

fn seed_for(job_id: JobId, generation: u64) -> u64 {
    job_id
        .as_u64()
        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(generation)
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
