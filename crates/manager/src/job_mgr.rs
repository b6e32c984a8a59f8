// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job scheduler: per-state queues drained by a resizable pool of OS
//! worker threads.
//!
//! Queues exist for every queueable state; only `PREPARED` and `COMPLETED`
//! are pulled for execution, in that order, FIFO within a queue. Jobs
//! waiting for a worker sit in a holding line and are attached during the
//! pull path. The queue condition variable is always signalled under its
//! lock.

use crate::job::{FailOutcome, JobState, RunOutcome, TestJobRequest};
use crate::task::{TaskState, TestTask};
use crate::worker_mgr::WorkerMgr;
use ct_core::{IdGen, JobId, ResultCode, SettingsStore, TaskId};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("worker thread count must be at least 1")]
    InvalidThreadCount,
}

#[derive(Default)]
struct QueueSet {
    prepared: VecDeque<Arc<TestJobRequest>>,
    inflight: VecDeque<Arc<TestJobRequest>>,
    completed: VecDeque<Arc<TestJobRequest>>,
    failed: VecDeque<Arc<TestJobRequest>>,
    /// `CREATED` jobs waiting for a connected worker.
    unattached: VecDeque<Arc<TestJobRequest>>,
}

impl QueueSet {
    fn push(&mut self, job: Arc<TestJobRequest>) {
        match job.state() {
            JobState::Prepared => self.prepared.push_back(job),
            JobState::Inflight => self.inflight.push_back(job),
            JobState::Completed => self.completed.push_back(job),
            JobState::Failed => self.failed.push_back(job),
            JobState::Created => self.unattached.push_back(job),
            // Hardened jobs leave the scheduler.
            JobState::Hardened => {}
        }
    }

    fn drain_matching(
        &mut self,
        task_id: TaskId,
        generation: u64,
    ) -> Vec<Arc<TestJobRequest>> {
        let mut matched = Vec::new();
        for queue in [
            &mut self.prepared,
            &mut self.inflight,
            &mut self.completed,
            &mut self.unattached,
        ] {
            let mut keep = VecDeque::with_capacity(queue.len());
            while let Some(job) = queue.pop_front() {
                if job.task_id() == task_id && job.task_generation() == generation {
                    matched.push(job);
                } else {
                    keep.push_back(job);
                }
            }
            *queue = keep;
        }
        matched
    }
}

struct JobMgrCore {
    settings: Arc<SettingsStore>,
    worker_mgr: Arc<WorkerMgr>,
    queues: Mutex<QueueSet>,
    cv: Condvar,
    id_gen: IdGen,
    running: AtomicBool,
}

struct WorkerThread {
    id: usize,
    stop: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<()>,
}

/// The scheduler.
pub struct JobMgr {
    core: Arc<JobMgrCore>,
    threads: Mutex<Vec<WorkerThread>>,
    next_thread_id: AtomicUsize,
}

impl JobMgr {
    pub fn new(settings: Arc<SettingsStore>, worker_mgr: Arc<WorkerMgr>) -> Arc<Self> {
        let thread_count = settings.snapshot().job_threads.max(1);
        let core = Arc::new(JobMgrCore {
            settings,
            worker_mgr,
            queues: Mutex::new(QueueSet::default()),
            cv: Condvar::new(),
            id_gen: IdGen::new(),
            running: AtomicBool::new(true),
        });

        let mgr = Arc::new(Self {
            core,
            threads: Mutex::new(Vec::new()),
            next_thread_id: AtomicUsize::new(0),
        });
        {
            let mut threads = mgr.threads.lock();
            for _ in 0..thread_count {
                mgr.spawn_thread(&mut threads);
            }
        }
        info!(threads = thread_count, "job scheduler started");
        mgr
    }

    /// Mint a job for the task's current generation and queue it.
    pub fn create_job(&self, task: &Arc<TestTask>) -> Arc<TestJobRequest> {
        let job = Arc::new(TestJobRequest::new(
            JobId(self.core.id_gen.next()),
            Arc::clone(task),
        ));
        debug!(job = %job.id(), task = %task.id(), "job created");
        self.add_request(Arc::clone(&job));
        job
    }

    /// Seed a freshly scheduled task with one job per connected worker (at
    /// least one, so work is queued for the first worker to arrive).
    pub fn seed_task_jobs(&self, task: &Arc<TestTask>) {
        let seeds = self.core.worker_mgr.connected_workers().len().max(1);
        for _ in 0..seeds {
            self.create_job(task);
        }
        info!(task = %task.id(), seeds, "task seeded with jobs");
    }

    /// Queue a job on the queue matching its current state.
    pub fn add_request(&self, job: Arc<TestJobRequest>) {
        let mut queues = self.core.queues.lock();
        queues.push(job);
        self.core.cv.notify_one();
    }

    /// Route a worker's test result to its inflight job.
    pub fn on_job_result(&self, job_id: JobId, result: &str, payload: Option<String>) {
        let job = {
            let mut queues = self.core.queues.lock();
            let index = queues.inflight.iter().position(|j| j.id() == job_id);
            index.and_then(|i| queues.inflight.remove(i))
        };
        let Some(job) = job else {
            warn!(job = %job_id, "result for unknown or already-settled job dropped");
            return;
        };

        if result == ResultCode::Success.as_str() {
            match job.complete(payload.unwrap_or_default()) {
                Ok(()) => {
                    let mut queues = self.core.queues.lock();
                    queues.completed.push_back(job);
                    self.core.cv.notify_one();
                }
                Err(e) => self.fail_job(job, e.to_string()),
            }
        } else {
            self.fail_job(job, format!("worker reported: {result}"));
        }
    }

    /// Fail every non-settled job attached to a lost worker.
    pub fn on_worker_lost(&self, worker_name: &str) {
        let affected: Vec<_> = {
            let mut guard = self.core.queues.lock();
            let queues = &mut *guard;
            let mut affected = Vec::new();
            for queue in [&mut queues.prepared, &mut queues.inflight] {
                let mut keep = VecDeque::with_capacity(queue.len());
                while let Some(job) = queue.pop_front() {
                    let lost = job.worker().is_some_and(|w| w.name() == worker_name);
                    if lost {
                        affected.push(job);
                    } else {
                        keep.push_back(job);
                    }
                }
                *queue = keep;
            }
            affected
        };

        for job in affected {
            self.fail_job(job, format!("worker channel lost: {worker_name}"));
        }
    }

    /// Abort every queued job of `(task_id, generation)`.
    ///
    /// Required to finish before the owning task flips state, so a stale
    /// job can never be re-dispatched.
    pub fn stop_task_jobs(&self, task_id: TaskId, generation: u64) {
        let stale = {
            let mut queues = self.core.queues.lock();
            queues.drain_matching(task_id, generation)
        };
        let count = stale.len();

        for job in stale {
            job.force_fail("stale generation");
            self.core.queues.lock().failed.push_back(job);
        }
        if count > 0 {
            info!(task = %task_id, generation, count, "stale jobs aborted");
        }
    }

    /// Jobs currently sitting in the queue for `state`.
    pub fn jobs_with_state(&self, state: JobState) -> Vec<Arc<TestJobRequest>> {
        let queues = self.core.queues.lock();
        let queue = match state {
            JobState::Prepared => &queues.prepared,
            JobState::Inflight => &queues.inflight,
            JobState::Completed => &queues.completed,
            JobState::Failed => &queues.failed,
            JobState::Created => &queues.unattached,
            JobState::Hardened => return Vec::new(),
        };
        queue.iter().cloned().collect()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().len()
    }

    /// Grow or shrink the worker-thread pool. Shrinking joins the retired
    /// threads before returning.
    pub fn resize(&self, new_count: usize) -> Result<(), SchedulerError> {
        if new_count == 0 {
            return Err(SchedulerError::InvalidThreadCount);
        }

        let mut threads = self.threads.lock();
        let current = threads.len();

        if new_count > current {
            for _ in current..new_count {
                self.spawn_thread(&mut threads);
            }
            info!(from = current, to = new_count, "scheduler pool grown");
        } else if new_count < current {
            let surplus: Vec<WorkerThread> = threads.drain(..current - new_count).collect();
            for thread in &surplus {
                thread.stop.store(true, Ordering::Release);
            }
            {
                let _queues = self.core.queues.lock();
                self.core.cv.notify_all();
            }
            for thread in surplus {
                debug!(thread = thread.id, "joining retired scheduler thread");
                let _ = thread.handle.join();
            }
            info!(from = current, to = new_count, "scheduler pool shrunk");
        }
        Ok(())
    }

    /// Stop all worker threads. Jobs still sitting in queues are lost.
    pub fn destroy(&self) {
        self.core.running.store(false, Ordering::Release);
        {
            let _queues = self.core.queues.lock();
            self.core.cv.notify_all();
        }

        let mut threads = self.threads.lock();
        for thread in threads.drain(..) {
            let _ = thread.handle.join();
        }
        info!("job scheduler stopped");
    }

    fn spawn_thread(&self, threads: &mut Vec<WorkerThread>) {
        let id = self.next_thread_id.fetch_add(1, Ordering::Relaxed);
        let core = Arc::clone(&self.core);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let spawned = std::thread::Builder::new()
            .name(format!("job-worker-{id}"))
            .spawn(move || worker_loop(core, stop_flag, id));

        match spawned {
            Ok(handle) => threads.push(WorkerThread { id, stop, handle }),
            Err(e) => error!(thread = id, error = %e, "failed to spawn scheduler thread"),
        }
    }

    fn fail_job(&self, job: Arc<TestJobRequest>, reason: String) {
        let limit = self.core.settings.snapshot().job_failures_limit;
        let outcome = job.try_to_fail(reason, limit);

        let mut queues = self.core.queues.lock();
        match outcome {
            FailOutcome::Failed => queues.failed.push_back(job),
            FailOutcome::Retrying => {
                queues.unattached.push_back(job);
                self.core.cv.notify_one();
            }
        }
    }
}

fn worker_loop(core: Arc<JobMgrCore>, stop: Arc<AtomicBool>, id: usize) {
    debug!(thread = id, "scheduler thread started");
    while core.running.load(Ordering::Acquire) && !stop.load(Ordering::Acquire) {
        let Some(job) = next_request(&core) else {
            continue;
        };
        process(&core, job);
    }
    debug!(thread = id, "scheduler thread stopped");
}

/// Pull the next workable job: `PREPARED` before `COMPLETED`, FIFO within
/// a state. Blocks on the queue condition variable when idle.
fn next_request(core: &JobMgrCore) -> Option<Arc<TestJobRequest>> {
    let mut queues = core.queues.lock();
    attach_pending(core, &mut queues);

    if let Some(job) = queues.prepared.pop_front() {
        return Some(job);
    }
    if let Some(job) = queues.completed.pop_front() {
        return Some(job);
    }

    // Bounded wait so stop flags are observed even without traffic.
    core.cv.wait_for(&mut queues, Duration::from_millis(100));
    None
}

/// Attach waiting jobs to the least-loaded connected workers.
fn attach_pending(core: &JobMgrCore, queues: &mut QueueSet) {
    if queues.unattached.is_empty() {
        return;
    }
    let workers = core.worker_mgr.connected_workers();
    if workers.is_empty() {
        return;
    }

    let mut still_waiting = VecDeque::new();
    while let Some(job) = queues.unattached.pop_front() {
        let target = workers.iter().min_by_key(|w| w.inflight_jobs());
        match target {
            Some(worker) => match job.prepare(Arc::clone(worker)) {
                Ok(()) => queues.prepared.push_back(job),
                Err(e) => {
                    debug!(job = %job.id(), error = %e, "attach deferred");
                    still_waiting.push_back(job);
                }
            },
            None => still_waiting.push_back(job),
        }
    }
    queues.unattached = still_waiting;
}

fn process(core: &Arc<JobMgrCore>, job: Arc<TestJobRequest>) {
    match job.run() {
        Ok(RunOutcome::Dispatched) => {
            core.queues.lock().inflight.push_back(job);
        }
        Ok(RunOutcome::Hardened) => {
            let task = Arc::clone(job.task());
            // The training loop continues while the task stays scheduled
            // on the generation this job belonged to.
            if task.state() == TaskState::Scheduled
                && task.generation() == job.task_generation()
            {
                let successor = Arc::new(TestJobRequest::new(
                    JobId(core.id_gen.next()),
                    Arc::clone(&task),
                ));
                debug!(job = %successor.id(), task = %task.id(), "successor job created");
                let mut queues = core.queues.lock();
                queues.push(successor);
                core.cv.notify_one();
            }
        }
        Err(e) => {
            let limit = core.settings.snapshot().job_failures_limit;
            let outcome = job.try_to_fail(e.to_string(), limit);
            let mut queues = core.queues.lock();
            match outcome {
                FailOutcome::Failed => queues.failed.push_back(job),
                FailOutcome::Retrying => {
                    queues.unattached.push_back(job);
                    core.cv.notify_one();
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "job_mgr_tests.rs"]
mod tests;
