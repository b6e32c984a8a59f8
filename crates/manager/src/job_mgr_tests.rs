// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::worker::{WorkerInfo, WorkerSocket};
use ct_core::Settings;
use ct_wire::{RpcEnvelope, WorkerAuth, METHOD_RUN_TEST};
use serde_json::json;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn stores(job_threads: usize) -> Arc<SettingsStore> {
    Arc::new(SettingsStore::new(Settings {
        job_threads,
        audit_interval: 60.0,
        worker_timeout: 60.0,
        job_failures_limit: 2,
        ..Settings::default()
    }))
}

struct Rig {
    worker_mgr: Arc<WorkerMgr>,
    job_mgr: Arc<JobMgr>,
}

impl Rig {
    fn new(job_threads: usize) -> Self {
        let settings = stores(job_threads);
        let worker_mgr = WorkerMgr::new(Arc::clone(&settings));
        let job_mgr = JobMgr::new(settings, Arc::clone(&worker_mgr));
        Self { worker_mgr, job_mgr }
    }

    fn connect_worker(&self, name: &str) -> mpsc::Receiver<RpcEnvelope> {
        let token = self
            .worker_mgr
            .register(WorkerInfo::builder().name(name).build())
            .unwrap();
        self.worker_mgr.audit_pass();

        let (tx, rx) = mpsc::channel(64);
        let code = self.worker_mgr.accept_connection(
            &WorkerAuth { name: name.to_string(), session_token: token },
            WorkerSocket { tx, cancel: CancellationToken::new() },
        );
        assert!(code.is_success());
        rx
    }

    fn ready_task(&self) -> Arc<TestTask> {
        let task = TestTask::new(
            ct_core::TaskId(0),
            "t1".to_string(),
            String::new(),
            "BaseChessModule".to_string(),
            ct_modules::Registries::standard(),
            Arc::new(SettingsStore::new(Settings::default())),
        )
        .unwrap();

        let mut worker_sel = ct_modules::SelectionMap::new();
        worker_sel.insert("chess_tournament.tournament".into(), vec!["CuteChess".into()]);
        worker_sel.insert("chess_engine.engines".into(), vec!["CheckmateChariot".into()]);
        let mut manager_sel = ct_modules::SelectionMap::new();
        manager_sel.insert("training_method.method".into(), vec!["SimpleTuning".into()]);

        task.try_init(worker_sel, manager_sel).unwrap();
        task.try_build(&json!({"worker_build_config": {}, "manager_build_config": {}}))
            .unwrap();
        task.try_config(&json!({
            "worker_config": {},
            "manager_config": {"method.SimpleTuning.params": {"knight": 300}},
        }))
        .unwrap();
        Arc::new(task)
    }

    fn teardown(self) {
        self.job_mgr.destroy();
        self.worker_mgr.shutdown();
    }
}

fn wait_until(what: &str, mut predicate: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if predicate() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for: {what}");
}

#[test]
fn resize_below_one_is_rejected() {
    let rig = Rig::new(2);
    assert!(matches!(
        rig.job_mgr.resize(0),
        Err(SchedulerError::InvalidThreadCount)
    ));
    assert_eq!(rig.job_mgr.thread_count(), 2);
    rig.teardown();
}

#[test]
fn resize_grows_and_shrinks_the_pool() {
    let rig = Rig::new(2);

    rig.job_mgr.resize(4).unwrap();
    assert_eq!(rig.job_mgr.thread_count(), 4);

    // Shrinking joins the retired threads before returning.
    rig.job_mgr.resize(1).unwrap();
    assert_eq!(rig.job_mgr.thread_count(), 1);

    rig.teardown();
}

#[test]
fn queued_jobs_sit_in_their_state_queue() {
    let rig = Rig::new(1);
    let task = rig.ready_task();

    // No workers connected: the job waits unattached.
    let job = rig.job_mgr.create_job(&task);
    assert_eq!(job.state(), JobState::Created);

    wait_until("job parked in holding line", || {
        rig.job_mgr
            .jobs_with_state(JobState::Created)
            .iter()
            .any(|j| j.id() == job.id())
    });

    for state in [JobState::Prepared, JobState::Inflight, JobState::Completed, JobState::Failed] {
        for queued in rig.job_mgr.jobs_with_state(state) {
            assert_eq!(queued.state(), state);
        }
    }
    rig.teardown();
}

#[test]
fn scheduler_dispatches_to_connected_worker() {
    let rig = Rig::new(2);
    let mut rx = rig.connect_worker("w1");
    let task = rig.ready_task();

    task.try_schedule(&rig.job_mgr).unwrap();

    wait_until("job dispatched", || {
        !rig.job_mgr.jobs_with_state(JobState::Inflight).is_empty()
    });

    // The channel carries the task setup followed by the test itself.
    wait_until("frames on channel", || rx.try_recv().is_ok());
    rig.teardown();
}

#[test]
fn result_round_trip_hardens_and_spawns_successor() {
    let rig = Rig::new(2);
    let mut rx = rig.connect_worker("w1");
    let task = rig.ready_task();

    task.try_schedule(&rig.job_mgr).unwrap();

    wait_until("first job inflight", || {
        !rig.job_mgr.jobs_with_state(JobState::Inflight).is_empty()
    });
    let job = rig.job_mgr.jobs_with_state(JobState::Inflight).remove(0);

    rig.job_mgr.on_job_result(
        job.id(),
        "SUCCESS",
        Some(r#"{"score": 0.7, "iteration": 0}"#.to_string()),
    );

    wait_until("job hardened", || job.state() == JobState::Hardened);

    // The training loop continues: a successor is dispatched.
    wait_until("successor run_test frame", || {
        let mut seen = 0;
        while let Ok(envelope) = rx.try_recv() {
            if envelope.method == METHOD_RUN_TEST {
                seen += 1;
            }
        }
        seen > 0
    });
    rig.teardown();
}

#[test]
fn failed_result_retries_then_escalates() {
    let rig = Rig::new(2);
    let _rx = rig.connect_worker("w1");
    let task = rig.ready_task();
    task.try_schedule(&rig.job_mgr).unwrap();

    wait_until("job inflight", || {
        !rig.job_mgr.jobs_with_state(JobState::Inflight).is_empty()
    });
    let job = rig.job_mgr.jobs_with_state(JobState::Inflight).remove(0);

    // failures_limit is 2: the third failure is strictly more.
    for _ in 0..3 {
        wait_until("job inflight again", || {
            rig.job_mgr
                .jobs_with_state(JobState::Inflight)
                .iter()
                .any(|j| j.id() == job.id())
        });
        rig.job_mgr.on_job_result(job.id(), "UNKNOWN_ERROR", None);
    }

    wait_until("job failed permanently", || job.state() == JobState::Failed);
    assert_eq!(job.failure_count(), 3);
    rig.teardown();
}

#[test]
fn stop_task_jobs_force_fails_matching_generation() {
    let rig = Rig::new(1);
    let task = rig.ready_task();

    let job = rig.job_mgr.create_job(&task);
    let generation = job.task_generation();

    rig.job_mgr.stop_task_jobs(task.id(), generation);

    assert_eq!(job.state(), JobState::Failed);
    assert!(job
        .failure_reasons()
        .iter()
        .any(|r| r.contains("stale generation")));
    assert!(rig
        .job_mgr
        .jobs_with_state(JobState::Failed)
        .iter()
        .any(|j| j.id() == job.id()));
    rig.teardown();
}

#[test]
fn stop_task_jobs_spares_other_generations() {
    let rig = Rig::new(1);
    let task = rig.ready_task();

    let job = rig.job_mgr.create_job(&task);
    rig.job_mgr.stop_task_jobs(task.id(), job.task_generation() + 1);

    assert_ne!(job.state(), JobState::Failed);
    rig.teardown();
}

#[test]
fn on_worker_lost_fails_attached_jobs() {
    let rig = Rig::new(2);
    let _rx = rig.connect_worker("w1");
    let task = rig.ready_task();
    task.try_schedule(&rig.job_mgr).unwrap();

    wait_until("job inflight", || {
        !rig.job_mgr.jobs_with_state(JobState::Inflight).is_empty()
    });

    rig.job_mgr.on_worker_lost("w1");

    wait_until("job back in holding or failed", || {
        let inflight = rig.job_mgr.jobs_with_state(JobState::Inflight);
        inflight.is_empty()
    });
    rig.teardown();
}

#[test]
fn unknown_result_is_dropped() {
    let rig = Rig::new(1);
    rig.job_mgr.on_job_result(JobId(999), "SUCCESS", None);
    rig.teardown();
}
