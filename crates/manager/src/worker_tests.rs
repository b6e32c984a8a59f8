// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ct_core::TokenMint;

fn worker() -> Worker {
    Worker::new(WorkerInfo::builder().build(), TokenMint::new().mint())
}

fn socket() -> (WorkerSocket, mpsc::Receiver<RpcEnvelope>) {
    let (tx, rx) = mpsc::channel(8);
    (WorkerSocket { tx, cancel: CancellationToken::new() }, rx)
}

#[test]
fn fresh_worker_is_registered_without_socket() {
    let worker = worker();
    assert_eq!(worker.state(), WorkerState::Registered);
    assert!(worker.channel_sender().is_none());
    assert!(!worker.is_connected());
}

#[test]
fn attach_from_registered_connects() {
    let worker = worker();
    let (sock, _rx) = socket();

    assert_eq!(worker.attach_socket(sock), ResultCode::Success);
    assert_eq!(worker.state(), WorkerState::Connected);
    assert!(worker.is_connected());
}

#[test]
fn second_attach_is_rejected() {
    let worker = worker();
    let (first, _rx1) = socket();
    let (second, _rx2) = socket();

    assert_eq!(worker.attach_socket(first), ResultCode::Success);
    assert_eq!(worker.attach_socket(second), ResultCode::WorkerAlreadyConnected);
}

#[test]
fn attach_after_mark_for_delete_is_rejected() {
    let worker = worker();
    worker.mark_for_delete();

    let (sock, _rx) = socket();
    assert_eq!(worker.attach_socket(sock), ResultCode::WorkerMarkedForDelete);
}

#[test]
fn mark_for_delete_cancels_the_socket() {
    let worker = worker();
    let (sock, _rx) = socket();
    let cancel = sock.cancel.clone();

    worker.attach_socket(sock);
    worker.mark_for_delete();

    assert!(cancel.is_cancelled());
    assert_eq!(worker.state(), WorkerState::MarkedForDelete);
    assert!(worker.channel_sender().is_none());
}

#[test]
fn is_same_ignores_condemned_sessions() {
    let worker = worker();
    assert!(worker.is_same("test-worker"));
    assert!(!worker.is_same("other"));

    worker.mark_for_delete();
    assert!(!worker.is_same("test-worker"));
}

#[test]
fn detach_returns_to_registered_for_reconnect() {
    let worker = worker();
    let (sock, _rx) = socket();
    worker.attach_socket(sock);
    worker.note_task_configured(ct_core::TaskId(1), 3);
    assert_eq!(worker.state(), WorkerState::Configured);

    worker.detach_socket();
    assert_eq!(worker.state(), WorkerState::Registered);
    assert!(!worker.is_task_configured(ct_core::TaskId(1), 3));

    let (sock, _rx) = socket();
    assert_eq!(worker.attach_socket(sock), ResultCode::Success);
}

#[test]
fn configured_tasks_track_generations() {
    let worker = worker();
    let (sock, _rx) = socket();
    worker.attach_socket(sock);

    let task = ct_core::TaskId(7);
    assert!(!worker.is_task_configured(task, 2));
    worker.note_task_configured(task, 2);
    assert!(worker.is_task_configured(task, 2));
    assert!(!worker.is_task_configured(task, 3));
}

#[test]
fn inflight_counter_saturates_at_zero() {
    let worker = worker();
    worker.on_job_started();
    worker.on_job_completed();
    worker.on_job_failed();
    assert_eq!(worker.inflight_jobs(), 0);
}

#[test]
fn inactivity_grows_from_last_bump() {
    let worker = worker();
    worker.bump_activity();
    let now = Instant::now() + Duration::from_secs(5);
    assert!(worker.inactivity(now) >= Duration::from_secs(5));
}
