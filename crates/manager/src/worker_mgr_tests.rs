// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::worker::WorkerState;
use ct_core::Settings;
use ct_wire::RpcEnvelope;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn manager_with(settings: Settings) -> Arc<WorkerMgr> {
    WorkerMgr::new(Arc::new(SettingsStore::new(settings)))
}

fn manager() -> Arc<WorkerMgr> {
    // Long audit interval: tests drive audit passes explicitly.
    manager_with(Settings { audit_interval: 60.0, worker_timeout: 60.0, ..Settings::default() })
}

fn info(name: &str) -> WorkerInfo {
    WorkerInfo::builder().name(name).build()
}

fn auth(name: &str, token: SessionToken) -> WorkerAuth {
    WorkerAuth { name: name.to_string(), session_token: token }
}

fn socket() -> (WorkerSocket, mpsc::Receiver<RpcEnvelope>) {
    let (tx, rx) = mpsc::channel(8);
    (WorkerSocket { tx, cancel: CancellationToken::new() }, rx)
}

#[test]
fn register_duplicate_name_is_refused() {
    let mgr = manager();
    mgr.register(info("w1")).unwrap();

    let err = mgr.register(info("w1")).unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::Code(ResultCode::WorkerAlreadyRegistered)
    ));
    mgr.shutdown();
}

#[test]
fn register_duplicate_in_live_map_is_refused() {
    let mgr = manager();
    mgr.register(info("w1")).unwrap();
    mgr.audit_pass();

    let err = mgr.register(info("w1")).unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::Code(ResultCode::WorkerAlreadyRegistered)
    ));
    mgr.shutdown();
}

#[test]
fn tokens_are_unique_across_sessions() {
    let mgr = manager();
    let a = mgr.register(info("w1")).unwrap();
    let b = mgr.register(info("w2")).unwrap();
    assert_ne!(a, b);
    mgr.shutdown();
}

#[test]
fn version_below_minimum_is_refused() {
    let mgr = manager();
    let err = mgr
        .register(WorkerInfo { version: 0, ..info("w1") })
        .unwrap_err();
    assert!(matches!(err, RegistrationError::VersionTooOld { got: 0, .. }));
    mgr.shutdown();
}

#[test]
fn unregister_marks_and_audit_reaps() {
    let mgr = manager();
    let token = mgr.register(info("w1")).unwrap();
    mgr.audit_pass();

    assert_eq!(mgr.unregister(&auth("w1", token)), ResultCode::Success);
    // Marked sessions disappear from lookups immediately.
    assert!(mgr.find("w1").is_none());

    mgr.audit_pass();
    // Double unregister observes WORKER_NOT_FOUND.
    assert_eq!(mgr.unregister(&auth("w1", token)), ResultCode::WorkerNotFound);
    mgr.shutdown();
}

#[test]
fn unregister_with_wrong_token_is_refused() {
    let mgr = manager();
    let token = mgr.register(info("w1")).unwrap();
    let bogus = SessionToken(token.as_u64() ^ 1);

    assert_eq!(mgr.unregister(&auth("w1", bogus)), ResultCode::InvalidToken);
    assert!(mgr.find("w1").is_some());
    mgr.shutdown();
}

#[test]
fn reregistration_after_unregister_gets_fresh_token() {
    let mgr = manager();
    let first = mgr.register(info("w1")).unwrap();
    mgr.audit_pass();
    mgr.unregister(&auth("w1", first));

    let second = mgr.register(info("w1")).unwrap();
    assert_ne!(first, second);
    mgr.shutdown();
}

#[test]
fn bump_ka_validates_token() {
    let mgr = manager();
    let token = mgr.register(info("w1")).unwrap();

    assert_eq!(mgr.bump_ka(&auth("w1", token)), ResultCode::Success);
    assert_eq!(
        mgr.bump_ka(&auth("w1", SessionToken(1))),
        ResultCode::InvalidToken
    );
    assert_eq!(mgr.bump_ka(&auth("ghost", token)), ResultCode::WorkerNotFound);
    mgr.shutdown();
}

#[test]
fn connection_requires_published_registration() {
    let mgr = manager();
    let token = mgr.register(info("w1")).unwrap();

    // Still queued: the live map does not know the name yet.
    let (sock, _rx) = socket();
    assert_eq!(
        mgr.accept_connection(&auth("w1", token), sock),
        ResultCode::WorkerNotFound
    );

    mgr.audit_pass();
    let (sock, _rx) = socket();
    assert_eq!(mgr.accept_connection(&auth("w1", token), sock), ResultCode::Success);

    let worker = mgr.find("w1").unwrap();
    assert_eq!(worker.state(), WorkerState::Connected);
    mgr.shutdown();
}

#[test]
fn second_connection_is_refused() {
    let mgr = manager();
    let token = mgr.register(info("w1")).unwrap();
    mgr.audit_pass();

    let (sock, _rx1) = socket();
    mgr.accept_connection(&auth("w1", token), sock);

    let (sock, _rx2) = socket();
    assert_eq!(
        mgr.accept_connection(&auth("w1", token), sock),
        ResultCode::WorkerAlreadyConnected
    );
    mgr.shutdown();
}

#[test]
fn connection_with_wrong_token_is_refused() {
    let mgr = manager();
    let token = mgr.register(info("w1")).unwrap();
    mgr.audit_pass();

    let (sock, _rx) = socket();
    assert_eq!(
        mgr.accept_connection(&auth("w1", SessionToken(token.as_u64() ^ 2)), sock),
        ResultCode::InvalidToken
    );
    mgr.shutdown();
}

#[test]
fn timed_out_worker_is_reaped_and_name_reusable() {
    let mgr = manager_with(Settings {
        audit_interval: 60.0,
        worker_timeout: 0.0,
        ..Settings::default()
    });
    mgr.register(info("w1")).unwrap();
    mgr.audit_pass();

    // Zero timeout: any inactivity is too much by the next pass.
    std::thread::sleep(std::time::Duration::from_millis(10));
    mgr.audit_pass();
    assert!(mgr.find("w1").is_none());

    assert!(mgr.register(info("w1")).is_ok());
    mgr.shutdown();
}

#[test]
fn connected_workers_lists_only_bonded_sessions() {
    let mgr = manager();
    let token = mgr.register(info("w1")).unwrap();
    mgr.register(info("w2")).unwrap();
    mgr.audit_pass();

    let (sock, _rx) = socket();
    mgr.accept_connection(&auth("w1", token), sock);

    let connected = mgr.connected_workers();
    assert_eq!(connected.len(), 1);
    assert_eq!(connected[0].name(), "w1");
    mgr.shutdown();
}

#[tokio::test]
async fn await_registration_move_returns_after_a_pass() {
    let mgr = manager_with(Settings { audit_interval: 0.01, ..Settings::default() });
    mgr.register(info("w1")).unwrap();

    // The background auditor publishes within an interval or two.
    mgr.await_registration_move().await;
    assert!(mgr.find("w1").is_some());
    mgr.shutdown();
}
