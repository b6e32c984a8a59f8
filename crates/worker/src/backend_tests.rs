// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ct_core::{Settings, SettingsStore};
use yare::parameterized;

fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

fn components() -> Arc<WorkerComponents> {
    WorkerComponents::new(
        Arc::new(SettingsStore::new(Settings::default())),
        Box::new(|level| {
            if level == "bogus" {
                Err("invalid log level".to_string())
            } else {
                Ok(())
            }
        }),
    )
}

#[test]
fn connect_parses_required_and_optional_keys() {
    let command = parse(&args(&[
        "--connect",
        "host=mgr:8000",
        "name=w1",
        "cpus=4",
        "memoryMB=2048",
    ]))
    .unwrap();
    assert_eq!(
        command,
        BackendCommand::Connect {
            host: "mgr:8000".to_string(),
            name: "w1".to_string(),
            cpus: Some(4),
            memory_mb: Some(2048),
        }
    );
}

#[test]
fn connect_requires_host_and_name() {
    let err = parse(&args(&["--connect", "host=mgr:8000"])).unwrap_err();
    assert!(err.contains("name"));
}

#[test]
fn connect_rejects_bad_numbers() {
    let err = parse(&args(&["--connect", "host=h", "name=n", "cpus=lots"])).unwrap_err();
    assert!(err.contains("cpus"));
}

#[test]
fn key_value_tokens_must_have_equals() {
    let err = parse(&args(&["--connect", "host"])).unwrap_err();
    assert!(err.contains("key=value"));
}

#[test]
fn duplicate_keys_are_rejected() {
    let err = parse(&args(&["--connect", "host=a", "host=b", "name=n"])).unwrap_err();
    assert!(err.contains("duplicate"));
}

#[parameterized(
    unregister = { "--unregister", BackendCommand::Unregister },
    stop = { "--stop_worker", BackendCommand::StopWorker },
    abort = { "--abort_worker", BackendCommand::AbortWorker },
    query = { "--query_worker_state", BackendCommand::QueryWorkerState },
)]
fn bare_commands_parse(token: &str, expected: BackendCommand) {
    assert_eq!(parse(&args(&[token])).unwrap(), expected);
}

#[test]
fn bare_commands_reject_stray_arguments() {
    let err = parse(&args(&["--stop_worker", "now"])).unwrap_err();
    assert!(err.contains("unexpected"));
}

#[test]
fn set_log_level_takes_one_positional() {
    assert_eq!(
        parse(&args(&["--set_log_level", "debug"])).unwrap(),
        BackendCommand::SetLogLevel { level: "debug".to_string() }
    );
    assert!(parse(&args(&["--set_log_level"])).is_err());
}

#[test]
fn abort_jobs_task_name_is_optional() {
    assert_eq!(
        parse(&args(&["--abort_jobs"])).unwrap(),
        BackendCommand::AbortJobs { task_name: None }
    );
    assert_eq!(
        parse(&args(&["--abort_jobs", "t1"])).unwrap(),
        BackendCommand::AbortJobs { task_name: Some("t1".to_string()) }
    );
}

#[parameterized(
    enable = { "enable", true },
    disable = { "disable", false },
)]
fn switch_jobs_block_parses_type(raw: &str, expected: bool) {
    let command = parse(&args(&["--switch_jobs_block", &format!("type={raw}")])).unwrap();
    assert_eq!(
        command,
        BackendCommand::SwitchJobsBlock { enable: expected, host_name: None }
    );
}

#[test]
fn switch_jobs_block_rejects_other_types() {
    let err = parse(&args(&["--switch_jobs_block", "type=maybe"])).unwrap_err();
    assert!(err.contains("enable or disable"));
}

#[test]
fn unknown_command_is_an_error() {
    let err = parse(&args(&["--frobnicate"])).unwrap_err();
    assert!(err.contains("unknown command"));
}

#[tokio::test]
async fn execute_reports_parse_errors() {
    let reply = execute(&args(&["--frobnicate"]), &components()).await;
    assert!(reply.starts_with("ERROR:"));
}

#[tokio::test]
async fn query_worker_state_reports_unconnected() {
    let reply = execute(&args(&["--query_worker_state"]), &components()).await;
    assert!(reply.starts_with("SUCCESS:"));
    assert!(reply.contains("unconnected"));
    assert!(reply.contains("jobs_blocked=false"));
}

#[tokio::test]
async fn switch_jobs_block_round_trip() {
    let components = components();

    let reply = execute(
        &args(&["--switch_jobs_block", "type=enable"]),
        &components,
    )
    .await;
    assert!(reply.starts_with("SUCCESS:"));
    assert!(components.jobs().is_blocked());

    let reply = execute(
        &args(&["--switch_jobs_block", "type=disable"]),
        &components,
    )
    .await;
    assert!(reply.starts_with("SUCCESS:"));
    assert!(!components.jobs().is_blocked());
}

#[tokio::test]
async fn switch_jobs_block_with_foreign_host_is_refused() {
    let reply = execute(
        &args(&["--switch_jobs_block", "type=enable", "host_name=elsewhere"]),
        &components(),
    )
    .await;
    assert!(reply.starts_with("ERROR:"));
}

#[tokio::test]
async fn set_log_level_routes_through_setter() {
    let components = components();
    let reply = execute(&args(&["--set_log_level", "debug"]), &components).await;
    assert_eq!(reply, "SUCCESS: log level set to debug");

    let reply = execute(&args(&["--set_log_level", "bogus"]), &components).await;
    assert!(reply.starts_with("ERROR:"));
}

#[tokio::test]
async fn abort_jobs_with_idle_pool_reports_zero() {
    let reply = execute(&args(&["--abort_jobs"]), &components()).await;
    assert_eq!(reply, "SUCCESS: aborted 0 job(s)");
}

#[tokio::test]
async fn unregister_without_session_is_an_error() {
    let reply = execute(&args(&["--unregister"]), &components()).await;
    assert!(reply.starts_with("ERROR:"));
    assert!(reply.contains("not connected"));
}

#[tokio::test]
async fn stop_worker_trips_the_gentle_token() {
    let components = components();
    let reply = execute(&args(&["--stop_worker"]), &components).await;
    assert!(reply.starts_with("SUCCESS:"));
    assert!(components.gentle_stop_requested().is_cancelled());
}
