// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn envelope_serializes_method_and_kwargs() {
    let envelope = RpcEnvelope::new(
        METHOD_RUN_TEST,
        RunTestArgs {
            job_id: 7,
            task_id: 2,
            generation: 3,
            args: "{}".to_string(),
            seed: 99,
        },
    )
    .unwrap();

    let wire: serde_json::Value = serde_json::to_value(&envelope).unwrap();
    assert_eq!(wire["method"], json!("run_test"));
    assert_eq!(wire["kwargs"]["job_id"], json!(7));

    let back: RpcEnvelope = serde_json::from_value(wire).unwrap();
    let args: RunTestArgs = back.parse_kwargs().unwrap();
    assert_eq!(args.seed, 99);
}

#[test]
fn envelope_tolerates_missing_kwargs() {
    let envelope: RpcEnvelope = serde_json::from_str(r#"{"method": "ping"}"#).unwrap();
    assert_eq!(envelope.method, METHOD_PING);
    assert!(envelope.kwargs.is_null());
}

#[test]
fn reply_flattens_extra_fields() {
    let reply = RpcReply::success()
        .with_field("job_id", 4u64)
        .with_field("payload", "result-text");

    let wire = serde_json::to_string(&reply).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&wire).unwrap();
    assert_eq!(parsed["result"], json!("SUCCESS"));
    assert_eq!(parsed["job_id"], json!(4));

    let back: RpcReply = serde_json::from_str(&wire).unwrap();
    assert!(back.is_success());
    assert_eq!(back.field_u64("job_id"), Some(4));
    assert_eq!(back.field_str("payload"), Some("result-text"));
}

#[test]
fn free_form_reply_is_not_success() {
    let reply = RpcReply::error("task 3 not built");
    assert!(!reply.is_success());
    assert_eq!(reply.result, "task 3 not built");
}

#[test]
fn register_request_uses_memory_mb_wire_name() {
    let request = RegisterRequest {
        name: "w1".to_string(),
        version: 1,
        cpus: 2,
        memory_mb: 256,
    };
    let wire = serde_json::to_value(&request).unwrap();
    assert_eq!(wire["memoryMB"], json!(256));
}

#[test]
fn worker_auth_round_trips_token() {
    let auth = WorkerAuth {
        name: "w1".to_string(),
        session_token: ct_core::SessionToken(0x0000_0001_dead_beef),
    };
    let wire = serde_json::to_string(&auth).unwrap();
    let back: WorkerAuth = serde_json::from_str(&wire).unwrap();
    assert_eq!(back, auth);
}

#[test]
fn abort_jobs_kwargs_default_to_all_tasks() {
    let envelope: RpcEnvelope =
        serde_json::from_str(r#"{"method": "abort_jobs", "kwargs": {}}"#).unwrap();
    let args: AbortJobsArgs = envelope.parse_kwargs().unwrap();
    assert_eq!(args.task_name, None);
}
