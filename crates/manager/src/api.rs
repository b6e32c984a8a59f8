// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager HTTP surface: a thin adapter from JSON bodies onto the domain
//! layer.
//!
//! Handlers never propagate errors to the transport: every domain failure
//! becomes a structured reply with the error text in `result` (and
//! `task_id = -1` where applicable). Domain calls hop through
//! `spawn_blocking` because the engine is synchronous and may block on
//! entity locks.

use crate::channel;
use crate::components::ManagerComponents;
use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use ct_core::{ResultCode, TaskId};
use ct_modules::ConfigSpecElement;
use ct_wire::api::{
    BuildSpecReply, ConfigSpecReply, ModulesReply, SimpleReply, SubmodulesReply, TaskConfigRequest,
    TaskCreateReply, TaskCreateRequest, TaskFullReply, TaskIdRequest, TaskInitReply,
    TaskInitRequest, TaskMinimalEntry, TaskMinimalReply,
};
use ct_wire::{CommandResult, RegisterReply, RegisterRequest, WorkerAuth};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

const SUCCESS: &str = "SUCCESS";

pub fn router(components: Arc<ManagerComponents>) -> Router {
    Router::new()
        .route("/orchestrator/task/create", post(task_create))
        .route("/orchestrator/task/init", post(task_init))
        .route("/orchestrator/task/build", post(task_build))
        .route("/orchestrator/task/config", post(task_config))
        .route("/orchestrator/task/reconfig", post(task_reconfig))
        .route("/orchestrator/task/schedule", post(task_schedule))
        .route("/orchestrator/task/stop", post(task_stop))
        .route("/orchestrator/task/query/minimal", post(task_query_minimal))
        .route("/orchestrator/task/query/full", post(task_query_full))
        .route("/orchestrator/task/config/spec", post(task_config_spec))
        .route("/orchestrator/task/build/spec", post(task_build_spec))
        .route("/orchestrator/modules/get/available", get(modules_available))
        .route("/orchestrator/submodules/get/active", get(submodules_active))
        .route("/worker/register", post(worker_register))
        .route("/worker/unregister", delete(worker_unregister))
        .route("/worker/bump_ka", post(worker_bump_ka))
        .route("/worker/perform-test", get(channel::perform_test))
        .with_state(components)
}

/// Run a synchronous domain call off the async executor.
async fn run_blocking<T, F>(fallback: impl FnOnce() -> T, work: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, "domain call aborted");
            fallback()
        }
    }
}

fn spec_json(elements: Vec<ConfigSpecElement>) -> Option<Value> {
    serde_json::to_value(elements).ok()
}

async fn task_create(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskCreateRequest>,
) -> Json<TaskCreateReply> {
    let reply = run_blocking(
        || TaskCreateReply { result: ResultCode::UnknownError.as_str().to_string(), task_id: -1 },
        move || {
            match components.task_mgr().create(
                request.name,
                request.description,
                request.module_name,
            ) {
                Ok(task_id) => TaskCreateReply {
                    result: SUCCESS.to_string(),
                    task_id: task_id.as_u64() as i64,
                },
                Err(e) => TaskCreateReply { result: e.to_string(), task_id: -1 },
            }
        },
    )
    .await;
    Json(reply)
}

async fn task_init(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskInitRequest>,
) -> Json<TaskInitReply> {
    let reply = run_blocking(
        || TaskInitReply {
            result: ResultCode::UnknownError.as_str().to_string(),
            worker_init_spec: None,
            manager_init_spec: None,
        },
        move || {
            match components.task_mgr().init(
                TaskId(request.task_id),
                request.worker_init,
                request.manager_init,
            ) {
                Ok((worker_needed, manager_needed)) => TaskInitReply {
                    result: SUCCESS.to_string(),
                    worker_init_spec: worker_needed.and_then(|e| serde_json::to_value(e).ok()),
                    manager_init_spec: manager_needed.and_then(|e| serde_json::to_value(e).ok()),
                },
                Err(e) => TaskInitReply {
                    result: e.to_string(),
                    worker_init_spec: None,
                    manager_init_spec: None,
                },
            }
        },
    )
    .await;
    Json(reply)
}

async fn task_build(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskConfigRequest>,
) -> Json<SimpleReply> {
    simple_task_op(move || {
        components.task_mgr().build(TaskId(request.task_id), &request.config).map_err(|e| e.to_string())
    })
    .await
}

async fn task_config(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskConfigRequest>,
) -> Json<SimpleReply> {
    simple_task_op(move || {
        components.task_mgr().config(TaskId(request.task_id), &request.config).map_err(|e| e.to_string())
    })
    .await
}

async fn task_reconfig(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskIdRequest>,
) -> Json<SimpleReply> {
    simple_task_op(move || {
        components.task_mgr().reconfig(TaskId(request.task_id)).map_err(|e| e.to_string())
    })
    .await
}

async fn task_schedule(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskIdRequest>,
) -> Json<SimpleReply> {
    simple_task_op(move || {
        components.task_mgr().schedule(TaskId(request.task_id)).map_err(|e| e.to_string())
    })
    .await
}

async fn task_stop(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskIdRequest>,
) -> Json<SimpleReply> {
    simple_task_op(move || {
        components.task_mgr().stop(TaskId(request.task_id)).map_err(|e| e.to_string())
    })
    .await
}

async fn simple_task_op<F>(work: F) -> Json<SimpleReply>
where
    F: FnOnce() -> Result<(), String> + Send + 'static,
{
    let reply = run_blocking(
        || SimpleReply { result: ResultCode::UnknownError.as_str().to_string() },
        move || match work() {
            Ok(()) => SimpleReply { result: SUCCESS.to_string() },
            Err(message) => SimpleReply { result: message },
        },
    )
    .await;
    Json(reply)
}

async fn task_query_minimal(
    State(components): State<Arc<ManagerComponents>>,
) -> Json<TaskMinimalReply> {
    let reply = run_blocking(
        || TaskMinimalReply { queries: Vec::new() },
        move || {
            let queries = components
                .task_mgr()
                .query_minimal()
                .into_iter()
                .map(|listing| TaskMinimalEntry {
                    task_id: listing.task_id.as_u64(),
                    name: listing.name,
                    description: listing.description,
                    module_name: listing.module_name,
                    task_state: listing.state.to_string(),
                })
                .collect();
            TaskMinimalReply { queries }
        },
    )
    .await;
    Json(reply)
}

async fn task_query_full(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskIdRequest>,
) -> Json<TaskFullReply> {
    fn empty(result: String) -> TaskFullReply {
        TaskFullReply {
            result,
            task_id: None,
            name: None,
            description: None,
            module_name: None,
            task_state: None,
            generation: None,
            worker_init: None,
            manager_init: None,
            worker_build_config: None,
            manager_build_config: None,
            worker_config: None,
            manager_config: None,
        }
    }

    let reply = run_blocking(
        || empty(ResultCode::UnknownError.as_str().to_string()),
        move || match components.task_mgr().query_full(TaskId(request.task_id)) {
            Ok(snapshot) => TaskFullReply {
                result: SUCCESS.to_string(),
                task_id: Some(snapshot.task_id.as_u64()),
                name: Some(snapshot.name),
                description: Some(snapshot.description),
                module_name: Some(snapshot.module_name),
                task_state: Some(snapshot.state.to_string()),
                generation: Some(snapshot.generation),
                worker_init: Some(snapshot.worker_init),
                manager_init: Some(snapshot.manager_init),
                worker_build_config: Some(Value::Object(snapshot.worker_build_config)),
                manager_build_config: Some(Value::Object(snapshot.manager_build_config)),
                worker_config: Some(Value::Object(snapshot.worker_config)),
                manager_config: Some(Value::Object(snapshot.manager_config)),
            },
            Err(e) => empty(e.to_string()),
        },
    )
    .await;
    Json(reply)
}

async fn task_config_spec(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskIdRequest>,
) -> Json<ConfigSpecReply> {
    let reply = run_blocking(
        || ConfigSpecReply {
            result: ResultCode::UnknownError.as_str().to_string(),
            worker_config_spec: None,
            manager_config_spec: None,
        },
        move || match components.task_mgr().config_spec(TaskId(request.task_id)) {
            Ok((worker, manager)) => ConfigSpecReply {
                result: SUCCESS.to_string(),
                worker_config_spec: spec_json(worker),
                manager_config_spec: spec_json(manager),
            },
            Err(e) => ConfigSpecReply {
                result: e.to_string(),
                worker_config_spec: None,
                manager_config_spec: None,
            },
        },
    )
    .await;
    Json(reply)
}

async fn task_build_spec(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<TaskIdRequest>,
) -> Json<BuildSpecReply> {
    let reply = run_blocking(
        || BuildSpecReply {
            result: ResultCode::UnknownError.as_str().to_string(),
            worker_build_spec: None,
            manager_build_spec: None,
        },
        move || match components.task_mgr().build_spec(TaskId(request.task_id)) {
            Ok((worker, manager)) => BuildSpecReply {
                result: SUCCESS.to_string(),
                worker_build_spec: spec_json(worker),
                manager_build_spec: spec_json(manager),
            },
            Err(e) => BuildSpecReply {
                result: e.to_string(),
                worker_build_spec: None,
                manager_build_spec: None,
            },
        },
    )
    .await;
    Json(reply)
}

async fn modules_available(
    State(components): State<Arc<ManagerComponents>>,
) -> Json<ModulesReply> {
    Json(ModulesReply { modules: components.registries().available_modules() })
}

async fn submodules_active(
    State(components): State<Arc<ManagerComponents>>,
) -> Json<SubmodulesReply> {
    let submodules = components
        .registries()
        .active_submodules()
        .into_iter()
        .collect();
    Json(SubmodulesReply { submodules })
}

async fn worker_register(
    State(components): State<Arc<ManagerComponents>>,
    Json(request): Json<RegisterRequest>,
) -> Json<RegisterReply> {
    let reply = run_blocking(
        || RegisterReply {
            result: ResultCode::UnknownError.as_str().to_string(),
            session_token: 0,
        },
        move || {
            let info = crate::worker::WorkerInfo {
                name: request.name,
                version: request.version,
                cpus: request.cpus,
                memory_mb: request.memory_mb,
            };
            match components.worker_mgr().register(info) {
                Ok(token) => RegisterReply {
                    result: SUCCESS.to_string(),
                    session_token: token.as_u64(),
                },
                Err(e) => RegisterReply { result: e.to_string(), session_token: 0 },
            }
        },
    )
    .await;
    Json(reply)
}

async fn worker_unregister(
    State(components): State<Arc<ManagerComponents>>,
    Json(auth): Json<WorkerAuth>,
) -> Json<CommandResult> {
    let reply = run_blocking(
        || CommandResult::code(ResultCode::UnknownError),
        move || CommandResult::code(components.worker_mgr().unregister(&auth)),
    )
    .await;
    Json(reply)
}

async fn worker_bump_ka(
    State(components): State<Arc<ManagerComponents>>,
    Json(auth): Json<WorkerAuth>,
) -> Json<CommandResult> {
    let reply = run_blocking(
        || CommandResult::code(ResultCode::UnknownError),
        move || CommandResult::code(components.worker_mgr().bump_ka(&auth)),
    )
    .await;
    Json(reply)
}
