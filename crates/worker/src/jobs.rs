// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local job-execution pool.
//!
//! Holds the worker-side module runtimes materialized per task generation,
//! runs tests for the channel dispatcher, and supports operator-driven
//! aborts and a jobs-block switch.

use ct_modules::{build_tree, ConfigMap, Registries, SelectionMap, WorkerModule};
use ct_wire::{RunTestArgs, SetupTaskArgs};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct TaskRuntime {
    task_name: String,
    generation: u64,
    module: Arc<dyn WorkerModule>,
}

struct InflightJob {
    task_id: u64,
    task_name: String,
    cancel: CancellationToken,
}

/// The worker-side execution pool.
pub struct JobPool {
    registries: Arc<Registries>,
    tasks: Mutex<HashMap<u64, TaskRuntime>>,
    inflight: Mutex<HashMap<u64, InflightJob>>,
    blocked: AtomicBool,
}

impl JobPool {
    pub fn new(registries: Arc<Registries>) -> Arc<Self> {
        Arc::new(Self {
            registries,
            tasks: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            blocked: AtomicBool::new(false),
        })
    }

    /// Materialize a task's worker-side module tree for one generation.
    ///
    /// Replaces any runtime held for an earlier generation of the task.
    pub async fn setup_task(&self, args: SetupTaskArgs) -> Result<(), String> {
        let builder = self
            .registries
            .worker
            .module(&args.module_name)
            .map_err(|e| e.to_string())?;

        let selection: SelectionMap = args.worker_init.clone();
        let mut module = build_tree(&self.registries.worker, builder.as_ref(), &selection, "")
            .map_err(|e| e.to_string())?;

        let build_config = as_branch(&args.build_config)?;
        let config = as_branch(&args.config)?;

        module
            .configure_build(&build_config, "")
            .await
            .map_err(|e| e.to_string())?;
        module.build().await.map_err(|e| e.to_string())?;
        module.configure(&config, "").await.map_err(|e| e.to_string())?;

        info!(
            task = args.task_id,
            generation = args.generation,
            module = %args.module_name,
            "task runtime materialized"
        );
        self.tasks.lock().insert(
            args.task_id,
            TaskRuntime {
                task_name: args.task_name,
                generation: args.generation,
                module: Arc::from(module),
            },
        );
        Ok(())
    }

    /// Execute one test synchronously from the dispatcher's point of view.
    pub async fn run_test(&self, args: RunTestArgs) -> Result<String, String> {
        if self.blocked.load(Ordering::Acquire) {
            return Err("jobs are blocked on this worker".to_string());
        }

        let (module, task_name) = {
            let tasks = self.tasks.lock();
            let runtime = tasks
                .get(&args.task_id)
                .filter(|r| r.generation == args.generation)
                .ok_or_else(|| {
                    format!(
                        "task {} generation {} not configured on this worker",
                        args.task_id, args.generation
                    )
                })?;
            (Arc::clone(&runtime.module), runtime.task_name.clone())
        };

        let cancel = CancellationToken::new();
        self.inflight.lock().insert(
            args.job_id,
            InflightJob { task_id: args.task_id, task_name, cancel: cancel.clone() },
        );

        let outcome = tokio::select! {
            result = module.run_single_test(&args.args, args.seed) => {
                result.map_err(|e| e.to_string())
            }
            _ = cancel.cancelled() => Err("job aborted by operator".to_string()),
        };

        self.inflight.lock().remove(&args.job_id);
        outcome
    }

    /// Abort in-flight jobs, optionally only those of one task.
    pub fn abort(&self, task_name: Option<&str>) -> usize {
        let inflight = self.inflight.lock();
        let mut aborted = 0;
        for job in inflight.values() {
            if task_name.is_none_or(|name| job.task_name == name) {
                job.cancel.cancel();
                aborted += 1;
            }
        }
        if aborted > 0 {
            warn!(aborted, "in-flight jobs aborted");
        }
        aborted
    }

    /// Drop task runtimes, optionally only one task's.
    pub fn clear_tasks(&self, task_id: Option<u64>) {
        let mut tasks = self.tasks.lock();
        match task_id {
            Some(id) => {
                tasks.remove(&id);
            }
            None => tasks.clear(),
        }
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::Release);
        info!(blocked, "jobs-block switched");
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire)
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn configured_task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Tasks with jobs currently in flight (for state queries).
    pub fn inflight_tasks(&self) -> Vec<u64> {
        let inflight = self.inflight.lock();
        let mut ids: Vec<u64> = inflight.values().map(|j| j.task_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

fn as_branch(value: &Value) -> Result<ConfigMap, String> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(ConfigMap::new()),
        _ => Err("config branch must be a JSON object".to_string()),
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
