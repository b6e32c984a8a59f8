// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity: one parameter-tuning experiment and its state machine.
//!
//! Transitions are serialized by the per-task operation mutex and fail
//! fast on collision; queries only take the reader lock. Every successful
//! transition bumps the task generation, which tags outstanding jobs so a
//! reconfig or stop can invalidate stale work.

use crate::exec;
use ct_core::{ObjectModel, OperationInProgress, SettingsStore, TaskId};
use ct_modules::{
    build_tree, collect_spec, next_submodule_needed, ConfigMap, ConfigSpecElement, ManagerModule,
    ModuleError, Registries, SelectionMap, SpecKind, BUILD_DIR_KEY,
};
use ct_wire::SetupTaskArgs;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskState {
    Uninitiated,
    Initiated,
    Built,
    Ready,
    Scheduled,
}

ct_core::simple_display! {
    TaskState {
        Uninitiated => "UNINITIATED",
        Initiated => "INITIATED",
        Built => "BUILT",
        Ready => "READY",
        Scheduled => "SCHEDULED",
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {task_id} is {got}, expected {expected}")]
    WrongState { task_id: TaskId, expected: &'static str, got: TaskState },

    #[error("another operation is in progress for this task")]
    OperationInProgress(#[from] OperationInProgress),

    #[error("malformed config payload: {0}")]
    MalformedConfig(String),

    #[error("task module not instantiated")]
    ModuleMissing,

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Exec(#[from] exec::ExecError),
}

/// Read-only copy of a task's full state.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub name: String,
    pub description: String,
    pub module_name: String,
    pub state: TaskState,
    pub generation: u64,
    pub worker_init: SelectionMap,
    pub manager_init: SelectionMap,
    pub worker_build_config: ConfigMap,
    pub manager_build_config: ConfigMap,
    pub worker_config: ConfigMap,
    pub manager_config: ConfigMap,
}

struct TaskFields {
    state: TaskState,
    worker_init: SelectionMap,
    manager_init: SelectionMap,
    worker_build_config: ConfigMap,
    manager_build_config: ConfigMap,
    worker_config: ConfigMap,
    manager_config: ConfigMap,
    manager_module: Option<Box<dyn ManagerModule>>,
}

pub struct TestTask {
    id: TaskId,
    name: String,
    description: String,
    module_name: String,
    registries: Arc<Registries>,
    settings: Arc<SettingsStore>,
    model: ObjectModel<TaskFields>,
}

impl std::fmt::Debug for TestTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("module_name", &self.module_name)
            .finish_non_exhaustive()
    }
}

impl TestTask {
    pub fn new(
        id: TaskId,
        name: String,
        description: String,
        module_name: String,
        registries: Arc<Registries>,
        settings: Arc<SettingsStore>,
    ) -> Result<Self, ModuleError> {
        registries.validate_module(&module_name)?;

        info!(task = %id, module = %module_name, "task created");
        Ok(Self {
            id,
            name,
            description,
            module_name,
            registries,
            settings,
            model: ObjectModel::new(TaskFields {
                state: TaskState::Uninitiated,
                worker_init: SelectionMap::new(),
                manager_init: SelectionMap::new(),
                worker_build_config: ConfigMap::new(),
                manager_build_config: ConfigMap::new(),
                worker_config: ConfigMap::new(),
                manager_config: ConfigMap::new(),
                manager_module: None,
            }),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn state(&self) -> TaskState {
        self.model.read().state
    }

    pub fn generation(&self) -> u64 {
        self.model.generation()
    }

    /// One `init` round: store the selections and report the first unfilled
    /// slot on each side, or flip to `INITIATED` when both sides resolve.
    ///
    /// Re-running `init` on an initiated task with a complete selection map
    /// is a no-op returning `(None, None)`.
    pub fn try_init(
        &self,
        worker_init: SelectionMap,
        manager_init: SelectionMap,
    ) -> Result<(Option<ConfigSpecElement>, Option<ConfigSpecElement>), TaskError> {
        let _op = self.model.perform_operation()?;

        let state = self.model.read().state;

        let worker_builder = self.registries.worker.module(&self.module_name)?;
        let manager_builder = self.registries.manager.module(&self.module_name)?;

        let worker_needed = next_submodule_needed(
            &self.registries.worker,
            worker_builder.as_ref(),
            &worker_init,
            "",
        )?;
        let manager_needed = next_submodule_needed(
            &self.registries.manager,
            manager_builder.as_ref(),
            &manager_init,
            "",
        )?;

        match state {
            TaskState::Uninitiated => {}
            TaskState::Initiated if worker_needed.is_none() && manager_needed.is_none() => {
                return Ok((None, None));
            }
            got => {
                return Err(TaskError::WrongState {
                    task_id: self.id,
                    expected: "UNINITIATED",
                    got,
                });
            }
        }

        {
            let mut fields = self.model.write();
            fields.worker_init = worker_init;
            fields.manager_init = manager_init;
        }

        if worker_needed.is_none() && manager_needed.is_none() {
            let module = {
                let fields = self.model.read();
                build_tree(
                    &self.registries.manager,
                    manager_builder.as_ref(),
                    &fields.manager_init,
                    "",
                )?
            };
            self.model.write().manager_module = Some(module);
            self.set_state(TaskState::Initiated);
        }

        Ok((worker_needed, manager_needed))
    }

    /// Apply the build config and run the manager-side build.
    pub fn try_build(&self, config: &Value) -> Result<(), TaskError> {
        let _op = self.model.perform_operation()?;
        self.expect_state(TaskState::Initiated, "INITIATED")?;

        let (mut worker_branch, mut manager_branch) =
            split_branches(config, "worker_build_config", "manager_build_config")?;

        // Inject the process-wide build directory into both branches.
        let build_dir = self.settings.snapshot().build_dir.display().to_string();
        worker_branch.insert(BUILD_DIR_KEY.to_string(), Value::String(build_dir.clone()));
        manager_branch.insert(BUILD_DIR_KEY.to_string(), Value::String(build_dir));

        self.validate_worker_branch(SpecKind::Build, &worker_branch)?;

        let mut module = self.take_module()?;
        let outcome = exec::block_on(async {
            module.configure_build(&manager_branch, "").await?;
            module.build().await
        })?;
        self.model.write().manager_module = Some(module);
        outcome?;

        {
            let mut fields = self.model.write();
            fields.worker_build_config = worker_branch;
            fields.manager_build_config = manager_branch;
        }
        self.set_state(TaskState::Built);
        Ok(())
    }

    /// Apply the runtime config.
    pub fn try_config(&self, config: &Value) -> Result<(), TaskError> {
        let _op = self.model.perform_operation()?;
        self.expect_state(TaskState::Built, "BUILT")?;

        let (worker_branch, manager_branch) =
            split_branches(config, "worker_config", "manager_config")?;

        self.validate_worker_branch(SpecKind::Config, &worker_branch)?;

        let mut module = self.take_module()?;
        let outcome = exec::block_on(module.configure(&manager_branch, ""))?;
        self.model.write().manager_module = Some(module);
        outcome?;

        {
            let mut fields = self.model.write();
            fields.worker_config = worker_branch;
            fields.manager_config = manager_branch;
        }
        self.set_state(TaskState::Ready);
        Ok(())
    }

    /// Drop back to `BUILT` for re-configuration, aborting any in-flight
    /// jobs of the current generation first.
    pub fn try_reconfig(&self, scheduler: &crate::job_mgr::JobMgr) -> Result<(), TaskError> {
        let _op = self.model.perform_operation()?;

        let state = self.model.read().state;
        match state {
            TaskState::Scheduled => {
                scheduler.stop_task_jobs(self.id, self.model.generation());
            }
            TaskState::Ready => {}
            got => {
                return Err(TaskError::WrongState {
                    task_id: self.id,
                    expected: "READY|SCHEDULED",
                    got,
                });
            }
        }

        self.set_state(TaskState::Built);
        Ok(())
    }

    /// Start dispatching jobs.
    pub fn try_schedule(self: &Arc<Self>, scheduler: &crate::job_mgr::JobMgr) -> Result<(), TaskError> {
        {
            let _op = self.model.perform_operation()?;
            self.expect_state(TaskState::Ready, "READY")?;
            self.set_state(TaskState::Scheduled);
        }
        scheduler.seed_task_jobs(self);
        Ok(())
    }

    /// Stop dispatching and abort this generation's in-flight jobs.
    pub fn try_stop(&self, scheduler: &crate::job_mgr::JobMgr) -> Result<(), TaskError> {
        let _op = self.model.perform_operation()?;
        self.expect_state(TaskState::Scheduled, "SCHEDULED")?;

        scheduler.stop_task_jobs(self.id, self.model.generation());
        self.set_state(TaskState::Ready);
        Ok(())
    }

    /// Concatenated runtime config specs for both sides.
    pub fn config_spec(
        &self,
    ) -> Result<(Vec<ConfigSpecElement>, Vec<ConfigSpecElement>), TaskError> {
        self.collect_both(SpecKind::Config)
    }

    /// Concatenated build config specs for both sides.
    pub fn build_spec(
        &self,
    ) -> Result<(Vec<ConfigSpecElement>, Vec<ConfigSpecElement>), TaskError> {
        self.collect_both(SpecKind::Build)
    }

    /// Everything a worker needs to materialize this task's worker side.
    pub fn setup_args(&self) -> Result<SetupTaskArgs, TaskError> {
        let fields = self.model.read();
        if !matches!(fields.state, TaskState::Ready | TaskState::Scheduled) {
            return Err(TaskError::WrongState {
                task_id: self.id,
                expected: "READY|SCHEDULED",
                got: fields.state,
            });
        }

        Ok(SetupTaskArgs {
            task_id: self.id.as_u64(),
            task_name: self.name.clone(),
            generation: self.model.generation(),
            module_name: self.module_name.clone(),
            worker_init: fields.worker_init.clone(),
            build_config: Value::Object(fields.worker_build_config.clone()),
            config: Value::Object(fields.worker_config.clone()),
        })
    }

    /// Ask the manager-side module for the next test's args payload.
    pub fn prepare_test_args(&self) -> Result<String, TaskError> {
        let fields = self.model.read();
        let module = fields.manager_module.as_ref().ok_or(TaskError::ModuleMissing)?;
        Ok(exec::block_on(module.prepare_test_args())??)
    }

    /// Fold a completed test's result back into the manager-side module.
    pub fn sync_test_results(&self, payload: &str) -> Result<(), TaskError> {
        let fields = self.model.read();
        let module = fields.manager_module.as_ref().ok_or(TaskError::ModuleMissing)?;
        exec::block_on(module.sync_test_results(payload))??;
        Ok(())
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let fields = self.model.read();
        TaskSnapshot {
            task_id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            module_name: self.module_name.clone(),
            state: fields.state,
            generation: self.model.generation(),
            worker_init: fields.worker_init.clone(),
            manager_init: fields.manager_init.clone(),
            worker_build_config: fields.worker_build_config.clone(),
            manager_build_config: fields.manager_build_config.clone(),
            worker_config: fields.worker_config.clone(),
            manager_config: fields.manager_config.clone(),
        }
    }

    fn expect_state(&self, expected: TaskState, label: &'static str) -> Result<(), TaskError> {
        let got = self.model.read().state;
        if got != expected {
            return Err(TaskError::WrongState { task_id: self.id, expected: label, got });
        }
        Ok(())
    }

    fn set_state(&self, new_state: TaskState) {
        let old_state = {
            let mut fields = self.model.write();
            std::mem::replace(&mut fields.state, new_state)
        };
        let generation = self.model.bump_generation();
        info!(task = %self.id, from = %old_state, to = %new_state, generation, "task state changed");
    }

    fn take_module(&self) -> Result<Box<dyn ManagerModule>, TaskError> {
        self.model.write().manager_module.take().ok_or(TaskError::ModuleMissing)
    }

    fn validate_worker_branch(
        &self,
        kind: SpecKind,
        branch: &ConfigMap,
    ) -> Result<(), TaskError> {
        let builder = self.registries.worker.module(&self.module_name)?;
        let fields = self.model.read();
        let spec = collect_spec(
            &self.registries.worker,
            builder.as_ref(),
            &fields.worker_init,
            "",
            kind,
        )?;
        ct_modules::validate_config(&spec, branch)?;
        Ok(())
    }

    fn collect_both(
        &self,
        kind: SpecKind,
    ) -> Result<(Vec<ConfigSpecElement>, Vec<ConfigSpecElement>), TaskError> {
        let fields = self.model.read();
        let worker_builder = self.registries.worker.module(&self.module_name)?;
        let manager_builder = self.registries.manager.module(&self.module_name)?;

        let worker = collect_spec(
            &self.registries.worker,
            worker_builder.as_ref(),
            &fields.worker_init,
            "",
            kind,
        )?;
        let manager = collect_spec(
            &self.registries.manager,
            manager_builder.as_ref(),
            &fields.manager_init,
            "",
            kind,
        )?;
        Ok((worker, manager))
    }
}

/// Pull the two side branches out of a nested config payload.
fn split_branches(
    config: &Value,
    worker_key: &str,
    manager_key: &str,
) -> Result<(ConfigMap, ConfigMap), TaskError> {
    let object = config
        .as_object()
        .ok_or_else(|| TaskError::MalformedConfig("payload must be a JSON object".into()))?;

    let branch = |key: &str| -> Result<ConfigMap, TaskError> {
        match object.get(key) {
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(TaskError::MalformedConfig(format!("{key} must be an object"))),
            None => Err(TaskError::MalformedConfig(format!("missing {key}"))),
        }
    };

    Ok((branch(worker_key)?, branch(manager_key)?))
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
