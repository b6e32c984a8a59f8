// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task registry: owns every task and fronts the engine's operations.

use crate::job_mgr::JobMgr;
use crate::task::{TaskError, TaskSnapshot, TaskState, TestTask};
use ct_core::{IdGen, SettingsStore, TaskId};
use ct_modules::{ConfigSpecElement, ModuleError, Registries, SelectionMap};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TaskMgrError {
    #[error("unknown task id: {0}")]
    UnknownTask(TaskId),

    #[error("task name already in use: {0}")]
    NameConflict(String),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Identity-only task listing entry.
#[derive(Debug, Clone)]
pub struct TaskListing {
    pub task_id: TaskId,
    pub name: String,
    pub description: String,
    pub module_name: String,
    pub state: TaskState,
}

pub struct TaskMgr {
    registries: Arc<Registries>,
    settings: Arc<SettingsStore>,
    job_mgr: Arc<JobMgr>,
    tasks: RwLock<HashMap<TaskId, Arc<TestTask>>>,
    id_gen: IdGen,
}

impl TaskMgr {
    pub fn new(
        registries: Arc<Registries>,
        settings: Arc<SettingsStore>,
        job_mgr: Arc<JobMgr>,
    ) -> Arc<Self> {
        info!("task manager started");
        Arc::new(Self {
            registries,
            settings,
            job_mgr,
            tasks: RwLock::new(HashMap::new()),
            id_gen: IdGen::new(),
        })
    }

    /// Create a task in `UNINITIATED`.
    pub fn create(
        &self,
        name: String,
        description: String,
        module_name: String,
    ) -> Result<TaskId, TaskMgrError> {
        let mut tasks = self.tasks.write();
        if tasks.values().any(|t| t.name() == name) {
            return Err(TaskMgrError::NameConflict(name));
        }

        let id = TaskId(self.id_gen.next());
        let task = TestTask::new(
            id,
            name,
            description,
            module_name,
            Arc::clone(&self.registries),
            Arc::clone(&self.settings),
        )?;
        tasks.insert(id, Arc::new(task));
        Ok(id)
    }

    pub fn get(&self, task_id: TaskId) -> Result<Arc<TestTask>, TaskMgrError> {
        self.tasks
            .read()
            .get(&task_id)
            .cloned()
            .ok_or(TaskMgrError::UnknownTask(task_id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<TestTask>> {
        self.tasks.read().values().find(|t| t.name() == name).cloned()
    }

    pub fn init(
        &self,
        task_id: TaskId,
        worker_init: SelectionMap,
        manager_init: SelectionMap,
    ) -> Result<(Option<ConfigSpecElement>, Option<ConfigSpecElement>), TaskMgrError> {
        Ok(self.get(task_id)?.try_init(worker_init, manager_init)?)
    }

    pub fn build(&self, task_id: TaskId, config: &Value) -> Result<(), TaskMgrError> {
        Ok(self.get(task_id)?.try_build(config)?)
    }

    pub fn config(&self, task_id: TaskId, config: &Value) -> Result<(), TaskMgrError> {
        Ok(self.get(task_id)?.try_config(config)?)
    }

    pub fn reconfig(&self, task_id: TaskId) -> Result<(), TaskMgrError> {
        Ok(self.get(task_id)?.try_reconfig(&self.job_mgr)?)
    }

    pub fn schedule(&self, task_id: TaskId) -> Result<(), TaskMgrError> {
        Ok(self.get(task_id)?.try_schedule(&self.job_mgr)?)
    }

    pub fn stop(&self, task_id: TaskId) -> Result<(), TaskMgrError> {
        Ok(self.get(task_id)?.try_stop(&self.job_mgr)?)
    }

    pub fn config_spec(
        &self,
        task_id: TaskId,
    ) -> Result<(Vec<ConfigSpecElement>, Vec<ConfigSpecElement>), TaskMgrError> {
        Ok(self.get(task_id)?.config_spec()?)
    }

    pub fn build_spec(
        &self,
        task_id: TaskId,
    ) -> Result<(Vec<ConfigSpecElement>, Vec<ConfigSpecElement>), TaskMgrError> {
        Ok(self.get(task_id)?.build_spec()?)
    }

    /// Identity and state of every task, ordered by id.
    pub fn query_minimal(&self) -> Vec<TaskListing> {
        let tasks = self.tasks.read();
        let mut listings: Vec<TaskListing> = tasks
            .values()
            .map(|task| {
                let snapshot = task.snapshot();
                TaskListing {
                    task_id: snapshot.task_id,
                    name: snapshot.name,
                    description: snapshot.description,
                    module_name: snapshot.module_name,
                    state: snapshot.state,
                }
            })
            .collect();
        listings.sort_by_key(|l| l.task_id);
        listings
    }

    pub fn query_full(&self, task_id: TaskId) -> Result<TaskSnapshot, TaskMgrError> {
        Ok(self.get(task_id)?.snapshot())
    }
}

#[cfg(test)]
#[path = "task_mgr_tests.rs"]
mod tests;
