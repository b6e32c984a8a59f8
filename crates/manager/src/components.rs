// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide component holder.
//!
//! Construction order is the dependency order: Settings → Registries →
//! WorkerMgr → JobMgr → TaskMgr; teardown runs in reverse. Everything is
//! passed through call sites explicitly — no global state.

use crate::job_mgr::JobMgr;
use crate::task_mgr::TaskMgr;
use crate::worker_mgr::WorkerMgr;
use ct_core::SettingsStore;
use ct_modules::Registries;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ManagerComponents {
    settings: Arc<SettingsStore>,
    registries: Arc<Registries>,
    worker_mgr: Arc<WorkerMgr>,
    job_mgr: Arc<JobMgr>,
    task_mgr: Arc<TaskMgr>,
}

impl ManagerComponents {
    pub fn start(settings: Arc<SettingsStore>) -> Arc<Self> {
        let registries = Registries::standard();
        let worker_mgr = WorkerMgr::new(Arc::clone(&settings));
        let job_mgr = JobMgr::new(Arc::clone(&settings), Arc::clone(&worker_mgr));
        let task_mgr = TaskMgr::new(
            Arc::clone(&registries),
            Arc::clone(&settings),
            Arc::clone(&job_mgr),
        );

        // Track scheduler sizing across settings re-publishes.
        {
            let job_mgr = Arc::clone(&job_mgr);
            settings.on_change(move |s| {
                if let Err(e) = job_mgr.resize(s.job_threads) {
                    warn!(requested = s.job_threads, error = %e, "ignoring job_threads change");
                }
            });
        }

        info!("manager components started");
        Arc::new(Self { settings, registries, worker_mgr, job_mgr, task_mgr })
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn worker_mgr(&self) -> &Arc<WorkerMgr> {
        &self.worker_mgr
    }

    pub fn job_mgr(&self) -> &Arc<JobMgr> {
        &self.job_mgr
    }

    pub fn task_mgr(&self) -> &Arc<TaskMgr> {
        &self.task_mgr
    }

    /// Tear down in reverse dependency order.
    pub fn shutdown(&self) {
        self.job_mgr.destroy();
        self.worker_mgr.shutdown();
        info!("manager components stopped");
    }
}
