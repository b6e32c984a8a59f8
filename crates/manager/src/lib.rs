// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ct-manager: the central orchestrator.
//!
//! Owns the task engine, the job scheduler, and the worker registry, and
//! serves the HTTP/WebSocket surface the operator UI and remote workers
//! talk to.
//!
//! Architecture:
//! - Domain objects are thread-safe and synchronous; the async HTTP front
//!   hands requests off with `spawn_blocking`.
//! - Scheduler worker threads are OS threads that drive async module hooks
//!   through a short-lived current-thread runtime.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod api;
pub mod channel;
pub mod components;
pub mod exec;
pub mod job;
pub mod job_mgr;
pub mod task;
pub mod task_mgr;
pub mod worker;
pub mod worker_mgr;

pub use components::ManagerComponents;
pub use job::{FailOutcome, JobError, JobState, RunOutcome, TestJobRequest};
pub use job_mgr::{JobMgr, SchedulerError};
pub use task::{TaskError, TaskSnapshot, TaskState, TestTask};
pub use task_mgr::{TaskListing, TaskMgr, TaskMgrError};
pub use worker::{Worker, WorkerInfo, WorkerSocket, WorkerState};
pub use worker_mgr::{RegistrationError, WorkerMgr, MIN_WORKER_VERSION};
