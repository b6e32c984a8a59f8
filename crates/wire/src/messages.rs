// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager↔Worker channel messages.

use ct_core::{ResultCode, SessionToken};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Methods the Manager may invoke on a Worker. Only names listed here are
/// dispatched; anything else is refused without executing.
pub const METHOD_SETUP_TASK: &str = "setup_task";
pub const METHOD_RUN_TEST: &str = "run_test";
pub const METHOD_ABORT_JOBS: &str = "abort_jobs";
pub const METHOD_PING: &str = "ping";

/// Worker credentials, sent first on every channel and on keep-alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAuth {
    pub name: String,
    pub session_token: SessionToken,
}

/// Minimal reply: a result-taxonomy string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub result: String,
}

impl CommandResult {
    pub fn success() -> Self {
        Self::code(ResultCode::Success)
    }

    pub fn code(code: ResultCode) -> Self {
        Self { result: code.as_str().to_string() }
    }

    pub fn is_success(&self) -> bool {
        self.result == ResultCode::Success.as_str()
    }
}

/// Worker registration request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub version: u32,
    pub cpus: u32,
    #[serde(rename = "memoryMB")]
    pub memory_mb: u64,
}

/// Worker registration reply. `session_token` is zero on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterReply {
    pub result: String,
    pub session_token: u64,
}

/// One channel frame: a method invocation with JSON kwargs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEnvelope {
    pub method: String,
    #[serde(default)]
    pub kwargs: Value,
}

impl RpcEnvelope {
    pub fn new(method: &str, kwargs: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self { method: method.to_string(), kwargs: serde_json::to_value(kwargs)? })
    }

    pub fn parse_kwargs<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.kwargs.clone())
    }
}

/// One channel reply: a result string plus method-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcReply {
    pub result: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl RpcReply {
    pub fn success() -> Self {
        Self::code(ResultCode::Success)
    }

    pub fn code(code: ResultCode) -> Self {
        Self { result: code.as_str().to_string(), fields: serde_json::Map::new() }
    }

    /// A free-form failure outside the taxonomy (module/task errors).
    pub fn error(message: impl Into<String>) -> Self {
        Self { result: message.into(), fields: serde_json::Map::new() }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.result == ResultCode::Success.as_str()
    }

    pub fn field_u64(&self, name: &str) -> Option<u64> {
        self.fields.get(name).and_then(Value::as_u64)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// `setup_task` kwargs: everything a Worker needs to materialize a task's
/// worker-side module tree for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupTaskArgs {
    pub task_id: u64,
    pub task_name: String,
    pub generation: u64,
    pub module_name: String,
    pub worker_init: BTreeMap<String, Vec<String>>,
    pub build_config: Value,
    pub config: Value,
}

/// `run_test` kwargs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTestArgs {
    pub job_id: u64,
    pub task_id: u64,
    pub generation: u64,
    pub args: String,
    pub seed: u64,
}

/// `abort_jobs` kwargs. Without a task name, aborts everything in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortJobsArgs {
    #[serde(default)]
    pub task_name: Option<String>,
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
