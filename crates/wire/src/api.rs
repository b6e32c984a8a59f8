// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager HTTP API request/response bodies.
//!
//! `result` is a string: `"SUCCESS"` or an error. Task-engine failures are
//! free-form messages; worker endpoints stay within the result taxonomy.
//! Spec lists are carried as raw JSON so the HTTP layer does not depend on
//! the module framework.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type SelectionDto = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub module_name: String,
}

/// `task_id` is -1 on error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreateReply {
    pub result: String,
    pub task_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInitRequest {
    pub task_id: u64,
    #[serde(default)]
    pub worker_init: SelectionDto,
    #[serde(default)]
    pub manager_init: SelectionDto,
}

/// Spec fields are `null` once the corresponding side is fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInitReply {
    pub result: String,
    #[serde(default)]
    pub worker_init_spec: Option<Value>,
    #[serde(default)]
    pub manager_init_spec: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfigRequest {
    pub task_id: u64,
    pub config: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIdRequest {
    pub task_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleReply {
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMinimalEntry {
    pub task_id: u64,
    pub name: String,
    pub description: String,
    pub module_name: String,
    pub task_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMinimalReply {
    pub queries: Vec<TaskMinimalEntry>,
}

/// Full task snapshot: identity, state, and every stored config branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFullReply {
    pub result: String,
    #[serde(default)]
    pub task_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub task_state: Option<String>,
    #[serde(default)]
    pub generation: Option<u64>,
    #[serde(default)]
    pub worker_init: Option<SelectionDto>,
    #[serde(default)]
    pub manager_init: Option<SelectionDto>,
    #[serde(default)]
    pub worker_build_config: Option<Value>,
    #[serde(default)]
    pub manager_build_config: Option<Value>,
    #[serde(default)]
    pub worker_config: Option<Value>,
    #[serde(default)]
    pub manager_config: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpecReply {
    pub result: String,
    #[serde(default)]
    pub worker_config_spec: Option<Value>,
    #[serde(default)]
    pub manager_config_spec: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSpecReply {
    pub result: String,
    #[serde(default)]
    pub worker_build_spec: Option<Value>,
    #[serde(default)]
    pub manager_build_spec: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulesReply {
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmodulesReply {
    pub submodules: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
