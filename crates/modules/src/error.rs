// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module framework errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("unknown submodule {name} of type {submodule_type}")]
    UnknownSubModule { submodule_type: String, name: String },

    #[error("slot {slot} needs a submodule selection")]
    NeedsSubmodule { slot: String },

    #[error("slot {slot} requires exactly one submodule, got {got}")]
    ExpectedSingle { slot: String, got: usize },

    #[error("slot {slot} requires at least one submodule")]
    ExpectedNonEmpty { slot: String },

    #[error("missing required option: {0}")]
    MissingOption(String),

    #[error("invalid option {option}: {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("module build failed: {0}")]
    BuildFailed(String),

    #[error("test execution failed: {0}")]
    TestFailed(String),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
