// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge from synchronous domain code into async module hooks.
//!
//! Domain objects are synchronous; module lifecycle hooks and channel
//! sends are async. Each call drives its future on a throwaway
//! current-thread runtime, so callers must not already be inside an async
//! context (HTTP handlers hop through `spawn_blocking` first).

use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to start module runtime: {0}")]
pub struct ExecError(#[from] std::io::Error);

/// Run a future to completion on the calling thread.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, ExecError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
