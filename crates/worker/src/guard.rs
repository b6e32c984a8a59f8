// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry guard for the daemon's long-lived tasks.
//!
//! A guarded task that returns an error is restarted after a short pause,
//! up to a retry budget; after exhaustion it stays down and its absence is
//! logged. A clean return ends the guard.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

const RESTART_PAUSE: Duration = Duration::from_millis(100);

pub fn spawn_guarded<F, Fut>(
    name: &'static str,
    retries: u32,
    cancel: CancellationToken,
    factory: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut attempts: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            match factory().await {
                Ok(()) => return,
                Err(e) => {
                    attempts += 1;
                    if attempts > retries {
                        error!(task = name, error = %e, "guarded task exhausted retries, staying down");
                        return;
                    }
                    warn!(task = name, error = %e, attempt = attempts, "guarded task failed, restarting");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(RESTART_PAUSE) => {}
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
