// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keep-alive loop.
//!
//! Posts the worker's credentials to the Manager once per `ka_interval`,
//! drift-compensated against the previous pass's wall-clock. Deliberately
//! independent of the RPC channel: a broken RPC socket must not starve the
//! Manager's timeout detector.

use ct_core::SettingsStore;
use ct_wire::{CommandResult, WorkerAuth};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Sleep for the interval minus the previous pass's cost.
pub fn next_delay(interval: Duration, last_pass: Duration) -> Duration {
    interval.saturating_sub(last_pass).max(Duration::from_millis(10))
}

pub async fn keepalive_loop(
    host: String,
    auth: WorkerAuth,
    settings: Arc<SettingsStore>,
    cancel: CancellationToken,
) {
    let client = reqwest::Client::new();
    let url = format!("http://{host}/worker/bump_ka");
    let mut last_pass = Duration::ZERO;

    loop {
        let interval = settings
            .snapshot()
            .ka_interval_interval()
            .max(Duration::from_millis(100));

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("keep-alive loop shut down");
                return;
            }
            _ = tokio::time::sleep(next_delay(interval, last_pass)) => {}
        }

        let started = Instant::now();
        match client.post(&url).json(&auth).send().await {
            Ok(response) => match response.json::<CommandResult>().await {
                Ok(result) if result.is_success() => {
                    debug!(worker = %auth.name, "keep-alive bumped");
                }
                Ok(result) => {
                    warn!(worker = %auth.name, result = %result.result, "keep-alive refused");
                }
                Err(e) => warn!(error = %e, "keep-alive reply unreadable"),
            },
            Err(e) => warn!(error = %e, "keep-alive post failed"),
        }
        last_pass = started.elapsed();
    }
}

#[cfg(test)]
#[path = "keepalive_tests.rs"]
mod tests;
