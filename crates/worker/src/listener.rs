// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command socket: the daemon's localhost TCP listener.
//!
//! Connections are served one at a time; each carries a single forwarded
//! CLI invocation and receives a single reply line.

use crate::backend;
use crate::daemon::WorkerComponents;
use ct_wire::{read_command, write_reply};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const READ_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run_listener(
    listener: TcpListener,
    components: Arc<WorkerComponents>,
    cancel: CancellationToken,
) {
    match listener.local_addr() {
        Ok(addr) => info!(%addr, "command socket listening"),
        Err(_) => info!("command socket listening"),
    }

    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                debug!(%peer, "command connection accepted");
                handle_connection(stream, &components).await;
            }
            Err(e) => {
                error!(error = %e, "command accept error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
    info!("command socket closed");
}

async fn handle_connection(stream: TcpStream, components: &Arc<WorkerComponents>) {
    let (mut reader, mut writer) = stream.into_split();

    let reply = match tokio::time::timeout(READ_TIMEOUT, read_command(&mut reader)).await {
        Ok(Ok(request)) => {
            debug!(args = ?request.args, "command received");
            backend::execute(&request.args, components).await
        }
        Ok(Err(e)) => format!("ERROR: {e}"),
        Err(_) => "ERROR: command read timed out".to_string(),
    };

    if let Err(e) = write_reply(&mut writer, &reply).await {
        warn!(error = %e, "failed to write command reply");
    }
}
