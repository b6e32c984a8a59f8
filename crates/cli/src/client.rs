// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket client for the worker daemon.

use ct_wire::{read_reply, write_command, CommandRequest, ProtocolError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for one command round-trip.
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("CT_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Pause between connection attempts.
pub fn retry_delay() -> Duration {
    parse_duration_ms("CT_RETRY_DELAY_MS").unwrap_or(Duration::from_secs(1))
}

/// Connection attempts before giving up.
pub fn retry_count() -> u32 {
    std::env::var("CT_CLIENT_RETRIES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3)
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("worker daemon not reachable on port {port}: {source}")]
    NotReachable {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("command timed out")]
    Timeout,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Client for the daemon's localhost command socket.
pub struct DaemonClient {
    port: u16,
}

impl DaemonClient {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Ship one backend invocation and return the daemon's reply line.
    ///
    /// Retries the connection a few times so a freshly deployed daemon has
    /// a moment to bind its socket.
    pub async fn send(&self, args: Vec<String>) -> Result<String, ClientError> {
        let request = CommandRequest { args };
        let mut last_error: Option<ClientError> = None;

        for attempt in 0..retry_count() {
            if attempt > 0 {
                tokio::time::sleep(retry_delay()).await;
            }
            match self.send_once(&request).await {
                Ok(reply) => return Ok(reply),
                Err(e @ ClientError::NotReachable { .. }) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(ClientError::Timeout))
    }

    async fn send_once(&self, request: &CommandRequest) -> Result<String, ClientError> {
        let round_trip = async {
            let stream = TcpStream::connect(("127.0.0.1", self.port))
                .await
                .map_err(|source| ClientError::NotReachable { port: self.port, source })?;
            let (mut reader, mut writer) = stream.into_split();

            write_command(&mut writer, request).await?;
            // Half-close so the daemon sees EOF on the request.
            writer.shutdown().await.map_err(ProtocolError::Io)?;

            Ok(read_reply(&mut reader).await?)
        };

        tokio::time::timeout(timeout_ipc(), round_trip)
            .await
            .map_err(|_| ClientError::Timeout)?
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
