// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker side of the Manager channel.
//!
//! Dials the Manager's WebSocket endpoint, authenticates, then serves the
//! RPC loop: receive an envelope, dispatch it against the local method
//! table, send the reply. Transport failures trigger reconnects with a 1 s
//! backoff; the budget resets after any successful round-trip and the loop
//! goes quiescent once it is spent.

use crate::jobs::JobPool;
use ct_core::{ResultCode, SettingsStore};
use ct_wire::{
    AbortJobsArgs, CommandResult, RpcEnvelope, RpcReply, RunTestArgs, SetupTaskArgs, WorkerAuth,
    METHOD_ABORT_JOBS, METHOD_PING, METHOD_RUN_TEST, METHOD_SETUP_TASK,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("manager rejected channel auth: {0}")]
    AuthRejected(String),

    #[error("channel closed by manager")]
    Closed,

    #[error("unexpected frame during handshake")]
    BadHandshake,

    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("frame encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

enum SessionEnd {
    /// Cancelled from outside; do not reconnect.
    Shutdown,
    /// Transport or handshake failure after `rounds` good round-trips.
    Failed { rounds: u64, error: ChannelError },
}

/// Run the reconnecting channel loop until shutdown or budget exhaustion.
pub async fn channel_loop(
    host: String,
    auth: WorkerAuth,
    settings: Arc<SettingsStore>,
    jobs: Arc<JobPool>,
    cancel: CancellationToken,
) {
    let mut budget = settings.snapshot().connection_retries;

    while budget > 0 && !cancel.is_cancelled() {
        match run_session(&host, &auth, &jobs, &cancel).await {
            SessionEnd::Shutdown => {
                info!("channel loop shut down");
                return;
            }
            SessionEnd::Failed { rounds, error } => {
                if rounds > 0 {
                    // Successful traffic restores the full budget.
                    budget = settings.snapshot().connection_retries;
                }
                budget = budget.saturating_sub(1);
                warn!(error = %error, remaining = budget, "channel session ended");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RECONNECT_PAUSE) => {}
        }
    }

    info!("channel reconnect budget spent, loop quiescent");
}

async fn run_session(
    host: &str,
    auth: &WorkerAuth,
    jobs: &Arc<JobPool>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let url = format!("ws://{host}/worker/perform-test");

    let connect = tokio::select! {
        _ = cancel.cancelled() => return SessionEnd::Shutdown,
        connect = tokio_tungstenite::connect_async(url.as_str()) => connect,
    };
    let (mut ws, _) = match connect {
        Ok(pair) => pair,
        Err(e) => return SessionEnd::Failed { rounds: 0, error: e.into() },
    };

    if let Err(error) = handshake(&mut ws, auth).await {
        return SessionEnd::Failed { rounds: 0, error };
    }
    info!(%host, worker = %auth.name, "channel authenticated");

    let mut rounds = 0u64;
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Shutdown,
            frame = ws.next() => frame,
        };

        let envelope = match frame {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<RpcEnvelope>(text.as_str()) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(error = %e, "unparseable envelope, replying with error");
                    RpcEnvelope { method: String::new(), kwargs: serde_json::Value::Null }
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                return SessionEnd::Failed { rounds, error: ChannelError::Closed };
            }
            Some(Ok(_)) => continue, // ping/pong/binary
            Some(Err(e)) => {
                return SessionEnd::Failed { rounds, error: e.into() };
            }
        };

        let reply = dispatch(envelope, jobs).await;
        let text = match serde_json::to_string(&reply) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "unencodable reply dropped");
                continue;
            }
        };
        if let Err(e) = ws.send(Message::text(text)).await {
            return SessionEnd::Failed { rounds, error: e.into() };
        }
        rounds += 1;
    }
}

async fn handshake<S>(
    ws: &mut tokio_tungstenite::WebSocketStream<S>,
    auth: &WorkerAuth,
) -> Result<(), ChannelError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    ws.send(Message::text(serde_json::to_string(auth)?)).await?;

    let frame = ws.next().await.ok_or(ChannelError::Closed)??;
    let Message::Text(text) = frame else {
        return Err(ChannelError::BadHandshake);
    };
    let result: CommandResult = serde_json::from_str(text.as_str())?;
    if !result.is_success() {
        return Err(ChannelError::AuthRejected(result.result));
    }
    Ok(())
}

/// The dispatch table. Only methods listed here may be invoked; anything
/// else is refused without executing.
pub async fn dispatch(envelope: RpcEnvelope, jobs: &Arc<JobPool>) -> RpcReply {
    match envelope.method.as_str() {
        METHOD_PING => RpcReply::success(),

        METHOD_SETUP_TASK => match envelope.parse_kwargs::<SetupTaskArgs>() {
            Ok(args) => {
                let task_id = args.task_id;
                match jobs.setup_task(args).await {
                    Ok(()) => RpcReply::success().with_field("task_id", task_id),
                    Err(e) => RpcReply::error(e).with_field("task_id", task_id),
                }
            }
            Err(e) => RpcReply::error(format!("malformed setup_task kwargs: {e}")),
        },

        METHOD_RUN_TEST => match envelope.parse_kwargs::<RunTestArgs>() {
            Ok(args) => {
                let job_id = args.job_id;
                debug!(job = job_id, task = args.task_id, "running test");
                match jobs.run_test(args).await {
                    Ok(payload) => RpcReply::success()
                        .with_field("job_id", job_id)
                        .with_field("payload", payload),
                    Err(e) => RpcReply::error(e).with_field("job_id", job_id),
                }
            }
            Err(e) => RpcReply::error(format!("malformed run_test kwargs: {e}")),
        },

        METHOD_ABORT_JOBS => match envelope.parse_kwargs::<AbortJobsArgs>() {
            Ok(args) => {
                let aborted = jobs.abort(args.task_name.as_deref());
                RpcReply::success().with_field("aborted", aborted as u64)
            }
            Err(e) => RpcReply::error(format!("malformed abort_jobs kwargs: {e}")),
        },

        other => RpcReply::code(ResultCode::UnknownError)
            .with_field("error", format!("unknown method: {other}")),
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
