// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager side of the Worker channel: the `/worker/perform-test`
//! WebSocket endpoint.
//!
//! After the auth handshake the socket task pumps two directions: queued
//! outbound envelopes from the scheduler, and inbound reply frames routed
//! to their jobs. Cancelling the socket token (mark-for-delete) tears the
//! pump down out from under both.

use crate::components::ManagerComponents;
use crate::worker::WorkerSocket;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use ct_core::JobId;
use ct_wire::{CommandResult, RpcEnvelope, RpcReply, WorkerAuth};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);
const OUTBOUND_QUEUE_DEPTH: usize = 64;

pub async fn perform_test(
    ws: WebSocketUpgrade,
    State(components): State<Arc<ManagerComponents>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, components))
}

async fn handle_socket(socket: WebSocket, components: Arc<ManagerComponents>) {
    let (mut sink, mut stream) = socket.split();

    let Some(auth) = read_auth(&mut stream).await else {
        warn!("worker channel dropped before a valid auth frame");
        return;
    };

    // Close the registration/connect race: wait one move pass before the
    // live-map lookup inside accept.
    components.worker_mgr().await_registration_move().await;

    let (tx, rx) = mpsc::channel::<RpcEnvelope>(OUTBOUND_QUEUE_DEPTH);
    let cancel = CancellationToken::new();
    let code = components
        .worker_mgr()
        .accept_connection(&auth, WorkerSocket { tx, cancel: cancel.clone() });

    if send_json(&mut sink, &CommandResult::code(code)).await.is_err() || !code.is_success() {
        if code.is_success() {
            // Handshake reply failed after bonding: release the socket.
            if let Some(worker) = components.worker_mgr().find(&auth.name) {
                worker.detach_socket();
            }
        }
        return;
    }

    info!(worker = %auth.name, "worker channel open");
    pump(&components, &auth.name, &mut sink, &mut stream, rx, cancel).await;

    if let Some(worker) = components.worker_mgr().find(&auth.name) {
        worker.detach_socket();
    }
    components.job_mgr().on_worker_lost(&auth.name);
    info!(worker = %auth.name, "worker channel closed");
}

async fn pump(
    components: &Arc<ManagerComponents>,
    worker_name: &str,
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
    mut outbound: mpsc::Receiver<RpcEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(worker = %worker_name, "channel cancelled");
                break;
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_inbound(components, worker_name, &text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary
                    Some(Err(e)) => {
                        warn!(worker = %worker_name, error = %e, "channel receive error");
                        break;
                    }
                }
            }

            envelope = outbound.recv() => {
                let Some(envelope) = envelope else { break };
                match serde_json::to_string(&envelope) {
                    Ok(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            warn!(worker = %worker_name, "channel send error");
                            break;
                        }
                    }
                    Err(e) => warn!(worker = %worker_name, error = %e, "unencodable envelope dropped"),
                }
            }
        }
    }
}

/// Route one inbound frame. Test results carry a `job_id`; setup and ping
/// acknowledgements are log-only.
fn dispatch_inbound(components: &Arc<ManagerComponents>, worker_name: &str, text: &str) {
    let reply: RpcReply = match serde_json::from_str(text) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(worker = %worker_name, error = %e, "unparseable channel frame dropped");
            return;
        }
    };

    if let Some(job_id) = reply.field_u64("job_id") {
        let payload = reply.field_str("payload").map(str::to_string);
        components
            .job_mgr()
            .on_job_result(JobId(job_id), &reply.result, payload);
        return;
    }

    if let Some(task_id) = reply.field_u64("task_id") {
        if reply.is_success() {
            debug!(worker = %worker_name, task_id, "task setup acknowledged");
        } else {
            // The follow-up run_test will fail against the unconfigured
            // task and carry the job through the retry path.
            warn!(worker = %worker_name, task_id, result = %reply.result, "task setup failed on worker");
        }
        return;
    }

    debug!(worker = %worker_name, result = %reply.result, "channel acknowledgement");
}

async fn read_auth(stream: &mut SplitStream<WebSocket>) -> Option<WorkerAuth> {
    let frame = tokio::time::timeout(AUTH_TIMEOUT, stream.next()).await.ok()??;
    match frame {
        Ok(Message::Text(text)) => serde_json::from_str(&text).ok(),
        _ => None,
    }
}

async fn send_json<T: serde::Serialize>(
    sink: &mut SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).map_err(axum::Error::new)?;
    sink.send(Message::Text(text)).await
}
