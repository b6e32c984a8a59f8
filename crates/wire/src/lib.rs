// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for chariot-tune.
//!
//! Three surfaces share this crate: the Manager↔Worker WebSocket channel
//! (`{method, kwargs}` envelopes with `{result, ...}` replies), the Worker
//! control socket (one JSON command in, one reply line out), and the
//! Manager HTTP API DTOs.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod api;
pub mod control;
pub mod messages;

pub use control::{
    read_command, read_reply, write_command, write_reply, CommandRequest, ProtocolError,
    MAX_COMMAND_BYTES, MAX_REPLY_BYTES,
};
pub use messages::{
    AbortJobsArgs, CommandResult, RegisterReply, RegisterRequest, RpcEnvelope, RpcReply,
    RunTestArgs, SetupTaskArgs, WorkerAuth, METHOD_ABORT_JOBS, METHOD_PING, METHOD_RUN_TEST,
    METHOD_SETUP_TASK,
};
