// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker control-socket framing.
//!
//! The front-end CLI connects, writes one UTF-8 JSON payload
//! `{"args": [...]}` (≤ 1 KiB), and half-closes. The daemon replies with a
//! single line — `"SUCCESS: ..."` or an error string — capped at 512 KiB.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_COMMAND_BYTES: usize = 1024;
pub const MAX_REPLY_BYTES: usize = 512 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("payload exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("connection closed before any payload")]
    ConnectionClosed,

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is not UTF-8")]
    NotUtf8,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A back-end CLI invocation shipped over the control socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub args: Vec<String>,
}

async fn read_to_eof<R: AsyncRead + Unpin>(
    reader: &mut R,
    limit: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > limit {
            return Err(ProtocolError::TooLarge { limit });
        }
    }
    Ok(buf)
}

/// Read the single command payload from an accepted connection.
pub async fn read_command<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<CommandRequest, ProtocolError> {
    let buf = read_to_eof(reader, MAX_COMMAND_BYTES).await?;
    if buf.is_empty() {
        return Err(ProtocolError::ConnectionClosed);
    }
    Ok(serde_json::from_slice(&buf)?)
}

/// Write a command payload. The caller half-closes afterwards.
pub async fn write_command<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &CommandRequest,
) -> Result<(), ProtocolError> {
    let body = serde_json::to_vec(request)?;
    if body.len() > MAX_COMMAND_BYTES {
        return Err(ProtocolError::TooLarge { limit: MAX_COMMAND_BYTES });
    }
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Write the daemon's one-line reply.
pub async fn write_reply<W: AsyncWrite + Unpin>(
    writer: &mut W,
    reply: &str,
) -> Result<(), ProtocolError> {
    if reply.len() + 1 > MAX_REPLY_BYTES {
        return Err(ProtocolError::TooLarge { limit: MAX_REPLY_BYTES });
    }
    writer.write_all(reply.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Read the daemon's reply line.
pub async fn read_reply<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, ProtocolError> {
    let buf = read_to_eof(reader, MAX_REPLY_BYTES).await?;
    if buf.is_empty() {
        return Err(ProtocolError::ConnectionClosed);
    }
    let text = String::from_utf8(buf).map_err(|_| ProtocolError::NotUtf8)?;
    Ok(text.trim_end_matches('\n').to_string())
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
