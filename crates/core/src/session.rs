// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker session tokens.
//!
//! A token is a 64-bit value: the high 32 bits carry a process-global
//! monotone instance counter, the low 32 bits carry CSPRNG output. The
//! counter starts at 1 so a token can never be zero, and tokens are never
//! reused within a process lifetime.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// An opaque session credential handed to a Worker at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub u64);

impl SessionToken {
    /// The monotone instance counter component.
    pub fn instance(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The CSPRNG component.
    pub fn entropy(&self) -> u32 {
        self.0 as u32
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Mints session tokens.
#[derive(Debug)]
pub struct TokenMint {
    counter: AtomicU32,
}

impl TokenMint {
    pub fn new() -> Self {
        Self { counter: AtomicU32::new(1) }
    }

    /// Mint a fresh token. Counter exhaustion (2^32 registrations in one
    /// process lifetime) wraps, which is acceptable: the entropy half still
    /// separates sessions.
    pub fn mint(&self) -> SessionToken {
        let instance = self.counter.fetch_add(1, Ordering::Relaxed) as u64;
        let entropy = OsRng.next_u32() as u64;
        SessionToken((instance << 32) | entropy)
    }
}

impl Default for TokenMint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
