// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned-entity lock primitive.
//!
//! Every mutable long-lived entity (task, worker, job) composes the same
//! three pieces: a reader–writer lock over its fields, a non-reentrant
//! "one operation at a time" mutex, and a monotone generation counter
//! bumped on state transitions. The operation mutex is try-acquire only:
//! a collision fails fast with [`OperationInProgress`] instead of queueing
//! a second long-running operation behind the first.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Returned when an entity already has an operation in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("another operation is already in progress")]
pub struct OperationInProgress;

/// RAII guard for an entity's operation slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct OperationGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Field lock + operation mutex + generation counter.
#[derive(Debug)]
pub struct ObjectModel<T> {
    state: RwLock<T>,
    op_mutex: Mutex<()>,
    generation: AtomicU64,
}

impl<T> ObjectModel<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: RwLock::new(state),
            op_mutex: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Shared read access to the entity's fields.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.state.read()
    }

    /// Exclusive write access to the entity's fields.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.state.write()
    }

    /// Claim the entity's single operation slot, failing fast if taken.
    pub fn perform_operation(&self) -> Result<OperationGuard<'_>, OperationInProgress> {
        match self.op_mutex.try_lock() {
            Some(guard) => Ok(OperationGuard { _guard: guard }),
            None => Err(OperationInProgress),
        }
    }

    /// The current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Increment the generation, returning the new value.
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
