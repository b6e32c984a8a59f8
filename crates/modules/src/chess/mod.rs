// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The standard chess-tuning module catalog.
//!
//! Worker side: `BaseChessModule` composes a tournament driver with one or
//! more engines. Manager side: `BaseChessModule` composes a training method
//! that proposes parameter vectors and folds scores back in.

mod base;
mod cutechess;
mod engine;
mod training;

pub use base::{ManagerBaseChessBuilder, WorkerBaseChessBuilder};
pub use cutechess::CuteChessBuilder;
pub use engine::CheckmateChariotBuilder;
pub use training::SimpleTuningBuilder;
