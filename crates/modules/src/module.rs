// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module lifecycle traits and builder contract.
//!
//! Both families share the build/configure lifecycle; they diverge at the
//! execution seam. Worker-side modules run a single test; manager-side
//! modules produce test arguments and fold results back into the training
//! loop.

use crate::error::ModuleError;
use crate::spec::{ConfigMap, ConfigSpecElement, UiType};
use async_trait::async_trait;
use std::collections::HashMap;

/// Instantiated children of a module, keyed by slot variable name.
///
/// A `One` slot carries exactly one instance; a `Many` slot carries the
/// selection order, duplicates included.
pub type ChildSet<M> = HashMap<String, Vec<Box<M>>>;

/// How many submodules a slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// Exactly one child (`String` in the UI).
    One,
    /// One or more children (`StringList` in the UI).
    Many,
}

/// A submodule slot declared by a builder.
#[derive(Debug, Clone, Copy)]
pub struct SlotSpec {
    pub submodule_type: &'static str,
    pub variable: &'static str,
    pub multiplicity: Multiplicity,
    pub description: &'static str,
}

impl SlotSpec {
    /// Check a selection's cardinality against this slot.
    pub fn validate_multiplicity(&self, fq_name: &str, count: usize) -> Result<(), ModuleError> {
        match self.multiplicity {
            Multiplicity::One if count != 1 => {
                Err(ModuleError::ExpectedSingle { slot: fq_name.to_string(), got: count })
            }
            Multiplicity::Many if count == 0 => {
                Err(ModuleError::ExpectedNonEmpty { slot: fq_name.to_string() })
            }
            _ => Ok(()),
        }
    }

    /// The "needs submodule" element shown to callers, listing the eligible
    /// submodule names in its description.
    pub fn spec_element(&self, fq_name: &str, eligible: &[String]) -> ConfigSpecElement {
        let ui_type = match self.multiplicity {
            Multiplicity::One => UiType::String,
            Multiplicity::Many => UiType::StringList,
        };
        let description = format!("{} (one of: {})", self.description, eligible.join(", "));
        ConfigSpecElement::required(fq_name, ui_type, description)
    }
}

/// A worker-side executable module.
#[async_trait]
pub trait WorkerModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read build-time options from the shared branch under `prefix`.
    async fn configure_build(&mut self, config: &ConfigMap, prefix: &str)
        -> Result<(), ModuleError>;

    /// Materialize build products. Partial on-disk effects are this
    /// module's responsibility to handle idempotently.
    async fn build(&mut self) -> Result<(), ModuleError>;

    /// Read runtime options from the shared branch under `prefix`.
    async fn configure(&mut self, config: &ConfigMap, prefix: &str) -> Result<(), ModuleError>;

    /// Execute one test. `args` is the manager-prepared payload; the result
    /// string travels back opaque.
    async fn run_single_test(&self, args: &str, seed: u64) -> Result<String, ModuleError>;
}

impl std::fmt::Debug for dyn WorkerModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WorkerModule").field(&self.name()).finish()
    }
}

/// A manager-side test module.
#[async_trait]
pub trait ManagerModule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn configure_build(&mut self, config: &ConfigMap, prefix: &str)
        -> Result<(), ModuleError>;

    async fn build(&mut self) -> Result<(), ModuleError>;

    async fn configure(&mut self, config: &ConfigMap, prefix: &str) -> Result<(), ModuleError>;

    /// Produce the args payload for the next test job.
    async fn prepare_test_args(&self) -> Result<String, ModuleError>;

    /// Fold a completed test's result payload back into training state.
    async fn sync_test_results(&self, payload: &str) -> Result<(), ModuleError>;
}

/// Factory and spec description for a module.
///
/// Builders are stateless and shared; `M` is one of the two module object
/// types ([`WorkerModule`] / [`ManagerModule`]).
pub trait ModuleBuilder<M: ?Sized>: Send + Sync {
    fn module_name(&self) -> &'static str;

    /// Declared slots, in stable resolution order.
    fn slots(&self) -> &'static [SlotSpec] {
        &[]
    }

    /// Runtime config options (bare names; qualified during collection).
    fn config_spec(&self) -> Vec<ConfigSpecElement> {
        Vec::new()
    }

    /// Build-time options (bare names; qualified during collection).
    fn build_spec(&self) -> Vec<ConfigSpecElement> {
        Vec::new()
    }

    /// Construct a module instance around resolved children.
    fn instantiate(&self, children: ChildSet<M>) -> Result<Box<M>, ModuleError>;
}

impl<M: ?Sized> std::fmt::Debug for dyn ModuleBuilder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ModuleBuilder").field(&self.module_name()).finish()
    }
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
