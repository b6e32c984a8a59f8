// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ct-modules: pluggable module framework for chariot-tune.
//!
//! A *Module* is an executable unit with a build/configure/run lifecycle,
//! split into worker-side and manager-side families. A *ModuleBuilder*
//! declares submodule slots and instantiates a module from a caller-supplied
//! selection map. Composition is a tree: every nested module's options live
//! in a disjoint `parent_prefix.variable.module_name.option` namespace.

pub mod chess;
pub mod error;
pub mod module;
pub mod registry;
pub mod slots;
pub mod spec;

pub use error::ModuleError;
pub use module::{
    ChildSet, ManagerModule, ModuleBuilder, Multiplicity, SlotSpec, WorkerModule,
};
pub use registry::{ModuleRegistry, Registries, RegistryBuilder};
pub use slots::{build_tree, collect_spec, next_submodule_needed, SpecKind};
pub use spec::{
    child_prefix, option_name, slot_fq_name, validate_config, ConfigMap, ConfigSpecElement,
    OptionReader, SelectionMap, UiType,
};

/// Key under which the process-wide build directory is injected into both
/// sides' build configs before modules see them.
pub const BUILD_DIR_KEY: &str = "build_dir";
