// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide module registries.
//!
//! Populated through a [`RegistryBuilder`] once at startup, then frozen
//! into Arc-shared read-only maps — lookups after that point need no
//! synchronization.

use crate::chess;
use crate::error::ModuleError;
use crate::module::{ManagerModule, ModuleBuilder, WorkerModule};
use indexmap::IndexMap;
use std::sync::Arc;

/// Immutable lookup of one module family.
pub struct ModuleRegistry<M: ?Sized> {
    modules: IndexMap<String, Arc<dyn ModuleBuilder<M>>>,
    submodules: IndexMap<String, IndexMap<String, Arc<dyn ModuleBuilder<M>>>>,
}

impl<M: ?Sized> ModuleRegistry<M> {
    /// Look up a top-level test module builder.
    pub fn module(&self, name: &str) -> Result<Arc<dyn ModuleBuilder<M>>, ModuleError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))
    }

    /// Look up a submodule builder by (type, name).
    pub fn submodule(
        &self,
        submodule_type: &str,
        name: &str,
    ) -> Result<Arc<dyn ModuleBuilder<M>>, ModuleError> {
        self.submodules
            .get(submodule_type)
            .and_then(|family| family.get(name))
            .cloned()
            .ok_or_else(|| ModuleError::UnknownSubModule {
                submodule_type: submodule_type.to_string(),
                name: name.to_string(),
            })
    }

    /// Names eligible for a slot of the given type, in registration order.
    pub fn submodule_names(&self, submodule_type: &str) -> Vec<String> {
        self.submodules
            .get(submodule_type)
            .map(|family| family.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All top-level module names, in registration order.
    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// The full type → names map.
    pub fn active_submodules(&self) -> IndexMap<String, Vec<String>> {
        self.submodules
            .iter()
            .map(|(ty, family)| (ty.clone(), family.keys().cloned().collect()))
            .collect()
    }
}

/// Mutable registration stage, consumed by [`RegistryBuilder::freeze`].
pub struct RegistryBuilder<M: ?Sized> {
    modules: IndexMap<String, Arc<dyn ModuleBuilder<M>>>,
    submodules: IndexMap<String, IndexMap<String, Arc<dyn ModuleBuilder<M>>>>,
}

impl<M: ?Sized> RegistryBuilder<M> {
    pub fn new() -> Self {
        Self { modules: IndexMap::new(), submodules: IndexMap::new() }
    }

    pub fn register_module(mut self, builder: Arc<dyn ModuleBuilder<M>>) -> Self {
        self.modules.insert(builder.module_name().to_string(), builder);
        self
    }

    pub fn register_submodule(
        mut self,
        submodule_type: &str,
        builder: Arc<dyn ModuleBuilder<M>>,
    ) -> Self {
        self.submodules
            .entry(submodule_type.to_string())
            .or_default()
            .insert(builder.module_name().to_string(), builder);
        self
    }

    pub fn freeze(self) -> Arc<ModuleRegistry<M>> {
        Arc::new(ModuleRegistry { modules: self.modules, submodules: self.submodules })
    }
}

impl<M: ?Sized> Default for RegistryBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Both families, frozen together at process start.
pub struct Registries {
    pub worker: Arc<ModuleRegistry<dyn WorkerModule>>,
    pub manager: Arc<ModuleRegistry<dyn ManagerModule>>,
}

impl Registries {
    /// The standard module catalog shipped with the orchestrator.
    pub fn standard() -> Arc<Self> {
        let worker = RegistryBuilder::new()
            .register_module(Arc::new(chess::WorkerBaseChessBuilder))
            .register_submodule("chess_tournament", Arc::new(chess::CuteChessBuilder))
            .register_submodule("chess_engine", Arc::new(chess::CheckmateChariotBuilder))
            .freeze();

        let manager = RegistryBuilder::new()
            .register_module(Arc::new(chess::ManagerBaseChessBuilder))
            .register_submodule("training_method", Arc::new(chess::SimpleTuningBuilder))
            .freeze();

        Arc::new(Self { worker, manager })
    }

    /// A module name is usable for tasks only when both families carry it.
    pub fn validate_module(&self, name: &str) -> Result<(), ModuleError> {
        self.worker.module(name)?;
        self.manager.module(name)?;
        Ok(())
    }

    /// Module names available to `task/create` (present in both families).
    pub fn available_modules(&self) -> Vec<String> {
        self.worker
            .module_names()
            .into_iter()
            .filter(|name| self.manager.module(name).is_ok())
            .collect()
    }

    /// Merged type → names map across both families.
    pub fn active_submodules(&self) -> IndexMap<String, Vec<String>> {
        let mut merged = self.worker.active_submodules();
        for (ty, names) in self.manager.active_submodules() {
            merged.entry(ty).or_default().extend(names);
        }
        merged
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
