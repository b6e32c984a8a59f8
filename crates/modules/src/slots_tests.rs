// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::module::{Multiplicity, SlotSpec, WorkerModule};
use crate::registry::{Registries, RegistryBuilder};
use crate::spec::{ConfigMap, UiType};
use async_trait::async_trait;
use std::sync::Arc;

// A minimal module family for exercising nested resolution:
// Root ─(stage.inner)→ Middle ─(leaf.tip)→ Leaf
struct Mini(&'static str);

#[async_trait]
impl WorkerModule for Mini {
    fn name(&self) -> &'static str {
        self.0
    }
    async fn configure_build(&mut self, _: &ConfigMap, _: &str) -> Result<(), ModuleError> {
        Ok(())
    }
    async fn build(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
    async fn configure(&mut self, _: &ConfigMap, _: &str) -> Result<(), ModuleError> {
        Ok(())
    }
    async fn run_single_test(&self, _: &str, _: u64) -> Result<String, ModuleError> {
        Ok(String::new())
    }
}

struct MiniBuilder {
    name: &'static str,
    slots: &'static [SlotSpec],
    spec: &'static [(&'static str, UiType)],
}

impl ModuleBuilder<dyn WorkerModule> for MiniBuilder {
    fn module_name(&self) -> &'static str {
        self.name
    }
    fn slots(&self) -> &'static [SlotSpec] {
        self.slots
    }
    fn config_spec(&self) -> Vec<crate::spec::ConfigSpecElement> {
        self.spec
            .iter()
            .map(|(name, ui)| crate::spec::ConfigSpecElement::optional(*name, *ui, ""))
            .collect()
    }
    fn instantiate(
        &self,
        _children: crate::module::ChildSet<dyn WorkerModule>,
    ) -> Result<Box<dyn WorkerModule>, ModuleError> {
        Ok(Box::new(Mini(self.name)))
    }
}

const ROOT_SLOTS: &[SlotSpec] = &[SlotSpec {
    submodule_type: "stage",
    variable: "inner",
    multiplicity: Multiplicity::One,
    description: "inner stage",
}];

const MIDDLE_SLOTS: &[SlotSpec] = &[SlotSpec {
    submodule_type: "leaf",
    variable: "tip",
    multiplicity: Multiplicity::Many,
    description: "leaf tips",
}];

fn mini_registry() -> Arc<crate::registry::ModuleRegistry<dyn WorkerModule>> {
    RegistryBuilder::new()
        .register_module(Arc::new(MiniBuilder { name: "Root", slots: ROOT_SLOTS, spec: &[] }))
        .register_submodule(
            "stage",
            Arc::new(MiniBuilder {
                name: "Middle",
                slots: MIDDLE_SLOTS,
                spec: &[("depth", UiType::String)],
            }),
        )
        .register_submodule(
            "leaf",
            Arc::new(MiniBuilder { name: "Leaf", slots: &[], spec: &[("color", UiType::String)] }),
        )
        .freeze()
}

fn selection(pairs: &[(&str, &[&str])]) -> SelectionMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

#[test]
fn empty_selection_returns_first_slot() {
    let registry = mini_registry();
    let root = registry.module("Root").unwrap();

    let needed = next_submodule_needed(&registry, root.as_ref(), &SelectionMap::new(), "")
        .unwrap()
        .unwrap();
    assert_eq!(needed.name, "stage.inner");
    assert!(needed.description.contains("Middle"));
}

#[test]
fn resolution_descends_into_chosen_submodules() {
    let registry = mini_registry();
    let root = registry.module("Root").unwrap();

    let partial = selection(&[("stage.inner", &["Middle"])]);
    let needed =
        next_submodule_needed(&registry, root.as_ref(), &partial, "").unwrap().unwrap();
    assert_eq!(needed.name, "leaf.inner.tip");
    assert_eq!(needed.ui_type, UiType::StringList);
}

#[test]
fn complete_selection_resolves_to_none() {
    let registry = mini_registry();
    let root = registry.module("Root").unwrap();

    let complete = selection(&[("stage.inner", &["Middle"]), ("leaf.inner.tip", &["Leaf"])]);
    assert!(next_submodule_needed(&registry, root.as_ref(), &complete, "").unwrap().is_none());
}

#[test]
fn resolution_is_deterministic() {
    let registry = mini_registry();
    let root = registry.module("Root").unwrap();
    let partial = selection(&[("stage.inner", &["Middle"])]);

    for _ in 0..10 {
        let needed =
            next_submodule_needed(&registry, root.as_ref(), &partial, "").unwrap().unwrap();
        assert_eq!(needed.name, "leaf.inner.tip");
    }
}

#[test]
fn wrong_multiplicity_is_rejected() {
    let registry = mini_registry();
    let root = registry.module("Root").unwrap();

    let doubled = selection(&[("stage.inner", &["Middle", "Middle"])]);
    let err = next_submodule_needed(&registry, root.as_ref(), &doubled, "").unwrap_err();
    assert!(matches!(err, ModuleError::ExpectedSingle { got: 2, .. }));

    let empty_many = selection(&[("stage.inner", &["Middle"]), ("leaf.inner.tip", &[])]);
    let err = next_submodule_needed(&registry, root.as_ref(), &empty_many, "").unwrap_err();
    assert!(matches!(err, ModuleError::ExpectedNonEmpty { .. }));
}

#[test]
fn unknown_submodule_name_is_rejected() {
    let registry = mini_registry();
    let root = registry.module("Root").unwrap();

    let bogus = selection(&[("stage.inner", &["Nonexistent"])]);
    let err = next_submodule_needed(&registry, root.as_ref(), &bogus, "").unwrap_err();
    assert!(matches!(err, ModuleError::UnknownSubModule { .. }));
}

#[test]
fn build_tree_requires_complete_selection() {
    let registry = mini_registry();
    let root = registry.module("Root").unwrap();

    let partial = selection(&[("stage.inner", &["Middle"])]);
    let err = build_tree(&registry, root.as_ref(), &partial, "").unwrap_err();
    assert!(matches!(err, ModuleError::NeedsSubmodule { slot } if slot == "leaf.inner.tip"));
}

#[test]
fn collect_spec_qualifies_by_caller_path() {
    let registry = mini_registry();
    let root = registry.module("Root").unwrap();

    let complete =
        selection(&[("stage.inner", &["Middle"]), ("leaf.inner.tip", &["Leaf", "Leaf"])]);
    let spec =
        collect_spec(&registry, root.as_ref(), &complete, "", SpecKind::Config).unwrap();

    let names: Vec<&str> = spec.iter().map(|e| e.name.as_str()).collect();
    // Duplicate leaf selection repeats the leaf's spec.
    assert_eq!(
        names,
        vec!["inner.Middle.depth", "inner.tip.Leaf.color", "inner.tip.Leaf.color"]
    );
}

#[test]
fn collect_spec_is_pure() {
    let registry = mini_registry();
    let root = registry.module("Root").unwrap();
    let complete = selection(&[("stage.inner", &["Middle"]), ("leaf.inner.tip", &["Leaf"])]);

    let a = collect_spec(&registry, root.as_ref(), &complete, "", SpecKind::Config).unwrap();
    let b = collect_spec(&registry, root.as_ref(), &complete, "", SpecKind::Config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn standard_worker_catalog_iterates_to_completion() {
    let registries = Registries::standard();
    let root = registries.worker.module("BaseChessModule").unwrap();

    let mut chosen = SelectionMap::new();
    let mut steps = 0;
    while let Some(needed) =
        next_submodule_needed(&registries.worker, root.as_ref(), &chosen, "").unwrap()
    {
        // Pick the first eligible name from the description listing.
        let eligible = match needed.name.as_str() {
            "chess_tournament.tournament" => vec!["CuteChess".to_string()],
            "chess_engine.engines" => vec!["CheckmateChariot".to_string()],
            other => panic!("unexpected slot {other}"),
        };
        chosen.insert(needed.name.clone(), eligible);
        steps += 1;
        assert!(steps <= 4, "resolution failed to converge");
    }
    assert_eq!(steps, 2);
}
