// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slot resolution: the depth-first walk over a builder's submodule tree.
//!
//! All three walks ([`next_submodule_needed`], [`build_tree`],
//! [`collect_spec`]) visit slots in declared order and recurse into chosen
//! submodules in selection order, so traversal is deterministic for a fixed
//! selection map.

use crate::error::ModuleError;
use crate::module::{ChildSet, ModuleBuilder};
use crate::registry::ModuleRegistry;
use crate::spec::{child_prefix, slot_fq_name, ConfigSpecElement, SelectionMap};

/// Which spec family to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    Config,
    Build,
}

/// Depth-first search for the first slot the selection map leaves unfilled.
///
/// Returns `None` once every slot in the selected subtree is resolved.
pub fn next_submodule_needed<M: ?Sized>(
    registry: &ModuleRegistry<M>,
    builder: &dyn ModuleBuilder<M>,
    selection: &SelectionMap,
    prefix: &str,
) -> Result<Option<ConfigSpecElement>, ModuleError> {
    for slot in builder.slots() {
        let fq_name = slot_fq_name(slot.submodule_type, prefix, slot.variable);

        let Some(chosen) = selection.get(&fq_name) else {
            let eligible = registry.submodule_names(slot.submodule_type);
            return Ok(Some(slot.spec_element(&fq_name, &eligible)));
        };

        slot.validate_multiplicity(&fq_name, chosen.len())?;

        let nested_prefix = child_prefix(prefix, slot.variable);
        for name in chosen {
            let child = registry.submodule(slot.submodule_type, name)?;
            if let Some(needed) =
                next_submodule_needed(registry, child.as_ref(), selection, &nested_prefix)?
            {
                return Ok(Some(needed));
            }
        }
    }

    Ok(None)
}

/// Instantiate the full module tree for a complete selection map.
///
/// An unfilled slot fails with [`ModuleError::NeedsSubmodule`]; duplicate
/// names in a `Many` slot produce duplicate instances.
pub fn build_tree<M: ?Sized>(
    registry: &ModuleRegistry<M>,
    builder: &dyn ModuleBuilder<M>,
    selection: &SelectionMap,
    prefix: &str,
) -> Result<Box<M>, ModuleError> {
    let mut children: ChildSet<M> = ChildSet::new();

    for slot in builder.slots() {
        let fq_name = slot_fq_name(slot.submodule_type, prefix, slot.variable);
        let chosen = selection
            .get(&fq_name)
            .ok_or_else(|| ModuleError::NeedsSubmodule { slot: fq_name.clone() })?;

        slot.validate_multiplicity(&fq_name, chosen.len())?;

        let nested_prefix = child_prefix(prefix, slot.variable);
        let mut instances = Vec::with_capacity(chosen.len());
        for name in chosen {
            let child = registry.submodule(slot.submodule_type, name)?;
            instances.push(build_tree(registry, child.as_ref(), selection, &nested_prefix)?);
        }
        children.insert(slot.variable.to_string(), instances);
    }

    builder.instantiate(children)
}

/// Concatenate the spec elements of every module in the selected subtree,
/// each qualified with its caller path.
///
/// Pure in `(builder, selection)`: two calls over unchanged inputs yield
/// equal lists.
pub fn collect_spec<M: ?Sized>(
    registry: &ModuleRegistry<M>,
    builder: &dyn ModuleBuilder<M>,
    selection: &SelectionMap,
    prefix: &str,
    kind: SpecKind,
) -> Result<Vec<ConfigSpecElement>, ModuleError> {
    let own = match kind {
        SpecKind::Config => builder.config_spec(),
        SpecKind::Build => builder.build_spec(),
    };

    let mut elements: Vec<ConfigSpecElement> = own
        .into_iter()
        .map(|element| element.qualified(prefix, builder.module_name()))
        .collect();

    for slot in builder.slots() {
        let fq_name = slot_fq_name(slot.submodule_type, prefix, slot.variable);
        let chosen = selection
            .get(&fq_name)
            .ok_or_else(|| ModuleError::NeedsSubmodule { slot: fq_name.clone() })?;

        slot.validate_multiplicity(&fq_name, chosen.len())?;

        let nested_prefix = child_prefix(prefix, slot.variable);
        for name in chosen {
            let child = registry.submodule(slot.submodule_type, name)?;
            elements.extend(collect_spec(
                registry,
                child.as_ref(),
                selection,
                &nested_prefix,
                kind,
            )?);
        }
    }

    Ok(elements)
}

#[cfg(test)]
#[path = "slots_tests.rs"]
mod tests;
