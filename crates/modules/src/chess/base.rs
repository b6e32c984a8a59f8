// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level `BaseChessModule`, worker-side and manager-side variants.

use crate::error::ModuleError;
use crate::module::{
    ChildSet, ManagerModule, ModuleBuilder, Multiplicity, SlotSpec, WorkerModule,
};
use crate::spec::{child_prefix, ConfigMap, ConfigSpecElement, OptionReader, UiType};
use async_trait::async_trait;
use serde_json::{json, Value};

const MODULE_NAME: &str = "BaseChessModule";

const WORKER_SLOTS: &[SlotSpec] = &[
    SlotSpec {
        submodule_type: "chess_tournament",
        variable: "tournament",
        multiplicity: Multiplicity::One,
        description: "Tournament driver used to play the games",
    },
    SlotSpec {
        submodule_type: "chess_engine",
        variable: "engines",
        multiplicity: Multiplicity::Many,
        description: "Engines participating in tuning games",
    },
];

const MANAGER_SLOTS: &[SlotSpec] = &[SlotSpec {
    submodule_type: "training_method",
    variable: "method",
    multiplicity: Multiplicity::One,
    description: "Training method producing parameter vectors",
}];

/// Worker-side builder for [`WorkerBaseChess`].
pub struct WorkerBaseChessBuilder;

impl ModuleBuilder<dyn WorkerModule> for WorkerBaseChessBuilder {
    fn module_name(&self) -> &'static str {
        MODULE_NAME
    }

    fn slots(&self) -> &'static [SlotSpec] {
        WORKER_SLOTS
    }

    fn config_spec(&self) -> Vec<ConfigSpecElement> {
        vec![ConfigSpecElement::optional(
            "games_per_test",
            UiType::String,
            "Number of games played per test job",
        )
        .with_default(json!("2"))]
    }

    fn instantiate(
        &self,
        mut children: ChildSet<dyn WorkerModule>,
    ) -> Result<Box<dyn WorkerModule>, ModuleError> {
        let tournament = take_single(&mut children, "tournament")?;
        let engines = children.remove("engines").unwrap_or_default();
        if engines.is_empty() {
            return Err(ModuleError::BuildFailed("no engines resolved for BaseChessModule".into()));
        }
        Ok(Box::new(WorkerBaseChess { tournament, engines, games_per_test: 2 }))
    }
}

fn take_single<M: ?Sized>(
    children: &mut ChildSet<M>,
    variable: &str,
) -> Result<Box<M>, ModuleError> {
    let mut instances = children.remove(variable).unwrap_or_default();
    match instances.len() {
        1 => instances.pop().ok_or_else(|| {
            ModuleError::BuildFailed(format!("slot {variable} drained unexpectedly"))
        }),
        n => Err(ModuleError::BuildFailed(format!(
            "slot {variable} resolved to {n} instances, expected 1"
        ))),
    }
}

/// Worker-side test module: plays tuning games through a tournament driver.
pub struct WorkerBaseChess {
    tournament: Box<dyn WorkerModule>,
    engines: Vec<Box<dyn WorkerModule>>,
    games_per_test: u64,
}

#[async_trait]
impl WorkerModule for WorkerBaseChess {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn configure_build(
        &mut self,
        config: &ConfigMap,
        prefix: &str,
    ) -> Result<(), ModuleError> {
        let tournament_prefix = child_prefix(prefix, "tournament");
        self.tournament.configure_build(config, &tournament_prefix).await?;

        let engines_prefix = child_prefix(prefix, "engines");
        for engine in &mut self.engines {
            engine.configure_build(config, &engines_prefix).await?;
        }
        Ok(())
    }

    async fn build(&mut self) -> Result<(), ModuleError> {
        self.tournament.build().await?;
        for engine in &mut self.engines {
            engine.build().await?;
        }
        Ok(())
    }

    async fn configure(&mut self, config: &ConfigMap, prefix: &str) -> Result<(), ModuleError> {
        let reader = OptionReader::new(config, prefix, MODULE_NAME);
        let games = reader.str_or("games_per_test", "2")?;
        self.games_per_test =
            games.parse().map_err(|_| ModuleError::InvalidOption {
                option: "games_per_test".to_string(),
                reason: format!("not an integer: {games}"),
            })?;

        let tournament_prefix = child_prefix(prefix, "tournament");
        self.tournament.configure(config, &tournament_prefix).await?;

        let engines_prefix = child_prefix(prefix, "engines");
        for engine in &mut self.engines {
            engine.configure(config, &engines_prefix).await?;
        }
        Ok(())
    }

    async fn run_single_test(&self, args: &str, seed: u64) -> Result<String, ModuleError> {
        let mut enriched: Value = if args.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(args)?
        };

        if !enriched.is_object() {
            return Err(ModuleError::TestFailed("test args must be a JSON object".into()));
        }
        if let Some(map) = enriched.as_object_mut() {
            map.insert(
                "engines".to_string(),
                json!(self.engines.iter().map(|e| e.name()).collect::<Vec<_>>()),
            );
            map.insert("games".to_string(), json!(self.games_per_test));
        }

        self.tournament.run_single_test(&enriched.to_string(), seed).await
    }
}

/// Manager-side builder for [`ManagerBaseChess`].
pub struct ManagerBaseChessBuilder;

impl ModuleBuilder<dyn ManagerModule> for ManagerBaseChessBuilder {
    fn module_name(&self) -> &'static str {
        MODULE_NAME
    }

    fn slots(&self) -> &'static [SlotSpec] {
        MANAGER_SLOTS
    }

    fn instantiate(
        &self,
        mut children: ChildSet<dyn ManagerModule>,
    ) -> Result<Box<dyn ManagerModule>, ModuleError> {
        let method = take_single(&mut children, "method")?;
        Ok(Box::new(ManagerBaseChess { method }))
    }
}

/// Manager-side test module: delegates the training loop to its method.
pub struct ManagerBaseChess {
    method: Box<dyn ManagerModule>,
}

#[async_trait]
impl ManagerModule for ManagerBaseChess {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn configure_build(
        &mut self,
        config: &ConfigMap,
        prefix: &str,
    ) -> Result<(), ModuleError> {
        let method_prefix = child_prefix(prefix, "method");
        self.method.configure_build(config, &method_prefix).await
    }

    async fn build(&mut self) -> Result<(), ModuleError> {
        self.method.build().await
    }

    async fn configure(&mut self, config: &ConfigMap, prefix: &str) -> Result<(), ModuleError> {
        let method_prefix = child_prefix(prefix, "method");
        self.method.configure(config, &method_prefix).await
    }

    async fn prepare_test_args(&self) -> Result<String, ModuleError> {
        self.method.prepare_test_args().await
    }

    async fn sync_test_results(&self, payload: &str) -> Result<(), ModuleError> {
        self.method.sync_test_results(payload).await
    }
}

#[cfg(test)]
#[path = "base_tests.rs"]
mod tests;
