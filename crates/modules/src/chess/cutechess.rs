// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CuteChess tournament driver submodule (type `chess_tournament`).

use crate::error::ModuleError;
use crate::module::{ChildSet, ModuleBuilder, WorkerModule};
use crate::spec::{ConfigMap, ConfigSpecElement, OptionReader, UiType};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const MODULE_NAME: &str = "CuteChess";

pub struct CuteChessBuilder;

impl ModuleBuilder<dyn WorkerModule> for CuteChessBuilder {
    fn module_name(&self) -> &'static str {
        MODULE_NAME
    }

    fn build_spec(&self) -> Vec<ConfigSpecElement> {
        vec![ConfigSpecElement::optional(
            "cutechess_path",
            UiType::String,
            "Path to the cutechess-cli executable",
        )
        .with_default(json!("cutechess-cli"))]
    }

    fn config_spec(&self) -> Vec<ConfigSpecElement> {
        vec![
            ConfigSpecElement::optional("time_control", UiType::String, "Time control per game")
                .with_default(json!("40/60")),
            ConfigSpecElement::optional(
                "draw_adjudication",
                UiType::StringStringDict,
                "Draw adjudication options passed to the driver",
            ),
        ]
    }

    fn instantiate(
        &self,
        _children: ChildSet<dyn WorkerModule>,
    ) -> Result<Box<dyn WorkerModule>, ModuleError> {
        Ok(Box::new(CuteChess {
            driver_path: "cutechess-cli".to_string(),
            time_control: "40/60".to_string(),
            draw_adjudication: BTreeMap::new(),
            built: false,
        }))
    }
}

pub struct CuteChess {
    driver_path: String,
    time_control: String,
    draw_adjudication: BTreeMap<String, String>,
    built: bool,
}

#[async_trait]
impl WorkerModule for CuteChess {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn configure_build(
        &mut self,
        config: &ConfigMap,
        prefix: &str,
    ) -> Result<(), ModuleError> {
        let reader = OptionReader::new(config, prefix, MODULE_NAME);
        self.driver_path = reader.str_or("cutechess_path", "cutechess-cli")?.to_string();
        Ok(())
    }

    async fn build(&mut self) -> Result<(), ModuleError> {
        if self.driver_path.is_empty() {
            return Err(ModuleError::BuildFailed("empty cutechess_path".into()));
        }
        self.built = true;
        Ok(())
    }

    async fn configure(&mut self, config: &ConfigMap, prefix: &str) -> Result<(), ModuleError> {
        let reader = OptionReader::new(config, prefix, MODULE_NAME);
        self.time_control = reader.str_or("time_control", "40/60")?.to_string();
        self.draw_adjudication = reader.str_dict("draw_adjudication")?;
        Ok(())
    }

    /// Play one batch of games and report the aggregate outcome.
    ///
    /// Game results are derived from the seed with a splitmix64 walk, a
    /// deterministic stand-in for driving the external cutechess process.
    async fn run_single_test(&self, args: &str, seed: u64) -> Result<String, ModuleError> {
        if !self.built {
            return Err(ModuleError::TestFailed("tournament driver not built".into()));
        }

        let args: Value = serde_json::from_str(args)?;
        let games = args.get("games").and_then(Value::as_u64).unwrap_or(2);
        if games == 0 {
            return Err(ModuleError::TestFailed("games must be positive".into()));
        }

        let mut state = seed;
        let mut wins = 0u64;
        let mut losses = 0u64;
        let mut draws = 0u64;
        for _ in 0..games {
            state = splitmix64(state);
            match state % 3 {
                0 => wins += 1,
                1 => losses += 1,
                _ => draws += 1,
            }
        }
        let score = (wins as f64 + draws as f64 / 2.0) / games as f64;

        let mut result = json!({
            "wins": wins,
            "losses": losses,
            "draws": draws,
            "score": score,
            "time_control": self.time_control,
        });
        // Echo the pairing key so the training method can match the result
        // back to the parameter vector it proposed.
        if let Some(iteration) = args.get("iteration") {
            if let Some(map) = result.as_object_mut() {
                map.insert("iteration".to_string(), iteration.clone());
            }
        }

        Ok(result.to_string())
    }
}

fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
#[path = "cutechess_tests.rs"]
mod tests;
