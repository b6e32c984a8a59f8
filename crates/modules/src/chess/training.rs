// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinate-probing training method (type `training_method`).
//!
//! Proposes one perturbed parameter vector per test, pairs completed
//! results back to their proposals by iteration number, and keeps the best
//! vector seen.

use crate::error::ModuleError;
use crate::module::{ChildSet, ManagerModule, ModuleBuilder};
use crate::spec::{ConfigMap, ConfigSpecElement, OptionReader, UiType};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

const MODULE_NAME: &str = "SimpleTuning";

pub struct SimpleTuningBuilder;

impl ModuleBuilder<dyn ManagerModule> for SimpleTuningBuilder {
    fn module_name(&self) -> &'static str {
        MODULE_NAME
    }

    fn config_spec(&self) -> Vec<ConfigSpecElement> {
        vec![
            ConfigSpecElement::required(
                "params",
                UiType::StringIntPairDict,
                "Initial parameter vector to tune",
            ),
            ConfigSpecElement::optional("step", UiType::String, "Probe step size")
                .with_default(json!("1")),
        ]
    }

    fn instantiate(
        &self,
        _children: ChildSet<dyn ManagerModule>,
    ) -> Result<Box<dyn ManagerModule>, ModuleError> {
        Ok(Box::new(SimpleTuning { state: Mutex::new(TuningState::default()) }))
    }
}

#[derive(Default)]
struct TuningState {
    current: BTreeMap<String, i64>,
    step: i64,
    iteration: u64,
    best_score: Option<f64>,
    /// Proposals awaiting a result, keyed by iteration.
    pending: BTreeMap<u64, BTreeMap<String, i64>>,
}

pub struct SimpleTuning {
    state: Mutex<TuningState>,
}

#[async_trait]
impl ManagerModule for SimpleTuning {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn configure_build(
        &mut self,
        _config: &ConfigMap,
        _prefix: &str,
    ) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn build(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn configure(&mut self, config: &ConfigMap, prefix: &str) -> Result<(), ModuleError> {
        let reader = OptionReader::new(config, prefix, MODULE_NAME);
        let params = reader.require_int_dict("params")?;
        if params.is_empty() {
            return Err(ModuleError::InvalidOption {
                option: "params".to_string(),
                reason: "parameter vector must not be empty".to_string(),
            });
        }
        let step_raw = reader.str_or("step", "1")?;
        let step: i64 = step_raw.parse().map_err(|_| ModuleError::InvalidOption {
            option: "step".to_string(),
            reason: format!("not an integer: {step_raw}"),
        })?;

        let mut state = self.state.lock();
        *state = TuningState { current: params, step, ..TuningState::default() };
        Ok(())
    }

    async fn prepare_test_args(&self) -> Result<String, ModuleError> {
        let mut state = self.state.lock();
        if state.current.is_empty() {
            return Err(ModuleError::TestFailed("training method not configured".into()));
        }

        let iteration = state.iteration;
        state.iteration += 1;

        // Probe one coordinate per iteration, alternating direction.
        let param_count = state.current.len() as u64;
        let index = (iteration % param_count) as usize;
        let direction = if (iteration / param_count) % 2 == 0 { 1 } else { -1 };

        let mut candidate = state.current.clone();
        if let Some((_, value)) = candidate.iter_mut().nth(index) {
            *value += direction * state.step;
        }

        state.pending.insert(iteration, candidate.clone());

        Ok(json!({ "params": candidate, "iteration": iteration }).to_string())
    }

    async fn sync_test_results(&self, payload: &str) -> Result<(), ModuleError> {
        let payload: Value = serde_json::from_str(payload)?;
        let score = payload
            .get("score")
            .and_then(Value::as_f64)
            .ok_or_else(|| ModuleError::TestFailed("result payload missing score".into()))?;
        let iteration = payload.get("iteration").and_then(Value::as_u64);

        let mut state = self.state.lock();
        let candidate = iteration.and_then(|i| state.pending.remove(&i));

        let improved = state.best_score.is_none_or(|best| score > best);
        if improved {
            state.best_score = Some(score);
            if let Some(candidate) = candidate {
                debug!(score, "tuning improved, adopting candidate vector");
                state.current = candidate;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "training_tests.rs"]
mod tests;
