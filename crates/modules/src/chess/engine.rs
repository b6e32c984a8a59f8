// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkmate-Chariot engine submodule (type `chess_engine`).

use crate::error::ModuleError;
use crate::module::{ChildSet, ModuleBuilder, WorkerModule};
use crate::spec::{ConfigMap, ConfigSpecElement, OptionReader, UiType};
use crate::BUILD_DIR_KEY;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;

const MODULE_NAME: &str = "CheckmateChariot";
const DEFAULT_REPO: &str = "https://github.com/Jlisowskyy/Checkmate-Chariot";

pub struct CheckmateChariotBuilder;

impl ModuleBuilder<dyn WorkerModule> for CheckmateChariotBuilder {
    fn module_name(&self) -> &'static str {
        MODULE_NAME
    }

    fn build_spec(&self) -> Vec<ConfigSpecElement> {
        vec![
            ConfigSpecElement::optional("repo_url", UiType::String, "Engine repository URL")
                .with_default(json!(DEFAULT_REPO)),
            ConfigSpecElement::optional(
                "build_flags",
                UiType::StringList,
                "Extra flags passed to the engine build",
            ),
        ]
    }

    fn config_spec(&self) -> Vec<ConfigSpecElement> {
        vec![ConfigSpecElement::optional(
            "uci_options",
            UiType::StringStringDict,
            "UCI options applied before each game",
        )]
    }

    fn instantiate(
        &self,
        _children: ChildSet<dyn WorkerModule>,
    ) -> Result<Box<dyn WorkerModule>, ModuleError> {
        Ok(Box::new(CheckmateChariot {
            repo_url: DEFAULT_REPO.to_string(),
            build_flags: Vec::new(),
            uci_options: BTreeMap::new(),
            build_dir: None,
            engine_dir: None,
        }))
    }
}

pub struct CheckmateChariot {
    repo_url: String,
    build_flags: Vec<String>,
    uci_options: BTreeMap<String, String>,
    build_dir: Option<PathBuf>,
    engine_dir: Option<PathBuf>,
}

#[async_trait]
impl WorkerModule for CheckmateChariot {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn configure_build(
        &mut self,
        config: &ConfigMap,
        prefix: &str,
    ) -> Result<(), ModuleError> {
        let reader = OptionReader::new(config, prefix, MODULE_NAME);
        self.repo_url = reader.str_or("repo_url", DEFAULT_REPO)?.to_string();
        self.build_flags = reader.str_list("build_flags")?;

        // The process-wide build directory is injected unqualified into the
        // branch, outside any module namespace.
        self.build_dir = config
            .get(BUILD_DIR_KEY)
            .and_then(serde_json::Value::as_str)
            .map(PathBuf::from);
        if self.build_dir.is_none() {
            return Err(ModuleError::MissingOption(BUILD_DIR_KEY.to_string()));
        }
        Ok(())
    }

    /// Lay out the engine's build directory and record what was requested.
    ///
    /// Overwrites any previous receipt, so a retried build after a partial
    /// failure converges on the same layout.
    async fn build(&mut self) -> Result<(), ModuleError> {
        let Some(build_dir) = &self.build_dir else {
            return Err(ModuleError::BuildFailed("build directory not configured".into()));
        };

        let engine_dir = build_dir.join("engines").join(MODULE_NAME);
        std::fs::create_dir_all(&engine_dir)?;

        let receipt = json!({
            "repo_url": self.repo_url,
            "build_flags": self.build_flags,
        });
        std::fs::write(engine_dir.join("build-receipt.json"), receipt.to_string())?;

        self.engine_dir = Some(engine_dir);
        Ok(())
    }

    async fn configure(&mut self, config: &ConfigMap, prefix: &str) -> Result<(), ModuleError> {
        if self.engine_dir.is_none() {
            return Err(ModuleError::BuildFailed("engine configured before build".into()));
        }
        let reader = OptionReader::new(config, prefix, MODULE_NAME);
        self.uci_options = reader.str_dict("uci_options")?;
        Ok(())
    }

    async fn run_single_test(&self, _args: &str, _seed: u64) -> Result<String, ModuleError> {
        Err(ModuleError::TestFailed(
            "engine module does not execute tests directly; drive it through a tournament".into(),
        ))
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
