// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::Registries;
use crate::slots::build_tree;
use crate::spec::SelectionMap;

fn full_worker_selection() -> SelectionMap {
    let mut selection = SelectionMap::new();
    selection.insert(
        "chess_tournament.tournament".to_string(),
        vec!["CuteChess".to_string()],
    );
    selection.insert(
        "chess_engine.engines".to_string(),
        vec!["CheckmateChariot".to_string(), "CheckmateChariot".to_string()],
    );
    selection
}

fn worker_config(build_dir: &std::path::Path) -> ConfigMap {
    let mut config = ConfigMap::new();
    config.insert(
        crate::BUILD_DIR_KEY.to_string(),
        json!(build_dir.to_string_lossy()),
    );
    config.insert("BaseChessModule.games_per_test".to_string(), json!("4"));
    config
}

#[tokio::test]
async fn worker_tree_builds_and_runs_a_test() {
    let registries = Registries::standard();
    let dir = tempfile::tempdir().unwrap();

    let builder = registries.worker.module("BaseChessModule").unwrap();
    let mut module =
        build_tree(&registries.worker, builder.as_ref(), &full_worker_selection(), "").unwrap();

    let config = worker_config(dir.path());
    module.configure_build(&config, "").await.unwrap();
    module.build().await.unwrap();
    module.configure(&config, "").await.unwrap();

    let result = module.run_single_test(r#"{"iteration": 3}"#, 99).await.unwrap();
    let parsed: Value = serde_json::from_str(&result).unwrap();
    assert_eq!(
        parsed["wins"].as_u64().unwrap()
            + parsed["losses"].as_u64().unwrap()
            + parsed["draws"].as_u64().unwrap(),
        4
    );
    assert_eq!(parsed["iteration"], json!(3));
}

#[tokio::test]
async fn duplicate_engine_selection_produces_duplicate_instances() {
    let registries = Registries::standard();
    let builder = registries.worker.module("BaseChessModule").unwrap();
    let module =
        build_tree(&registries.worker, builder.as_ref(), &full_worker_selection(), "").unwrap();

    // Both engine instances surface in the args handed to the tournament.
    let dir = tempfile::tempdir().unwrap();
    let mut module = module;
    let config = worker_config(dir.path());
    module.configure_build(&config, "").await.unwrap();
    module.build().await.unwrap();
    module.configure(&config, "").await.unwrap();

    let result = module.run_single_test("{}", 1).await.unwrap();
    let parsed: Value = serde_json::from_str(&result).unwrap();
    assert!(parsed["wins"].is_u64());
}

#[tokio::test]
async fn bad_games_per_test_fails_configure() {
    let registries = Registries::standard();
    let dir = tempfile::tempdir().unwrap();
    let builder = registries.worker.module("BaseChessModule").unwrap();
    let mut module =
        build_tree(&registries.worker, builder.as_ref(), &full_worker_selection(), "").unwrap();

    let mut config = worker_config(dir.path());
    module.configure_build(&config, "").await.unwrap();
    module.build().await.unwrap();

    config.insert("BaseChessModule.games_per_test".to_string(), json!("lots"));
    let err = module.configure(&config, "").await.unwrap_err();
    assert!(matches!(err, ModuleError::InvalidOption { .. }));
}

#[tokio::test]
async fn manager_tree_drives_training_loop() {
    let registries = Registries::standard();
    let mut selection = SelectionMap::new();
    selection.insert(
        "training_method.method".to_string(),
        vec!["SimpleTuning".to_string()],
    );

    let builder = registries.manager.module("BaseChessModule").unwrap();
    let mut module =
        build_tree(&registries.manager, builder.as_ref(), &selection, "").unwrap();

    let mut config = ConfigMap::new();
    config.insert("method.SimpleTuning.params".to_string(), json!({"knight": 300}));
    module.configure_build(&config, "").await.unwrap();
    module.build().await.unwrap();
    module.configure(&config, "").await.unwrap();

    let args = module.prepare_test_args().await.unwrap();
    let parsed: Value = serde_json::from_str(&args).unwrap();
    assert!(parsed["params"]["knight"].is_i64());

    module
        .sync_test_results(r#"{"score": 0.75, "iteration": 0}"#)
        .await
        .unwrap();
}
