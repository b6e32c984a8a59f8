// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ct_core::Settings;
use serde_json::json;

fn settings() -> Arc<SettingsStore> {
    Arc::new(SettingsStore::new(Settings::default()))
}

fn task() -> TestTask {
    TestTask::new(
        TaskId(0),
        "t1".to_string(),
        String::new(),
        "BaseChessModule".to_string(),
        Registries::standard(),
        settings(),
    )
    .unwrap()
}

fn worker_selection() -> SelectionMap {
    let mut selection = SelectionMap::new();
    selection.insert("chess_tournament.tournament".into(), vec!["CuteChess".into()]);
    selection.insert("chess_engine.engines".into(), vec!["CheckmateChariot".into()]);
    selection
}

fn manager_selection() -> SelectionMap {
    let mut selection = SelectionMap::new();
    selection.insert("training_method.method".into(), vec!["SimpleTuning".into()]);
    selection
}

fn build_payload() -> Value {
    json!({"worker_build_config": {}, "manager_build_config": {}})
}

fn config_payload() -> Value {
    json!({
        "worker_config": {},
        "manager_config": {"method.SimpleTuning.params": {"knight": 300}},
    })
}

fn initiated() -> TestTask {
    let task = task();
    task.try_init(worker_selection(), manager_selection()).unwrap();
    task
}

fn ready() -> TestTask {
    let task = initiated();
    task.try_build(&build_payload()).unwrap();
    task.try_config(&config_payload()).unwrap();
    task
}

#[test]
fn unknown_module_is_rejected_at_creation() {
    let err = TestTask::new(
        TaskId(0),
        "t1".to_string(),
        String::new(),
        "NoSuchModule".to_string(),
        Registries::standard(),
        settings(),
    )
    .unwrap_err();
    assert!(matches!(err, ModuleError::UnknownModule(_)));
}

#[test]
fn fresh_task_is_uninitiated_at_generation_zero() {
    let task = task();
    assert_eq!(task.state(), TaskState::Uninitiated);
    assert_eq!(task.generation(), 0);
}

#[test]
fn init_reports_first_unfilled_slot_per_side() {
    let task = task();

    let (worker_needed, manager_needed) =
        task.try_init(SelectionMap::new(), SelectionMap::new()).unwrap();

    assert_eq!(worker_needed.unwrap().name, "chess_tournament.tournament");
    assert_eq!(manager_needed.unwrap().name, "training_method.method");
    // Unresolved sides leave the state machine alone.
    assert_eq!(task.state(), TaskState::Uninitiated);
    assert_eq!(task.generation(), 0);
}

#[test]
fn init_iterates_to_initiated() {
    let task = task();

    let mut worker_sel = SelectionMap::new();
    worker_sel.insert("chess_tournament.tournament".into(), vec!["CuteChess".into()]);
    let (worker_needed, _) = task.try_init(worker_sel, manager_selection()).unwrap();
    assert_eq!(worker_needed.unwrap().name, "chess_engine.engines");
    assert_eq!(task.state(), TaskState::Uninitiated);

    let (worker_needed, manager_needed) =
        task.try_init(worker_selection(), manager_selection()).unwrap();
    assert!(worker_needed.is_none());
    assert!(manager_needed.is_none());
    assert_eq!(task.state(), TaskState::Initiated);
    assert_eq!(task.generation(), 1);
}

#[test]
fn init_with_complete_selection_is_idempotent() {
    let task = initiated();
    let generation = task.generation();

    let (worker_needed, manager_needed) =
        task.try_init(worker_selection(), manager_selection()).unwrap();
    assert!(worker_needed.is_none());
    assert!(manager_needed.is_none());
    assert_eq!(task.state(), TaskState::Initiated);
    assert_eq!(task.generation(), generation);
}

#[test]
fn init_after_build_is_wrong_state() {
    let task = initiated();
    task.try_build(&build_payload()).unwrap();

    let err = task.try_init(SelectionMap::new(), SelectionMap::new()).unwrap_err();
    assert!(matches!(err, TaskError::WrongState { got: TaskState::Built, .. }));
}

#[test]
fn build_requires_initiated() {
    let task = task();
    let err = task.try_build(&build_payload()).unwrap_err();
    assert!(matches!(err, TaskError::WrongState { got: TaskState::Uninitiated, .. }));
}

#[test]
fn build_rejects_missing_branch() {
    let task = initiated();
    let err = task.try_build(&json!({"worker_build_config": {}})).unwrap_err();
    assert!(matches!(err, TaskError::MalformedConfig(_)));
    // Failed transition leaves state untouched.
    assert_eq!(task.state(), TaskState::Initiated);
}

#[test]
fn build_rejects_non_object_branch() {
    let task = initiated();
    let err = task
        .try_build(&json!({"worker_build_config": [], "manager_build_config": {}}))
        .unwrap_err();
    assert!(matches!(err, TaskError::MalformedConfig(_)));
}

#[test]
fn build_type_checks_worker_branch() {
    let task = initiated();
    let payload = json!({
        "worker_build_config": {"tournament.CuteChess.cutechess_path": 17},
        "manager_build_config": {},
    });
    let err = task.try_build(&payload).unwrap_err();
    assert!(matches!(err, TaskError::Module(ModuleError::InvalidOption { .. })));
    assert_eq!(task.state(), TaskState::Initiated);
}

#[test]
fn happy_path_reaches_ready_with_monotone_generation() {
    let task = task();
    assert_eq!(task.generation(), 0);

    task.try_init(worker_selection(), manager_selection()).unwrap();
    assert_eq!(task.generation(), 1);

    task.try_build(&build_payload()).unwrap();
    assert_eq!(task.state(), TaskState::Built);
    assert_eq!(task.generation(), 2);

    task.try_config(&config_payload()).unwrap();
    assert_eq!(task.state(), TaskState::Ready);
    assert_eq!(task.generation(), 3);
}

#[test]
fn config_requires_built() {
    let task = initiated();
    let err = task.try_config(&config_payload()).unwrap_err();
    assert!(matches!(err, TaskError::WrongState { got: TaskState::Initiated, .. }));
}

#[test]
fn bad_manager_config_leaves_task_built() {
    let task = initiated();
    task.try_build(&build_payload()).unwrap();

    let payload = json!({
        "worker_config": {},
        "manager_config": {"method.SimpleTuning.params": {}},
    });
    let err = task.try_config(&payload).unwrap_err();
    assert!(matches!(err, TaskError::Module(ModuleError::InvalidOption { .. })));
    assert_eq!(task.state(), TaskState::Built);
}

#[test]
fn build_dir_is_injected_into_stored_branches() {
    let task = initiated();
    task.try_build(&build_payload()).unwrap();

    let snapshot = task.snapshot();
    assert!(snapshot.worker_build_config.contains_key(ct_modules::BUILD_DIR_KEY));
    assert!(snapshot.manager_build_config.contains_key(ct_modules::BUILD_DIR_KEY));
}

#[test]
fn config_spec_is_pure() {
    let task = initiated();
    let (worker_a, manager_a) = task.config_spec().unwrap();
    let (worker_b, manager_b) = task.config_spec().unwrap();
    assert_eq!(worker_a, worker_b);
    assert_eq!(manager_a, manager_b);
    assert!(!worker_a.is_empty());
    assert!(!manager_a.is_empty());
}

#[test]
fn build_spec_lists_qualified_names() {
    let task = initiated();
    let (worker, _manager) = task.build_spec().unwrap();

    let names: Vec<&str> = worker.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"tournament.CuteChess.cutechess_path"));
    assert!(names.contains(&"engines.CheckmateChariot.repo_url"));
}

#[test]
fn spec_collection_requires_resolved_selection() {
    let task = task();
    task.try_init(SelectionMap::new(), SelectionMap::new()).unwrap();

    let err = task.config_spec().unwrap_err();
    assert!(matches!(err, TaskError::Module(ModuleError::NeedsSubmodule { .. })));
}

#[test]
fn setup_args_requires_ready() {
    let task = initiated();
    assert!(matches!(task.setup_args(), Err(TaskError::WrongState { .. })));

    let task = ready();
    let args = task.setup_args().unwrap();
    assert_eq!(args.module_name, "BaseChessModule");
    assert_eq!(args.generation, task.generation());
    assert!(args.worker_init.contains_key("chess_tournament.tournament"));
}

#[test]
fn prepare_and_sync_round_trip_through_manager_module() {
    let task = ready();

    let args = task.prepare_test_args().unwrap();
    let parsed: Value = serde_json::from_str(&args).unwrap();
    assert!(parsed["params"]["knight"].is_i64());

    task.sync_test_results(r#"{"score": 0.8, "iteration": 0}"#).unwrap();
}

#[test]
fn prepare_before_init_has_no_module() {
    let task = task();
    assert!(matches!(task.prepare_test_args(), Err(TaskError::ModuleMissing)));
}
