// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn standard_catalog_has_base_chess_in_both_families() {
    let registries = Registries::standard();
    assert!(registries.validate_module("BaseChessModule").is_ok());
    assert_eq!(registries.available_modules(), vec!["BaseChessModule"]);
}

#[test]
fn unknown_module_is_rejected() {
    let registries = Registries::standard();
    let err = registries.validate_module("NoSuchModule").unwrap_err();
    assert!(matches!(err, ModuleError::UnknownModule(name) if name == "NoSuchModule"));
}

#[test]
fn submodule_lookup_by_type_and_name() {
    let registries = Registries::standard();
    assert!(registries.worker.submodule("chess_tournament", "CuteChess").is_ok());
    assert!(registries.worker.submodule("chess_engine", "CheckmateChariot").is_ok());
    assert!(registries.manager.submodule("training_method", "SimpleTuning").is_ok());

    let err = registries.worker.submodule("chess_engine", "Stockfish").unwrap_err();
    assert!(matches!(err, ModuleError::UnknownSubModule { .. }));
}

#[test]
fn submodule_names_keep_registration_order() {
    let registries = Registries::standard();
    assert_eq!(
        registries.worker.submodule_names("chess_tournament"),
        vec!["CuteChess".to_string()]
    );
    assert!(registries.worker.submodule_names("no_such_type").is_empty());
}

#[test]
fn active_submodules_merges_families() {
    let registries = Registries::standard();
    let merged = registries.active_submodules();

    assert_eq!(merged.get("chess_tournament"), Some(&vec!["CuteChess".to_string()]));
    assert_eq!(merged.get("chess_engine"), Some(&vec!["CheckmateChariot".to_string()]));
    assert_eq!(merged.get("training_method"), Some(&vec!["SimpleTuning".to_string()]));
}
