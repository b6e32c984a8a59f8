// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings file watcher: re-publishes the store when the file changes.

use crate::settings::SettingsStore;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Watch a settings file and republish the store on modification.
///
/// Malformed edits are logged and skipped, keeping the last good snapshot.
/// The returned watcher must be kept alive for the watch to stay active.
pub fn spawn_settings_watcher(
    store: Arc<SettingsStore>,
    path: PathBuf,
) -> notify::Result<RecommendedWatcher> {
    let watch_target = path.clone();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "settings watcher error");
                return;
            }
        };

        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }

        match store.reload(&path) {
            Ok(true) => info!(path = %path.display(), "settings re-published from file"),
            Ok(false) => debug!(path = %path.display(), "settings file touched, record unchanged"),
            Err(e) => warn!(error = %e, "ignoring settings change, keeping last good snapshot"),
        }
    })?;

    // Watch the parent directory: editors replace files by rename, which a
    // direct file watch loses track of after the first swap.
    let watch_dir = watch_target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    Ok(watcher)
}

#[cfg(test)]
#[path = "settings_watch_tests.rs"]
mod tests;
