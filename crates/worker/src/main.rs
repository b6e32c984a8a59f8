// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! chariot-tune Worker daemon (ctwd)
//!
//! The single long-lived Worker-side process: owns the host lockfile, the
//! localhost command socket, the Manager channel, and the local job pool.
//!
//! Typically started by `ct deploy`; it serves `ct` back-end commands over
//! the command socket until stopped.

use ct_core::{Settings, SettingsStore};
use ct_worker::{daemon::WorkerComponents, default_lockfile_path, listener, LockFile, LockFileError};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Startup marker prefix written to the log before anything else, so the
/// CLI can find where the current startup attempt begins.
const STARTUP_MARKER_PREFIX: &str = "--- ctwd: starting (pid: ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = match parse_args() {
        ParsedArgs::Run { settings_path } => settings_path,
        ParsedArgs::Exit => return Ok(()),
    };

    let store = Arc::new(SettingsStore::open(&settings_path)?);
    let snapshot = store.snapshot();

    rotate_log_if_needed(&snapshot.logger_path);
    write_startup_marker(&snapshot.logger_path)?;
    let (_log_guard, log_level_setter) = setup_logging(&snapshot)?;

    // Singleton enforcement before any other resource is touched.
    let lockfile = match LockFile::acquire(&default_lockfile_path()) {
        Ok(lockfile) => lockfile,
        Err(LockFileError::AlreadyRunning { pid }) => {
            eprintln!("ctwd is already running (pid {pid})");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "failed to acquire lockfile");
            return Err(e.into());
        }
    };

    info!(settings = %settings_path.display(), "starting worker daemon");

    let components = WorkerComponents::new(Arc::clone(&store), log_level_setter);

    let _watcher = match ct_core::spawn_settings_watcher(Arc::clone(&store), settings_path.clone())
    {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            error!(error = %e, "settings watcher unavailable, file edits will be ignored");
            None
        }
    };

    let port = snapshot.process_port;
    let command_listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let listener_cancel = CancellationToken::new();
    let listener_task = tokio::spawn(listener::run_listener(
        command_listener,
        Arc::clone(&components),
        listener_cancel.clone(),
    ));

    let shutdown = wait_for_shutdown(&components).await;
    listener_cancel.cancel();
    let _ = listener_task.await;

    match shutdown {
        ShutdownMode::Gentle => components.gentle_shutdown().await,
        ShutdownMode::Abort => components.abort_shutdown(),
    }

    lockfile.release();
    info!("worker daemon stopped");
    Ok(())
}

enum ShutdownMode {
    Gentle,
    Abort,
}

async fn wait_for_shutdown(components: &Arc<WorkerComponents>) -> ShutdownMode {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            components.gentle_stop_requested().cancelled().await;
            return ShutdownMode::Gentle;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            components.gentle_stop_requested().cancelled().await;
            return ShutdownMode::Gentle;
        }
    };

    tokio::select! {
        _ = components.gentle_stop_requested().cancelled() => {
            info!("gentle stop requested");
            ShutdownMode::Gentle
        }
        _ = components.abort_requested().cancelled() => {
            info!("abort requested");
            ShutdownMode::Abort
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, stopping gently");
            ShutdownMode::Gentle
        }
        _ = sigint.recv() => {
            info!("received SIGINT, stopping gently");
            ShutdownMode::Gentle
        }
    }
}

enum ParsedArgs {
    Run { settings_path: PathBuf },
    Exit,
}

fn parse_args() -> ParsedArgs {
    let mut settings_path = PathBuf::from("worker-settings.json");
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("ctwd {}", env!("CARGO_PKG_VERSION"));
                return ParsedArgs::Exit;
            }
            "--help" | "-h" => {
                println!("ctwd {}", env!("CARGO_PKG_VERSION"));
                println!("chariot-tune worker daemon");
                println!();
                println!("USAGE:");
                println!("    ctwd [--settings PATH]");
                println!();
                println!("The daemon is typically started by `ct deploy` and should not");
                println!("be invoked directly. It listens on a localhost socket for");
                println!("commands from `ct`.");
                println!();
                println!("OPTIONS:");
                println!("    --settings PATH  Settings file (default: worker-settings.json)");
                println!("    -h, --help       Print help information");
                println!("    -V, --version    Print version information");
                return ParsedArgs::Exit;
            }
            "--settings" => {
                if let Some(path) = args.next() {
                    settings_path = PathBuf::from(path);
                } else {
                    eprintln!("error: --settings requires a path");
                    std::process::exit(1);
                }
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: ctwd [--settings PATH]");
                std::process::exit(1);
            }
        }
    }

    ParsedArgs::Run { settings_path }
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Shift `x.log` → `x.log.1` → … when the current file grows too large.
/// Best-effort: rotation failures never block startup.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn write_startup_marker(log_path: &std::path::Path) -> Result<(), std::io::Error> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

type LogLevelSetter = Box<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

fn setup_logging(
    settings: &Settings,
) -> Result<(tracing_appender::non_blocking::WorkerGuard, LogLevelSetter), std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

    let log_path = &settings.logger_path;
    let directory = log_path.parent().filter(|p| !p.as_os_str().is_empty());
    let file_name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("logger_path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(
        directory.unwrap_or_else(|| std::path::Path::new(".")),
        file_name,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let initial = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    let (filter, reload_handle) = reload::Layer::new(initial);

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false));

    if settings.log_std_out {
        registry.with(fmt::layer()).init();
    } else {
        registry.init();
    }

    let setter: LogLevelSetter = Box::new(move |level| {
        let fresh = EnvFilter::try_new(level).map_err(|e| format!("invalid log level: {e}"))?;
        reload_handle
            .reload(fresh)
            .map_err(|e| format!("failed to apply log level: {e}"))
    });

    Ok((guard, setter))
}
