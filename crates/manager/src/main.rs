// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! chariot-tune Manager daemon (ct-managerd)
//!
//! Central orchestrator process: serves the operator HTTP API and the
//! worker WebSocket channel, and owns the task engine, job scheduler, and
//! worker registry.

use ct_core::{Settings, SettingsStore};
use ct_manager::{api, ManagerComponents};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = match parse_args() {
        ParsedArgs::Run { settings_path } => settings_path,
        ParsedArgs::Exit => return Ok(()),
    };

    let store = Arc::new(SettingsStore::open(&settings_path)?);
    let snapshot = store.snapshot();

    std::fs::create_dir_all(&snapshot.build_dir)?;

    let _log_guard = setup_logging(&snapshot)?;
    info!(settings = %settings_path.display(), "starting manager");

    let components = ManagerComponents::start(Arc::clone(&store));

    // Keep the settings file live: edits re-publish through the store.
    let _watcher = match ct_core::spawn_settings_watcher(Arc::clone(&store), settings_path.clone())
    {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            error!(error = %e, "settings watcher unavailable, file edits will be ignored");
            None
        }
    };

    let port = snapshot.manager_port;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "manager listening");

    let router = api::router(Arc::clone(&components));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    components.shutdown();
    info!("manager stopped");
    Ok(())
}

enum ParsedArgs {
    Run { settings_path: PathBuf },
    Exit,
}

fn parse_args() -> ParsedArgs {
    let mut settings_path = PathBuf::from("manager-settings.json");
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("ct-managerd {}", env!("CARGO_PKG_VERSION"));
                return ParsedArgs::Exit;
            }
            "--help" | "-h" => {
                println!("ct-managerd {}", env!("CARGO_PKG_VERSION"));
                println!("chariot-tune manager daemon");
                println!();
                println!("USAGE:");
                println!("    ct-managerd [--settings PATH]");
                println!();
                println!("OPTIONS:");
                println!("    --settings PATH  Settings file (default: manager-settings.json)");
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
                eprintln!("Usage: ct-managerd [--settings PATH]");
                std::process::exit(1);
            }
        }
    }

    ParsedArgs::Run { settings_path }
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return std::future::pending::<()>().await;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            return std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }
}

fn setup_logging(
    settings: &Settings,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = &settings.logger_path;
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let directory = log_path.parent().filter(|p| !p.as_os_str().is_empty());
    let file_name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("logger_path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(
        directory.unwrap_or_else(|| std::path::Path::new(".")),
        file_name,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false));

    if settings.log_std_out {
        registry.with(fmt::layer()).init();
    } else {
        registry.init();
    }

    Ok(guard)
}
