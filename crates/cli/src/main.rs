// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! chariot-tune operator CLI (ct)
//!
//! Short-lived front end. FRONTEND commands (`deploy`) run locally;
//! BACKEND commands are always forwarded to the worker daemon's command
//! socket as `{"args": ["--command", "key=value", ...]}` — an absent
//! daemon is an error, never a local fallback.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod deploy;

use clap::{Parser, Subcommand};
use client::DaemonClient;
use ct_core::Settings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ct", version, about = "chariot-tune operator CLI")]
struct Cli {
    /// Worker settings file (for the daemon port and deploy)
    #[arg(long, global = true, default_value = "worker-settings.json")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the worker daemon on this host (FRONTEND)
    Deploy,

    /// Register with a manager: host=… name=… [cpus=…] [memoryMB=…]
    Connect {
        /// key=value pairs understood by the daemon
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Unregister from the manager and drop the channel
    Unregister,

    /// Change the daemon's log level
    SetLogLevel { level: String },

    /// Stop the daemon gently: drain jobs, unregister, exit
    StopWorker,

    /// Abort the daemon: cut sockets and jobs immediately
    AbortWorker,

    /// Abort in-flight jobs, optionally only one task's
    AbortJobs { task_name: Option<String> },

    /// Toggle the jobs-block switch: type={enable|disable} [host_name=…]
    SwitchJobsBlock {
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Print the daemon's state summary
    QueryWorkerState,
}

impl Command {
    /// Serialize a BACKEND command into the daemon's argv form.
    /// FRONTEND commands return `None`.
    fn backend_args(&self) -> Option<Vec<String>> {
        let mut args: Vec<String> = Vec::new();
        match self {
            Command::Deploy => return None,
            Command::Connect { pairs } => {
                args.push("--connect".to_string());
                args.extend(pairs.iter().cloned());
            }
            Command::Unregister => args.push("--unregister".to_string()),
            Command::SetLogLevel { level } => {
                args.push("--set_log_level".to_string());
                args.push(level.clone());
            }
            Command::StopWorker => args.push("--stop_worker".to_string()),
            Command::AbortWorker => args.push("--abort_worker".to_string()),
            Command::AbortJobs { task_name } => {
                args.push("--abort_jobs".to_string());
                if let Some(task_name) = task_name {
                    args.push(task_name.clone());
                }
            }
            Command::SwitchJobsBlock { pairs } => {
                args.push("--switch_jobs_block".to_string());
                args.extend(pairs.iter().cloned());
            }
            Command::QueryWorkerState => args.push("--query_worker_state".to_string()),
        }
        Some(args)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.backend_args() {
        None => match &cli.command {
            Command::Deploy => {
                let settings_path = cli.settings.exists().then_some(&cli.settings);
                let message = deploy::deploy(settings_path)?;
                println!("{message}");
                Ok(())
            }
            _ => unreachable!("non-deploy FRONTEND command"),
        },
        Some(args) => {
            let settings = Settings::load(&cli.settings)?;
            let client = DaemonClient::new(settings.process_port);

            let reply = client.send(args).await?;
            println!("{reply}");

            if reply.starts_with("SUCCESS") {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
