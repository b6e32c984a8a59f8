// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Back-end command set: parsing of the `--command key=value` argv tokens
//! shipped over the control socket, and their execution against the
//! daemon's components.

use crate::daemon::WorkerComponents;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    Connect { host: String, name: String, cpus: Option<u32>, memory_mb: Option<u64> },
    Unregister,
    SetLogLevel { level: String },
    StopWorker,
    AbortWorker,
    AbortJobs { task_name: Option<String> },
    SwitchJobsBlock { enable: bool, host_name: Option<String> },
    QueryWorkerState,
}

/// Parse one forwarded invocation: a `--command` token followed by its
/// arguments.
pub fn parse(args: &[String]) -> Result<BackendCommand, String> {
    let Some((command, rest)) = args.split_first() else {
        return Err("empty command".to_string());
    };

    match command.as_str() {
        "--connect" => {
            let pairs = key_values(rest)?;
            let host = require(&pairs, "host")?;
            let name = require(&pairs, "name")?;
            let cpus = parse_opt(&pairs, "cpus")?;
            let memory_mb = parse_opt(&pairs, "memoryMB")?;
            Ok(BackendCommand::Connect { host, name, cpus, memory_mb })
        }
        "--unregister" => no_args(rest, BackendCommand::Unregister),
        "--set_log_level" => match rest {
            [level] => Ok(BackendCommand::SetLogLevel { level: level.clone() }),
            _ => Err("usage: --set_log_level LEVEL".to_string()),
        },
        "--stop_worker" => no_args(rest, BackendCommand::StopWorker),
        "--abort_worker" => no_args(rest, BackendCommand::AbortWorker),
        "--abort_jobs" => match rest {
            [] => Ok(BackendCommand::AbortJobs { task_name: None }),
            [task_name] => Ok(BackendCommand::AbortJobs { task_name: Some(task_name.clone()) }),
            _ => Err("usage: --abort_jobs [TASK_NAME]".to_string()),
        },
        "--switch_jobs_block" => {
            let pairs = key_values(rest)?;
            let enable = match require(&pairs, "type")?.as_str() {
                "enable" => true,
                "disable" => false,
                other => return Err(format!("type must be enable or disable, got {other}")),
            };
            let host_name = pairs.get("host_name").cloned();
            Ok(BackendCommand::SwitchJobsBlock { enable, host_name })
        }
        "--query_worker_state" => no_args(rest, BackendCommand::QueryWorkerState),
        other => Err(format!("unknown command: {other}")),
    }
}

/// Execute a parsed command against the daemon, producing the reply line.
pub async fn execute(args: &[String], components: &Arc<WorkerComponents>) -> String {
    let command = match parse(args) {
        Ok(command) => command,
        Err(e) => return format!("ERROR: {e}"),
    };

    let outcome = match command {
        BackendCommand::Connect { host, name, cpus, memory_mb } => {
            components.connect(host, name, cpus, memory_mb).await
        }
        BackendCommand::Unregister => components.disconnect(true).await,
        BackendCommand::SetLogLevel { level } => components.set_log_level(&level),
        BackendCommand::StopWorker => {
            components.request_gentle_stop();
            Ok("worker stopping".to_string())
        }
        BackendCommand::AbortWorker => {
            components.request_abort();
            Ok("worker aborting".to_string())
        }
        BackendCommand::AbortJobs { task_name } => {
            let aborted = components.jobs().abort(task_name.as_deref());
            Ok(format!("aborted {aborted} job(s)"))
        }
        BackendCommand::SwitchJobsBlock { enable, host_name } => {
            components.switch_jobs_block(enable, host_name.as_deref())
        }
        BackendCommand::QueryWorkerState => Ok(components.state_report()),
    };

    match outcome {
        Ok(message) => format!("SUCCESS: {message}"),
        Err(e) => format!("ERROR: {e}"),
    }
}

fn no_args(rest: &[String], command: BackendCommand) -> Result<BackendCommand, String> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(format!("unexpected arguments: {}", rest.join(" ")))
    }
}

fn key_values(tokens: &[String]) -> Result<BTreeMap<String, String>, String> {
    let mut pairs = BTreeMap::new();
    for token in tokens {
        let Some((key, value)) = token.split_once('=') else {
            return Err(format!("expected key=value, got {token}"));
        };
        if pairs.insert(key.to_string(), value.to_string()).is_some() {
            return Err(format!("duplicate key: {key}"));
        }
    }
    Ok(pairs)
}

fn require(pairs: &BTreeMap<String, String>, key: &str) -> Result<String, String> {
    pairs.get(key).cloned().ok_or_else(|| format!("missing required key: {key}"))
}

fn parse_opt<T: std::str::FromStr>(
    pairs: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, String> {
    match pairs.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| format!("invalid value for {key}: {raw}")),
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
