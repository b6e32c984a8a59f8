// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon component holder and lifecycle.
//!
//! Construction order: Settings → Registries → JobPool; the Manager
//! session (channel + keep-alive) comes and goes with the operator's
//! `connect`/`unregister` commands. Shutdown is either gentle (drain,
//! unregister, join) or an abort (cut everything now).

use crate::channel;
use crate::guard;
use crate::jobs::JobPool;
use crate::keepalive;
use crate::PROTOCOL_VERSION;
use ct_core::{ResultCode, SessionToken, SettingsStore};
use ct_wire::{RegisterReply, RegisterRequest, CommandResult, WorkerAuth};
use ct_modules::Registries;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type LogLevelSetter = Box<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

struct ManagerSession {
    host: String,
    auth: WorkerAuth,
    cancel: CancellationToken,
    channel: tokio::task::JoinHandle<()>,
    keepalive: tokio::task::JoinHandle<()>,
}

pub struct WorkerComponents {
    settings: Arc<SettingsStore>,
    jobs: Arc<JobPool>,
    session: Mutex<Option<ManagerSession>>,
    gentle_stop: CancellationToken,
    abort: CancellationToken,
    log_level_setter: LogLevelSetter,
}

impl WorkerComponents {
    pub fn new(settings: Arc<SettingsStore>, log_level_setter: LogLevelSetter) -> Arc<Self> {
        let registries = Registries::standard();
        let jobs = JobPool::new(registries);
        info!("worker components started");
        Arc::new(Self {
            settings,
            jobs,
            session: Mutex::new(None),
            gentle_stop: CancellationToken::new(),
            abort: CancellationToken::new(),
            log_level_setter,
        })
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn jobs(&self) -> &Arc<JobPool> {
        &self.jobs
    }

    pub fn gentle_stop_requested(&self) -> &CancellationToken {
        &self.gentle_stop
    }

    pub fn abort_requested(&self) -> &CancellationToken {
        &self.abort
    }

    pub fn request_gentle_stop(&self) {
        self.gentle_stop.cancel();
    }

    pub fn request_abort(&self) {
        self.abort.cancel();
    }

    /// Register with a Manager and open the channel + keep-alive loops.
    pub async fn connect(
        &self,
        host: String,
        name: String,
        cpus: Option<u32>,
        memory_mb: Option<u64>,
    ) -> Result<String, String> {
        if self.session.lock().is_some() {
            return Err("already connected to a manager".to_string());
        }

        let request = RegisterRequest {
            name: name.clone(),
            version: PROTOCOL_VERSION,
            cpus: cpus.unwrap_or_else(default_cpus),
            memory_mb: memory_mb.unwrap_or(1024),
        };

        let url = format!("http://{host}/worker/register");
        let reply: RegisterReply = reqwest::Client::new()
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("registration request failed: {e}"))?
            .json()
            .await
            .map_err(|e| format!("unreadable registration reply: {e}"))?;

        if reply.result != ResultCode::Success.as_str() {
            return Err(format!("registration refused: {}", reply.result));
        }

        let auth = WorkerAuth { name: name.clone(), session_token: SessionToken(reply.session_token) };
        let cancel = CancellationToken::new();
        let retries = self.settings.snapshot().thread_retries;

        let channel = {
            let host = host.clone();
            let auth = auth.clone();
            let settings = Arc::clone(&self.settings);
            let jobs = Arc::clone(&self.jobs);
            let cancel = cancel.clone();
            guard::spawn_guarded("channel", retries, cancel.clone(), move || {
                let host = host.clone();
                let auth = auth.clone();
                let settings = Arc::clone(&settings);
                let jobs = Arc::clone(&jobs);
                let cancel = cancel.clone();
                async move {
                    channel::channel_loop(host, auth, settings, jobs, cancel).await;
                    Ok(())
                }
            })
        };

        let keepalive = {
            let host = host.clone();
            let auth = auth.clone();
            let settings = Arc::clone(&self.settings);
            let cancel = cancel.clone();
            guard::spawn_guarded("keepalive", retries, cancel.clone(), move || {
                let host = host.clone();
                let auth = auth.clone();
                let settings = Arc::clone(&settings);
                let cancel = cancel.clone();
                async move {
                    keepalive::keepalive_loop(host, auth, settings, cancel).await;
                    Ok(())
                }
            })
        };

        info!(%host, worker = %name, "connected to manager");
        *self.session.lock() = Some(ManagerSession { host: host.clone(), auth, cancel, channel, keepalive });
        Ok(format!("connected to {host} as {name}"))
    }

    /// Tear the Manager session down, optionally unregistering first.
    pub async fn disconnect(&self, unregister: bool) -> Result<String, String> {
        let session = self
            .session
            .lock()
            .take()
            .ok_or_else(|| "not connected to a manager".to_string())?;

        session.cancel.cancel();
        let _ = session.channel.await;
        let _ = session.keepalive.await;

        if !unregister {
            info!(host = %session.host, "disconnected from manager");
            return Ok(format!("disconnected from {}", session.host));
        }

        let snapshot = self.settings.snapshot();
        let url = format!("http://{}/worker/unregister", session.host);
        let client = reqwest::Client::new();
        let mut last_error = String::new();

        for attempt in 0..=snapshot.unregister_retries {
            if attempt > 0 {
                tokio::time::sleep(snapshot.retry_timestep_interval()).await;
            }
            match client.delete(&url).json(&session.auth).send().await {
                Ok(response) => match response.json::<CommandResult>().await {
                    Ok(result) if result.is_success() => {
                        info!(host = %session.host, "unregistered from manager");
                        return Ok(format!("unregistered from {}", session.host));
                    }
                    Ok(result) if result.result == ResultCode::WorkerNotFound.as_str() => {
                        return Ok("worker session already gone".to_string());
                    }
                    Ok(result) => last_error = format!("manager replied {}", result.result),
                    Err(e) => last_error = format!("unreadable reply: {e}"),
                },
                Err(e) => last_error = format!("request failed: {e}"),
            }
            warn!(attempt, error = %last_error, "unregister attempt failed");
        }

        Err(format!("unregister failed after retries: {last_error}"))
    }

    pub fn set_log_level(&self, level: &str) -> Result<String, String> {
        (self.log_level_setter)(level)?;
        info!(level, "log level changed");
        Ok(format!("log level set to {level}"))
    }

    pub fn switch_jobs_block(
        &self,
        enable: bool,
        host_name: Option<&str>,
    ) -> Result<String, String> {
        if let Some(target) = host_name {
            let ours = self.session.lock().as_ref().map(|s| s.auth.name.clone());
            match ours {
                Some(name) if name == target => {}
                Some(name) => {
                    return Err(format!("jobs block targets {target}, this worker is {name}"));
                }
                None => return Err("not connected to a manager".to_string()),
            }
        }
        self.jobs.set_blocked(enable);
        Ok(format!("jobs block {}", if enable { "enabled" } else { "disabled" }))
    }

    /// One-line state summary for `--query_worker_state`.
    pub fn state_report(&self) -> String {
        let session = self.session.lock();
        let registration = match session.as_ref() {
            Some(s) => format!("connected host={} name={}", s.host, s.auth.name),
            None => "unconnected".to_string(),
        };
        format!(
            "{registration} jobs_blocked={} inflight_jobs={} tasks_configured={}",
            self.jobs.is_blocked(),
            self.jobs.inflight_count(),
            self.jobs.configured_task_count(),
        )
    }

    /// Gentle stop: refuse new jobs, drain in-flight work, unregister.
    pub async fn gentle_shutdown(&self) {
        self.jobs.set_blocked(true);

        let deadline = Instant::now() + self.settings.snapshot().gentle_stop_interval();
        while self.jobs.inflight_count() > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if self.jobs.inflight_count() > 0 {
            warn!(
                inflight = self.jobs.inflight_count(),
                "gentle stop timed out with jobs in flight"
            );
            self.jobs.abort(None);
        }

        if self.session.lock().is_some() {
            if let Err(e) = self.disconnect(true).await {
                warn!(error = %e, "unregister during gentle stop failed");
            }
        }
        info!("gentle stop complete");
    }

    /// Abort: cut the channel and in-flight jobs immediately. No
    /// unregister attempt — the Manager's audit will time the session out.
    pub fn abort_shutdown(&self) {
        if let Some(session) = self.session.lock().take() {
            session.cancel.cancel();
        }
        self.jobs.abort(None);
        info!("abort complete");
    }
}

fn default_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
