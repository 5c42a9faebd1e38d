//! Agent Manager
//!
//! Owns the map of child processes exclusively. Each agent runs detached in
//! its own process group with the provider's environment bundle; liveness
//! is advertised through a 90 s heartbeat key that a background task
//! refreshes every 30 s for children that are still running. An agent whose
//! process is alive but whose heartbeat has lapsed for 120 s is stale and
//! gets reclaimed.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::providers::Provider;
use crate::store::{keys, CoordStore};

pub const HEARTBEAT_TTL_SECS: u64 = 90;
pub const HEARTBEAT_REFRESH_SECS: u64 = 30;
const HEARTBEAT_STALE_SECS: i64 = 120;
const KILL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Stale,
    Completed,
    Failed,
    Unknown,
}

impl AgentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Completed | AgentStatus::Failed | AgentStatus::Stale
        )
    }
}

/// How to start a session for a provider. The default launches the `claude`
/// CLI (pointed at the provider's endpoint through its env bundle); tests
/// swap in a shell stand-in.
#[derive(Clone)]
pub enum Launcher {
    Session,
    Custom { program: String, args: Vec<String> },
}

impl Launcher {
    fn command(&self) -> (String, Vec<String>) {
        match self {
            Launcher::Session => (
                "claude".to_string(),
                vec!["--dangerously-skip-permissions".to_string()],
            ),
            Launcher::Custom { program, args } => (program.clone(), args.clone()),
        }
    }
}

struct AgentHandle {
    child: Child,
    pid: u32,
    provider: Provider,
    task_id: String,
}

pub struct AgentManager {
    store: CoordStore,
    agents: Arc<Mutex<HashMap<String, AgentHandle>>>,
    launcher: Launcher,
}

impl AgentManager {
    pub fn new(store: CoordStore) -> Self {
        Self {
            store,
            agents: Arc::new(Mutex::new(HashMap::new())),
            launcher: Launcher::Session,
        }
    }

    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.launcher = launcher;
        self
    }

    /// Spawn a detached child session for a task and register it in the
    /// coordination store. Returns the stable agent id.
    pub async fn spawn_agent(
        &self,
        provider: Provider,
        task_id: &str,
        workspace: &Path,
        extra_env: &[(String, String)],
    ) -> Result<String> {
        let agent_id = format!("agent-{}-{}", provider, Utc::now().timestamp());

        std::fs::create_dir_all(workspace)
            .with_context(|| format!("failed to create workspace {workspace:?}"))?;

        let (program, args) = self.launcher.command();
        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .env("HEKATE_TASK_ID", task_id)
            .env("HEKATE_PROVIDER", provider.as_str());
        for (key, value) in provider.env_bundle() {
            cmd.env(key, value);
        }
        for (key, value) in extra_env {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {program} for task {task_id}"))?;
        let pid = child.id().context("spawned child has no pid")?;

        let now = Utc::now().timestamp().to_string();
        self.store
            .set_ex(&keys::agent_heartbeat(&agent_id), &now, HEARTBEAT_TTL_SECS)
            .await;
        self.store
            .set(&keys::agent_task(&agent_id), task_id)
            .await;
        self.store
            .set(&keys::agent_provider(&agent_id), provider.as_str())
            .await;

        info!(agent = %agent_id, pid, task = %task_id, "spawned agent");
        self.agents.lock().await.insert(
            agent_id.clone(),
            AgentHandle {
                child,
                pid,
                provider,
                task_id: task_id.to_string(),
            },
        );

        Ok(agent_id)
    }

    /// Classify an agent from its exit code and heartbeat freshness
    pub async fn status(&self, agent_id: &str) -> AgentStatus {
        let mut agents = self.agents.lock().await;
        let Some(handle) = agents.get_mut(agent_id) else {
            return AgentStatus::Unknown;
        };

        match handle.child.try_wait() {
            Ok(None) => {
                let heartbeat = self
                    .store
                    .get_i64(&keys::agent_heartbeat(agent_id), 0)
                    .await;
                if heartbeat > 0 && Utc::now().timestamp() - heartbeat < HEARTBEAT_STALE_SECS {
                    AgentStatus::Running
                } else {
                    AgentStatus::Stale
                }
            }
            Ok(Some(status)) if status.success() => AgentStatus::Completed,
            Ok(Some(_)) => AgentStatus::Failed,
            Err(_) => AgentStatus::Unknown,
        }
    }

    /// Terminate an agent: SIGTERM, a 10 s grace period, then SIGKILL.
    /// Removes its store registrations either way.
    pub async fn kill(&self, agent_id: &str) -> bool {
        let handle = self.agents.lock().await.remove(agent_id);
        let Some(mut handle) = handle else {
            return false;
        };

        if handle.child.try_wait().ok().flatten().is_none() {
            #[cfg(unix)]
            unsafe {
                libc::kill(handle.pid as i32, libc::SIGTERM);
            }
            match tokio::time::timeout(KILL_GRACE, handle.child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!(agent = %agent_id, "graceful shutdown timed out, killing");
                    let _ = handle.child.kill().await;
                    let _ = handle.child.wait().await;
                }
            }
        }

        self.store.del(&keys::agent_heartbeat(agent_id)).await;
        self.store.del(&keys::agent_task(agent_id)).await;
        self.store.del(&keys::agent_provider(agent_id)).await;
        info!(agent = %agent_id, "killed agent");
        true
    }

    /// Drop terminal agents from the pool and report what was removed
    pub async fn reap(&self) -> Vec<(String, Provider, AgentStatus)> {
        let ids: Vec<String> = self.agents.lock().await.keys().cloned().collect();

        let mut reaped = Vec::new();
        for agent_id in ids {
            let status = self.status(&agent_id).await;
            if status.is_terminal() {
                let removed = self.agents.lock().await.remove(&agent_id);
                if let Some(handle) = removed {
                    self.store.del(&keys::agent_heartbeat(&agent_id)).await;
                    self.store.del(&keys::agent_task(&agent_id)).await;
                    self.store.del(&keys::agent_provider(&agent_id)).await;
                    info!(agent = %agent_id, ?status, task = %handle.task_id, "reaped agent");
                    reaped.push((agent_id, handle.provider, status));
                }
            }
        }
        reaped
    }

    pub async fn active_count(&self) -> usize {
        self.agents.lock().await.len()
    }

    pub async fn task_of(&self, agent_id: &str) -> Option<String> {
        self.agents
            .lock()
            .await
            .get(agent_id)
            .map(|h| h.task_id.clone())
    }

    pub async fn live_agent_ids(&self) -> Vec<String> {
        self.agents.lock().await.keys().cloned().collect()
    }

    /// Background task that re-asserts the heartbeat of every child whose
    /// process is still alive, every 30 s.
    pub fn start_heartbeat_refresher(&self) -> JoinHandle<()> {
        let agents = self.agents.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(HEARTBEAT_REFRESH_SECS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let mut map = agents.lock().await;
                let now = Utc::now().timestamp().to_string();
                for (agent_id, handle) in map.iter_mut() {
                    if handle.child.try_wait().ok().flatten().is_none() {
                        store
                            .set_ex(&keys::agent_heartbeat(agent_id), &now, HEARTBEAT_TTL_SECS)
                            .await;
                    }
                }
            }
        })
    }
}
