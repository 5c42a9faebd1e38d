//! Supervisor
//!
//! The long-running scheduler: every 10 s it fetches ready tasks from the
//! issue store, filters out anything already claimed, routes one task to a
//! provider, claims it (coordination store first, tracker second), spawns
//! an agent, and reaps finished children. One assignment per tick keeps the
//! fleet stable; the set-if-absent claim keeps concurrent supervisors from
//! double-assigning.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::agents::{AgentManager, Launcher};
use crate::config::Config;
use crate::error::HekateError;
use crate::issues::{IssueStore, IssueTask};
use crate::providers::Provider;
use crate::quota::QuotaTracker;
use crate::routing::{PatternLearner, Router, TaskDescriptor, TaskType};
use crate::store::{keys, CoordStore, RedisKv};

const TICK_SECS: u64 = 10;
const CLAIM_TTL_SECS: u64 = 3600;

struct Pool {
    size: usize,
    active: Vec<String>,
}

pub struct Supervisor {
    config: Config,
    store: CoordStore,
    issues: IssueStore,
    router: Router,
    agents: AgentManager,
    pools: HashMap<Provider, Pool>,
}

impl Supervisor {
    /// Connect against the configured coordination store. Store
    /// connectivity is the one failure that is fatal at startup.
    pub async fn connect(config: Config) -> Result<Self, HekateError> {
        let url = config.redis.url();
        let kv = RedisKv::connect(&url)
            .await
            .map_err(|source| HekateError::StoreUnreachable { addr: url, source })?;
        Ok(Self::with_store(config, CoordStore::new(Arc::new(kv))).await)
    }

    pub async fn with_store(config: Config, store: CoordStore) -> Self {
        let mut quotas = HashMap::new();
        let mut pools = HashMap::new();

        for (name, settings) in &config.providers {
            let Some(provider) = Provider::parse(name) else {
                warn!(provider = %name, "unknown provider in config, skipping");
                continue;
            };
            let tracker = if settings.is_metered() {
                let tracker = QuotaTracker::new(
                    store.clone(),
                    provider.as_str(),
                    settings.quota_limit,
                    settings.window_hours,
                    settings.buffer_percent,
                );
                tracker.publish().await;
                Some(tracker)
            } else {
                None
            };
            quotas.insert(provider, tracker);
            pools.insert(
                provider,
                Pool {
                    size: settings.pool_size,
                    active: Vec::new(),
                },
            );
        }

        let router = Router::new(
            quotas,
            config.quota_thresholds.clone(),
            PatternLearner::new(store.clone()),
        );
        let agents = AgentManager::new(store.clone());

        Self {
            config,
            store,
            issues: IssueStore::new(),
            router,
            agents,
            pools,
        }
    }

    pub fn with_issues(mut self, issues: IssueStore) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.agents = AgentManager::new(self.store.clone()).with_launcher(launcher);
        self
    }

    fn total_active(&self) -> usize {
        self.pools.values().map(|p| p.active.len()).sum()
    }

    fn total_capacity(&self) -> usize {
        let pool_sum: usize = self.pools.values().map(|p| p.size).sum();
        pool_sum.min(self.config.agent_pools.total_agents)
    }

    fn budget_for(&self, complexity: u8) -> u32 {
        let budgets = &self.config.iteration_budgets;
        match crate::routing::ComplexityBucket::from_complexity(complexity) {
            crate::routing::ComplexityBucket::Simple => budgets.simple,
            crate::routing::ComplexityBucket::Medium => budgets.medium,
            crate::routing::ComplexityBucket::Complex => budgets.complex,
        }
    }

    /// One scheduler tick: find ready work and make at most one assignment
    pub async fn run_iteration(&mut self) {
        let tasks = self.issues.list_ready().await;
        if tasks.is_empty() {
            info!("no ready tasks");
            return;
        }

        let mut unclaimed = Vec::new();
        for task in tasks {
            if !self.store.exists(&keys::task_owner(&task.id)).await {
                unclaimed.push(task);
            }
        }
        if unclaimed.is_empty() {
            info!("no unclaimed tasks");
            return;
        }

        for task in unclaimed {
            if self.total_active() >= self.total_capacity() {
                debug!("agent pools at capacity");
                return;
            }
            if self.assign(&task).await {
                // One assignment per iteration, for stability
                return;
            }
        }
    }

    /// Route, claim, and spawn. Returns true only when an agent is running.
    async fn assign(&mut self, task: &IssueTask) -> bool {
        let complexity = self
            .store
            .get_i64(&keys::task_complexity(&task.id), 5)
            .await
            .clamp(1, 10) as u8;
        let mut descriptor = TaskDescriptor::new(&task.id, &task.title, complexity);
        if let Some(ref kind) = task.kind {
            descriptor = descriptor.with_type(TaskType::parse(kind));
        }

        let provider = self.router.route(&descriptor).await;
        info!(task = %task.id, provider = %provider, "assigning task");

        let pool_full = self
            .pools
            .get(&provider)
            .map(|pool| pool.active.len() >= pool.size)
            .unwrap_or(true);
        if pool_full {
            debug!(provider = %provider, "pool full, deferring task");
            return false;
        }

        // The authoritative claim; losing it means another picker won
        if !self
            .store
            .claim(&keys::task_owner(&task.id), provider.as_str(), CLAIM_TTL_SECS)
            .await
        {
            debug!(task = %task.id, "claim conflict, skipping");
            return false;
        }
        self.store
            .set(&keys::task_status(&task.id), "claimed")
            .await;

        // Advisory tracker claim; reverse ours if the tracker refuses
        let owner = format!("supervisor-{provider}");
        if !self.issues.claim(&task.id, &owner).await {
            warn!(task = %task.id, "tracker refused claim, unclaiming");
            self.store.del(&keys::task_owner(&task.id)).await;
            self.store.del(&keys::task_status(&task.id)).await;
            return false;
        }

        let epic = self.store.get_or(&keys::task_epic(&task.id), "default").await;
        let workspace = self.config.workspace_root.join(&epic);
        let budget = self.budget_for(complexity).to_string();
        let extra_env = [("HEKATE_ITERATION_BUDGET".to_string(), budget)];

        match self
            .agents
            .spawn_agent(provider, &task.id, &workspace, &extra_env)
            .await
        {
            Ok(agent_id) => {
                self.store
                    .set(&keys::task_status(&task.id), "in_progress")
                    .await;
                self.issues
                    .update_status(&task.id, "in_progress", None)
                    .await;
                info!(agent = %agent_id, task = %task.id, "spawned agent");
                if let Some(pool) = self.pools.get_mut(&provider) {
                    pool.active.push(agent_id);
                }
                true
            }
            Err(e) => {
                error!(task = %task.id, "spawn failed: {e}");
                self.store.del(&keys::task_owner(&task.id)).await;
                self.store.del(&keys::task_status(&task.id)).await;
                false
            }
        }
    }

    /// Drop finished or stale agents from their pools
    pub async fn reap_finished(&mut self) {
        for (agent_id, provider, status) in self.agents.reap().await {
            if let Some(pool) = self.pools.get_mut(&provider) {
                pool.active.retain(|id| id != &agent_id);
            }
            info!(agent = %agent_id, ?status, "removed from pool");
        }
    }

    /// Run until interrupted, then kill every live agent
    pub async fn run(&mut self) -> Result<()> {
        info!("Supervisor starting");
        let heartbeat = self.agents.start_heartbeat_refresher();

        let mut ticker = tokio::time::interval(Duration::from_secs(TICK_SECS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_iteration().await;
                    self.reap_finished().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Supervisor stopping");
                    break;
                }
            }
        }

        heartbeat.abort();
        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        info!("shutting down all agents");
        for agent_id in self.agents.live_agent_ids().await {
            self.agents.kill(&agent_id).await;
        }
        for pool in self.pools.values_mut() {
            pool.active.clear();
        }
    }

    pub async fn active_agents(&self) -> usize {
        self.agents.active_count().await
    }
}
