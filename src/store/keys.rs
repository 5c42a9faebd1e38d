//! Key layout of the coordination store
//!
//! Every key hekate persists lives under one of the prefixes `session:`,
//! `task:`, `epic:`, `agent:`, `quota:`, `routing:`, `provider:`,
//! `memory:`, `verify:`, `alerts:`, `metrics:`.

pub fn session_task(session_id: &str) -> String {
    format!("session:{session_id}:task_id")
}

pub fn session_provider(session_id: &str) -> String {
    format!("session:{session_id}:provider")
}

pub fn task_owner(task_id: &str) -> String {
    format!("task:{task_id}:owner")
}

pub fn task_status(task_id: &str) -> String {
    format!("task:{task_id}:status")
}

pub fn task_complexity(task_id: &str) -> String {
    format!("task:{task_id}:complexity")
}

pub fn task_provider(task_id: &str) -> String {
    format!("task:{task_id}:provider")
}

pub fn task_epic(task_id: &str) -> String {
    format!("task:{task_id}:epic_id")
}

pub fn epic_status(epic_id: &str) -> String {
    format!("epic:{epic_id}:status")
}

pub fn epic_task_count(epic_id: &str) -> String {
    format!("epic:{epic_id}:task_count")
}

pub fn epic_complete_count(epic_id: &str) -> String {
    format!("epic:{epic_id}:complete_count")
}

pub fn epic_description(epic_id: &str) -> String {
    format!("epic:{epic_id}:description")
}

pub fn epic_tasks(epic_id: &str) -> String {
    format!("epic:{epic_id}:tasks")
}

pub fn agent_heartbeat(agent_id: &str) -> String {
    format!("agent:{agent_id}:heartbeat")
}

pub fn agent_task(agent_id: &str) -> String {
    format!("agent:{agent_id}:task")
}

pub fn agent_provider(agent_id: &str) -> String {
    format!("agent:{agent_id}:provider")
}

pub fn quota_window_start(provider: &str) -> String {
    format!("quota:{provider}:window_start")
}

pub fn quota_count(provider: &str) -> String {
    format!("quota:{provider}:count")
}

pub fn quota_limit(provider: &str) -> String {
    format!("quota:{provider}:limit")
}

pub fn quota_window_hours(provider: &str) -> String {
    format!("quota:{provider}:window_hours")
}

pub fn routing_pattern(feature_hash: &str) -> String {
    format!("routing:pattern:{feature_hash}")
}

pub const ROUTING_HISTORY: &str = "routing:history";

pub fn provider_stats(provider: &str) -> String {
    format!("provider:stats:{provider}")
}

pub fn provider_complexity_stats(provider: &str, complexity: u8) -> String {
    format!("provider:complexity:{provider}:{complexity}")
}

pub const MEMORY_RECENT: &str = "memory:inbox:recent";

pub fn memory_by_type(pattern_type: &str) -> String {
    format!("memory:inbox:type:{pattern_type}")
}

pub fn memory_by_provider(provider: &str) -> String {
    format!("memory:inbox:provider:{provider}")
}

pub fn verify_prefetch(task_id: &str, provider: &str) -> String {
    format!("verify:prefetch:{task_id}:{provider}")
}

pub fn verify_prefetch_scan(task_id: &str) -> String {
    format!("verify:prefetch:{task_id}:*")
}

pub const ALERT_QUOTA_WARNING: &str = "alerts:quota_warning";

pub fn metric_tasks_total(provider: &str, complexity_label: &str) -> String {
    format!("metrics:agent_tasks_total:{provider}:{complexity_label}")
}

pub fn metric_quota_remaining(provider: &str) -> String {
    format!("metrics:provider_quota_remaining:{provider}")
}
