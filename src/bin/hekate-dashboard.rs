//! Live dashboard
//!
//! Refreshes every 2 s: alerts, epic progress, active agents with
//! heartbeat age, quota bars, and task counters. `--prometheus` prints the
//! metrics once as plain text lines instead.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use serde_json::Value;

use hekate::config::Config;
use hekate::providers::Provider;
use hekate::store::{self, keys, CoordStore};

const REFRESH: Duration = Duration::from_secs(2);
const STUCK_AFTER_SECS: i64 = 60;

#[derive(Parser)]
#[command(name = "hekate-dashboard", about = "Hekate live dashboard")]
struct Args {
    /// Path to configuration YAML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print metrics as plain text lines once and exit
    #[arg(long)]
    prometheus: bool,
}

struct EpicRow {
    id: String,
    status: String,
    tasks: i64,
    complete: i64,
    description: String,
}

struct AgentRow {
    id: String,
    task_id: String,
    provider: String,
    heartbeat_age: i64,
}

struct QuotaRow {
    provider: &'static str,
    count: i64,
    limit: i64,
}

async fn epics(store: &CoordStore) -> Vec<EpicRow> {
    let mut rows = Vec::new();
    for key in store.keys("epic:*:status").await {
        let Some(id) = key.split(':').nth(1).map(str::to_string) else {
            continue;
        };
        rows.push(EpicRow {
            status: store.get_or(&key, "").await,
            tasks: store.get_i64(&keys::epic_task_count(&id), 0).await,
            complete: store.get_i64(&keys::epic_complete_count(&id), 0).await,
            description: store
                .get_or(&keys::epic_description(&id), "")
                .await
                .chars()
                .take(50)
                .collect(),
            id,
        });
    }
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    rows
}

async fn agents(store: &CoordStore) -> Vec<AgentRow> {
    let now = Utc::now().timestamp();
    let mut rows = Vec::new();
    for key in store.keys("agent:*:heartbeat").await {
        let Some(id) = key.split(':').nth(1).map(str::to_string) else {
            continue;
        };
        let heartbeat = store.get_i64(&key, 0).await;
        if heartbeat == 0 {
            continue;
        }
        rows.push(AgentRow {
            task_id: store
                .get_or(&keys::agent_task(&id), "unknown")
                .await
                .chars()
                .take(20)
                .collect(),
            provider: store.get_or(&keys::agent_provider(&id), "?").await,
            heartbeat_age: now - heartbeat,
            id,
        });
    }
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    rows
}

async fn quotas(store: &CoordStore) -> Vec<QuotaRow> {
    let mut rows = Vec::new();
    for provider in Provider::ALL {
        rows.push(QuotaRow {
            provider: provider.as_str(),
            count: store.get_i64(&keys::quota_count(provider.as_str()), 0).await,
            limit: store.get_i64(&keys::quota_limit(provider.as_str()), 50).await,
        });
    }
    rows
}

fn quota_bar(count: i64, limit: i64) -> String {
    let width = 20usize;
    let used = if limit > 0 {
        ((count as f64 / limit as f64) * width as f64).round() as usize
    } else {
        0
    };
    let used = used.min(width);
    format!("[{}{}]", "█".repeat(used), "░".repeat(width - used))
}

async fn render(store: &CoordStore) {
    // ANSI clear screen + home
    print!("\x1b[2J\x1b[H");
    println!("HEKATE DASHBOARD  {}", Utc::now().format("%H:%M:%S"));
    println!("{}", "═".repeat(64));

    // Alerts, highest urgency first
    let mut alerts: Vec<(String, String)> = Vec::new();
    if let Some(alert) = store.get_json::<Value>(keys::ALERT_QUOTA_WARNING).await {
        let severity = alert["severity"].as_str().unwrap_or("warning").to_string();
        alerts.push((
            severity,
            format!(
                "{} quota: {} remaining",
                alert["provider"].as_str().unwrap_or("?"),
                alert["remaining"]
            ),
        ));
    }
    let agent_rows = agents(store).await;
    for agent in &agent_rows {
        if agent.heartbeat_age > STUCK_AFTER_SECS {
            alerts.push((
                "warning".to_string(),
                format!("agent {} no heartbeat for {}s", agent.id, agent.heartbeat_age),
            ));
        }
    }
    if !alerts.is_empty() {
        println!("\nALERTS");
        for (severity, message) in &alerts {
            let symbol = if severity == "critical" { "✗" } else { "⚠" };
            println!("  {symbol} {message}");
        }
    }

    println!("\nEPICS");
    let epic_rows = epics(store).await;
    if epic_rows.is_empty() {
        println!("  none");
    }
    for epic in &epic_rows {
        println!(
            "  {:16} {:9} {:>3}/{:<3} {}",
            epic.id, epic.status, epic.complete, epic.tasks, epic.description
        );
    }

    println!("\nAGENTS");
    if agent_rows.is_empty() {
        println!("  none");
    }
    for agent in &agent_rows {
        println!(
            "  {:24} {:10} {:20} hb {:>3}s",
            agent.id, agent.provider, agent.task_id, agent.heartbeat_age
        );
    }

    println!("\nQUOTAS");
    for quota in quotas(store).await {
        println!(
            "  {:10} {} {:>3}/{:<3}",
            quota.provider,
            quota_bar(quota.count, quota.limit),
            quota.count,
            quota.limit
        );
    }

    println!("\nMETRICS");
    let mut metric_keys = store.keys("metrics:agent_tasks_total:*").await;
    metric_keys.sort();
    if metric_keys.is_empty() {
        println!("  none");
    }
    for key in metric_keys {
        println!("  {:46} {}", key, store.get_i64(&key, 0).await);
    }
}

/// Plain-text exposition: `metric{label="v"} value` lines
async fn prometheus(store: &CoordStore) {
    for key in store.keys("metrics:agent_tasks_total:*").await {
        let mut parts = key.split(':').skip(2);
        let (Some(provider), Some(complexity)) = (parts.next(), parts.next()) else {
            continue;
        };
        println!(
            "hekate_agent_tasks_total{{provider=\"{provider}\",complexity=\"{complexity}\"}} {}",
            store.get_i64(&key, 0).await
        );
    }
    for provider in Provider::ALL {
        let remaining = store
            .get_i64(&keys::metric_quota_remaining(provider.as_str()), -1)
            .await;
        if remaining >= 0 {
            println!(
                "hekate_provider_quota_remaining{{provider=\"{}\"}} {remaining}",
                provider.as_str()
            );
        }
    }
    let epic_rows = epics(store).await;
    println!("hekate_epics_total {}", epic_rows.len());
    println!(
        "hekate_epics_complete {}",
        epic_rows.iter().filter(|e| e.status == "complete").count()
    );
    println!("hekate_agents_active {}", agents(store).await.len());
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let store = store::connect(&config.redis).await?;

    if args.prometheus {
        prometheus(&store).await;
        return Ok(());
    }

    loop {
        render(&store).await;
        tokio::select! {
            _ = tokio::time::sleep(REFRESH) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
