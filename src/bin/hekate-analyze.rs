//! Routing analysis report
//!
//! Prints provider performance, the per-complexity breakdown, learned
//! routing patterns, and the recent routing history from the coordination
//! store.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::Parser;

use hekate::config::Config;
use hekate::providers::Provider;
use hekate::routing::learner::ComplexityStats;
use hekate::routing::{PatternLearner, PatternRecord};
use hekate::store::{self, CoordStore};

#[derive(Parser)]
#[command(name = "hekate-analyze", about = "Hekate routing analysis")]
struct Args {
    /// Path to configuration YAML file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn heading(title: &str) {
    println!("\n{title}");
    println!("{}", "─".repeat(60));
}

async fn provider_section(learner: &PatternLearner) {
    heading("Provider performance");
    for provider in Provider::ALL {
        match learner.provider_stats(provider.as_str()).await {
            Some(stats) => println!(
                "  {:10} {:>4} tasks | {:>4} ok | {:>5.1}% success",
                provider.as_str(),
                stats.total_tasks,
                stats.successful_tasks,
                stats.success_rate * 100.0
            ),
            None => println!("  {:10} no data", provider.as_str()),
        }
    }
}

async fn complexity_section(store: &CoordStore) {
    heading("Complexity breakdown");
    let mut keys = store.keys("provider:complexity:*").await;
    keys.sort();
    if keys.is_empty() {
        println!("  no data");
        return;
    }
    for key in keys {
        let Some(stats) = store.get_json::<ComplexityStats>(&key).await else {
            continue;
        };
        // provider:complexity:<provider>:<complexity>
        let mut parts = key.split(':').skip(2);
        let provider = parts.next().unwrap_or("?");
        let complexity = parts.next().unwrap_or("?");
        println!(
            "  {:10} c={:2} | {:>4} attempts | {:>5.1}% success",
            provider,
            complexity,
            stats.attempts,
            stats.success_rate * 100.0
        );
    }
}

async fn pattern_section(store: &CoordStore) {
    heading("Learned routing patterns");
    let keys = store.keys("routing:pattern:*").await;
    if keys.is_empty() {
        println!("  no patterns learned yet");
        return;
    }
    let mut records: Vec<PatternRecord> = Vec::new();
    for key in keys {
        if let Some(record) = store.get_json::<PatternRecord>(&key).await {
            records.push(record);
        }
    }
    records.sort_by(|a, b| b.attempts.cmp(&a.attempts));
    for record in records.iter().take(20) {
        println!(
            "  {:10} c={:2} tool={:10} | {}/{} ok ({:.0}%)",
            record.provider,
            record.features.complexity,
            record.features.tool_kind,
            record.successes,
            record.attempts,
            record.success_rate() * 100.0
        );
    }
}

async fn history_section(learner: &PatternLearner) {
    heading("Recent routing history");
    let history = learner.recent_history(20).await;
    if history.is_empty() {
        println!("  empty");
        return;
    }
    for record in history {
        let when = Utc
            .timestamp_opt(record.timestamp, 0)
            .single()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "?".to_string());
        let mark = if record.success { "✓" } else { "✗" };
        println!(
            "  {when} {mark} {:10} {:20} {}",
            record.provider, record.task_id, record.tool_name
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let store = store::connect(&config.redis).await?;
    let learner = PatternLearner::new(store.clone());

    println!("Hekate routing analysis");
    provider_section(&learner).await;
    complexity_section(&store).await;
    pattern_section(&store).await;
    history_section(&learner).await;
    println!();
    Ok(())
}
