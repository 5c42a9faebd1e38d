//! Hekate supervisor binary
//!
//! Loads the YAML config, connects to the coordination store, and runs the
//! scheduling loop until interrupted.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hekate::config::Config;
use hekate::supervisor::Supervisor;

#[derive(Parser)]
#[command(
    name = "hekate",
    about = "Hekate - Autonomous Multi-Agent Development System"
)]
struct Args {
    /// Path to configuration YAML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hekate={}", args.log_level.to_lowercase())));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(args.config.as_deref())?;

    println!("\n{}", "═".repeat(60));
    println!("Hekate supervisor v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "═".repeat(60));
    println!(
        "Providers: {} | Pool capacity: {}",
        config
            .providers
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
        config.total_pool_capacity()
    );
    println!("{}\n", "═".repeat(60));

    let mut supervisor = Supervisor::connect(config).await?;
    supervisor.run().await
}
