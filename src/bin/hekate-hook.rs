//! External hook binding
//!
//! One executable for every hook event: `hekate-hook <event>` reads the
//! JSON envelope on stdin, runs the in-process handlers registered for the
//! event, and emits at most one JSON response on stdout. The exit code is
//! always 0 — a broken hook must never fail its host session.

use futures_util::FutureExt;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use hekate::config::Config;
use hekate::hooks::{self, HookContext, HookEvent, HookInput};

async fn run() -> Option<()> {
    let event_arg = std::env::args().nth(1)?;
    let event = HookEvent::parse(&event_arg)?;

    let mut raw = String::new();
    tokio::io::stdin().read_to_string(&mut raw).await.ok()?;
    let input = HookInput::parse(&raw)?;

    let config = Config::load(None).unwrap_or_default();
    let ctx = HookContext::connect(config).await;

    if let Some(context) = hooks::dispatch(event, &ctx, &input).await {
        let envelope = hooks::envelope(event, &context);
        println!("{envelope}");
    }
    Some(())
}

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout is reserved for the response envelope
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hekate=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    // Contain panics so the exit code stays 0 no matter what went wrong
    let _ = std::panic::AssertUnwindSafe(run()).catch_unwind().await;
    std::process::exit(0);
}
