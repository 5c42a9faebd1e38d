//! Semantic memory injection (pre-tool-use)
//!
//! Embeds the command about to run and queries the shared vector index for
//! similar work other agents did in the last two hours. Hits below 0.65
//! cosine similarity or from the same provider are dropped; at most three
//! are injected.

use chrono::Utc;

use crate::memory::embeddings::InputKind;
use crate::memory::semantic::SemanticHit;

use super::{HookContext, HookInput};

const LOOKBACK_SECS: i64 = 7200;
const MIN_SIMILARITY: f32 = 0.65;
const MAX_RESULTS: usize = 3;
const QUERY_K: usize = 5;

fn format_context(hits: &[&SemanticHit]) -> String {
    let now = Utc::now().timestamp();
    let mut parts = vec![
        "[HEKATE SEMANTIC MEMORY] Similar work from other agents:".to_string(),
        String::new(),
    ];
    for hit in hits {
        let age_minutes = (now - hit.metadata.timestamp).max(0) / 60;
        let doc: String = hit.document.chars().take(100).collect();
        parts.push(format!(
            "  • {} ({}m ago, {:.2} similar)",
            hit.metadata.provider, age_minutes, hit.similarity
        ));
        parts.push(format!("    Type: {}", hit.metadata.pattern_type));
        parts.push(format!("    {doc}"));
        parts.push(format!("    Task: {}", hit.metadata.task_id));
        parts.push(String::new());
    }
    parts.join("\n")
}

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let (_, provider) = ctx.session_binding(&input.session_id).await?;
    let command = input.command()?;
    let index = ctx.semantic.as_ref()?;

    let (embedding, _) = ctx
        .embeddings
        .embed(&format!("command: {command}"), InputKind::Query)
        .await?;

    let since = Utc::now().timestamp() - LOOKBACK_SECS;
    let hits = index.query(&embedding, QUERY_K, since).await;

    let relevant: Vec<&SemanticHit> = hits
        .iter()
        .filter(|hit| hit.similarity >= MIN_SIMILARITY && hit.metadata.provider != provider)
        .take(MAX_RESULTS)
        .collect();

    if relevant.is_empty() {
        return None;
    }
    Some(format_context(&relevant))
}
