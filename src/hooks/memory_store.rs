//! Memory capture (post-tool-use)
//!
//! Recognizes solution-shaped commands, sanitizes them into reusable
//! patterns, pushes them onto the recent-memory lists, and — when an
//! embedding provider answers — indexes them in the shared vector store.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::memory::embeddings::InputKind;
use crate::memory::recent::{is_solution_pattern, RecentMemory};
use crate::memory::semantic::{SemanticEntry, SemanticMetadata};

use super::{HookContext, HookInput};

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let (task_id, provider) = ctx.session_binding(&input.session_id).await?;
    let command = input.command()?;
    let output = input.response_text();

    if !is_solution_pattern(&command, &output) {
        return None;
    }

    let tool_name = input.tool_name().unwrap_or("Bash");
    let entry = RecentMemory::record(
        &command,
        tool_name,
        &task_id,
        &provider,
        input.response_success(),
    );
    RecentMemory::new(ctx.store.clone()).store_entry(&entry).await;
    debug!(kind = %entry.pattern.kind, provider = %provider, "stored recent pattern");

    // Semantic indexing is best-effort on top of the recent lists
    let Some(index) = ctx.semantic.as_ref() else {
        return None;
    };
    let doc_text = format!("{}: {}", entry.pattern.kind, entry.pattern.command_snippet);
    let Some((embedding, embedding_provider)) =
        ctx.embeddings.embed(&doc_text, InputKind::Document).await
    else {
        return None;
    };

    let semantic_entry = SemanticEntry {
        id: format!("{}_{}", input.session_id, Uuid::new_v4()),
        document: doc_text,
        embedding,
        metadata: SemanticMetadata {
            session_id: input.session_id.clone(),
            task_id,
            provider,
            pattern_type: entry.pattern.kind.clone(),
            tool: entry.pattern.tool.clone(),
            embedding_provider: embedding_provider.to_string(),
            timestamp: Utc::now().timestamp(),
        },
    };
    if let Err(e) = index.add(semantic_entry).await {
        debug!("semantic indexing failed: {e}");
    }

    None
}
