//! Verification prefetch (post-tool-use)
//!
//! After code changes or a git add/commit, queues verification slots for
//! the providers the task's complexity mandates, so verdicts are already
//! waiting when the agent next reads.

use tracing::info;

use crate::routing::features::WRITE_TOOLS;
use crate::verify::VerificationPipeline;

use super::{HookContext, HookInput};

fn should_prefetch(input: &HookInput) -> bool {
    let Some(tool_name) = input.tool_name() else {
        return false;
    };
    if WRITE_TOOLS.contains(&tool_name) {
        return true;
    }
    if let Some(command) = input.command() {
        return command.contains("git") && (command.contains("commit") || command.contains("add"));
    }
    false
}

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let (task_id, _) = ctx.session_binding(&input.session_id).await?;
    if !should_prefetch(input) {
        return None;
    }

    let complexity = ctx.task_complexity(&task_id).await;
    let providers = VerificationPipeline::new(ctx.store.clone())
        .prefetch(&task_id, complexity)
        .await;

    info!(
        task = %task_id,
        complexity,
        providers = ?providers.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        "queued verification prefetch"
    );
    None
}
