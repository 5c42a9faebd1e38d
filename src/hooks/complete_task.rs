//! Completion detection (post-tool-use)
//!
//! A git commit or push from a bound session closes the task, advances the
//! epic's complete-count atomically, and — on the increment that reaches
//! the task count — marks the epic complete and injects a banner. Several
//! completers may race past the threshold; setting the status is
//! idempotent and re-emitting the banner is harmless.

use tracing::info;

use crate::store::keys;

use super::{HookContext, HookInput};

/// Terminal task keys linger for a day, then expire
const TERMINAL_TTL_SECS: i64 = 86_400;

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let (task_id, _) = ctx.session_binding(&input.session_id).await?;
    let command = input.command()?;
    if !command.contains("git commit") && !command.contains("git push") {
        return None;
    }

    info!(task = %task_id, "task appears complete");
    let epic_id = ctx.store.get(&keys::task_epic(&task_id)).await?;

    ctx.issues.close(&task_id, "Completed by agent").await;

    ctx.store
        .set(&keys::task_status(&task_id), "complete")
        .await;
    for key in [
        keys::task_status(&task_id),
        keys::task_complexity(&task_id),
        keys::task_provider(&task_id),
        keys::task_epic(&task_id),
        keys::task_owner(&task_id),
    ] {
        ctx.store.expire(&key, TERMINAL_TTL_SECS).await;
    }

    let complete_count = ctx.store.incr(&keys::epic_complete_count(&epic_id)).await?;
    let task_count = ctx.store.get_i64(&keys::epic_task_count(&epic_id), 0).await;
    info!(epic = %epic_id, complete_count, task_count, "epic progress");

    if task_count > 0 && complete_count >= task_count {
        info!(epic = %epic_id, "epic complete");
        ctx.store
            .set(&keys::epic_status(&epic_id), "complete")
            .await;
        return Some(format!(
            "\n[HEKATE] Epic {epic_id} is complete! All {task_count} tasks finished.\n"
        ));
    }
    None
}
