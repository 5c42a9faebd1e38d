//! Session-start hook
//!
//! Binds the session to its task and provider in the coordination store and
//! injects the working context: task, epic, complexity, and the operating
//! guidelines for an autonomous agent.

use crate::store::keys;

use super::{HookContext, HookInput};

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    // Only hekate-spawned agents carry these
    let task_id = std::env::var("HEKATE_TASK_ID").ok().filter(|s| !s.is_empty())?;
    let provider = std::env::var("HEKATE_PROVIDER").unwrap_or_else(|_| "unknown".to_string());

    ctx.store
        .set(&keys::session_task(&input.session_id), &task_id)
        .await;
    ctx.store
        .set(&keys::session_provider(&input.session_id), &provider)
        .await;

    let complexity = ctx.task_complexity(&task_id).await;
    let epic_id = ctx.store.get_or(&keys::task_epic(&task_id), "unknown").await;
    let epic_description = ctx
        .store
        .get_or(&keys::epic_description(&epic_id), "")
        .await;

    let task_description = match ctx.issues.show(&task_id).await {
        Some(task) if !task.title.is_empty() => task.title,
        _ => task_id.clone(),
    };

    let epic_summary: String = epic_description.chars().take(100).collect();

    Some(format!(
        r#"[HEKATE AGENT SESSION]
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
Session ID: {session}
Task ID: {task_id}
Provider: {provider}
Complexity: {complexity}/10

Epic: {epic_id}
{epic_summary}

Task: {task_description}
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

You are an autonomous Hekate agent working on this task.

Guidelines:
• Focus on completing the specific task described above
• Write tests first (TDD) when implementing features
• Commit your work when the task is complete
• The system will automatically detect completion and update status

When you believe the task is complete:
1. Run tests to verify your work
2. Commit with a descriptive message
3. The system will mark the task as complete automatically"#,
        session = input.session_id,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testutil;
    use std::sync::Mutex;

    // Env vars are process-global; serialize the tests that touch them
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_binds_session_and_injects_context() {
        let _guard = ENV_LOCK.lock().unwrap();
        let ctx = testutil::context().await;
        ctx.store.set(&keys::task_complexity("bd-9"), "7").await;
        ctx.store.set(&keys::task_epic("bd-9"), "epic-1").await;
        ctx.store
            .set(&keys::epic_description("epic-1"), "Ship the billing rework")
            .await;

        std::env::set_var("HEKATE_TASK_ID", "bd-9");
        std::env::set_var("HEKATE_PROVIDER", "glm");

        let input = HookInput {
            session_id: "s-77".to_string(),
            ..Default::default()
        };
        let context = run(&ctx, &input).await.unwrap();

        std::env::remove_var("HEKATE_TASK_ID");
        std::env::remove_var("HEKATE_PROVIDER");

        assert!(context.contains("Task ID: bd-9"));
        assert!(context.contains("Provider: glm"));
        assert!(context.contains("Complexity: 7/10"));
        assert!(context.contains("Epic: epic-1"));

        assert_eq!(
            ctx.store.get(&keys::session_task("s-77")).await.as_deref(),
            Some("bd-9")
        );
        assert_eq!(
            ctx.store.get(&keys::session_provider("s-77")).await.as_deref(),
            Some("glm")
        );
    }

    #[tokio::test]
    async fn test_unrelated_session_is_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        let ctx = testutil::context().await;
        std::env::remove_var("HEKATE_TASK_ID");
        let input = HookInput {
            session_id: "s-1".to_string(),
            ..Default::default()
        };
        assert!(run(&ctx, &input).await.is_none());
    }
}
