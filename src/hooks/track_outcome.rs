//! Outcome tracking (post-tool-use)
//!
//! Feeds every tool result back into the pattern learner: the per-pattern
//! record, the provider aggregates, and the routing history.

use crate::routing::{FeatureVector, PatternLearner};

use super::{HookContext, HookInput};

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let (task_id, provider) = ctx.session_binding(&input.session_id).await?;
    let tool_name = input.tool_name()?;

    let complexity = ctx.task_complexity(&task_id).await;
    let features = FeatureVector::from_tool(complexity, tool_name, input.tool_input());
    let success = input.response_success();

    PatternLearner::new(ctx.store.clone())
        .record_outcome(&task_id, &features, &provider, tool_name, success)
        .await;

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testutil;
    use crate::hooks::HookInput;
    use crate::store::keys;

    #[tokio::test]
    async fn test_records_pattern_and_stats() {
        let ctx = testutil::context().await;
        testutil::bind_session(&ctx, "s1", "bd-1", "glm").await;
        ctx.store.set(&keys::task_complexity("bd-1"), "6").await;

        let ok = HookInput::parse(
            r#"{"session_id":"s1","tool_response":{"tool_name":"Edit","tool_input":{"file_path":"a.rs"},"success":true}}"#,
        )
        .unwrap();
        let failed = HookInput::parse(
            r#"{"session_id":"s1","tool_response":{"tool_name":"Edit","tool_input":{"file_path":"b.rs"},"success":false}}"#,
        )
        .unwrap();

        run(&ctx, &ok).await;
        run(&ctx, &ok).await;
        run(&ctx, &failed).await;

        let learner = PatternLearner::new(ctx.store.clone());
        let features = FeatureVector::from_tool(6, "Edit", ok.tool_input());
        let pattern = learner.pattern(&features.stable_hash()).await.unwrap();
        assert_eq!(pattern.attempts, 3);
        assert_eq!(pattern.successes, 2);

        let stats = learner.provider_stats("glm").await.unwrap();
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.successful_tasks, 2);

        let history = learner.recent_history(10).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].provider, "glm");
    }

    #[tokio::test]
    async fn test_unbound_session_records_nothing() {
        let ctx = testutil::context().await;
        let input = HookInput::parse(
            r#"{"session_id":"s9","tool_response":{"tool_name":"Edit","tool_input":{},"success":true}}"#,
        )
        .unwrap();
        run(&ctx, &input).await;
        assert!(ctx.store.lrange(keys::ROUTING_HISTORY, 0, -1).await.is_empty());
    }
}
