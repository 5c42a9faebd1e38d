//! Live routing hook (pre-tool-use)
//!
//! Re-applies the adaptive override against the tool about to run. A
//! running child cannot change its back-end mid-session, so a better
//! provider is logged as an advisory for analytics, not acted on. The hook
//! also keeps the quota window honest and charges the tool use against the
//! provider actually in effect.

use tracing::info;

use crate::providers::Provider;
use crate::quota::QuotaTracker;
use crate::routing::{FeatureVector, PatternLearner};
use crate::store::keys;

use super::{HookContext, HookInput};

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let (task_id, _) = ctx.session_binding(&input.session_id).await?;
    let tool_name = input.tool_name()?;

    let base_provider = ctx
        .store
        .get_or(&keys::task_provider(&task_id), "auto")
        .await;
    let complexity = ctx.task_complexity(&task_id).await;

    let features = FeatureVector::from_tool(complexity, tool_name, input.tool_input());
    let learner = PatternLearner::new(ctx.store.clone());

    let mut effective = base_provider.clone();
    if let Some(better) = learner.best_provider(&features).await {
        if better.as_str() != base_provider {
            info!(
                task = %task_id,
                from = %base_provider,
                to = %better,
                "pattern-based routing switch (advisory)"
            );
            effective = better.as_str().to_string();
        }
    }

    // Window reset and exhaustion check against published quota state
    let tracker = QuotaTracker::from_store(ctx.store.clone(), &effective).await;
    if !tracker.can_use(true).await {
        info!(provider = %effective, "quota exhausted");
        for candidate in Provider::FALLBACK_ORDER {
            if candidate.as_str() == effective {
                continue;
            }
            let alt = QuotaTracker::from_store(ctx.store.clone(), candidate.as_str()).await;
            if alt.can_use(true).await {
                info!(from = %effective, to = %candidate, "switching provider (advisory)");
                effective = candidate.as_str().to_string();
                break;
            }
        }
    }

    let in_effect = QuotaTracker::from_store(ctx.store.clone(), &effective).await;
    in_effect.increment().await;

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testutil;
    use crate::hooks::HookInput;

    fn bash_input(session: &str, command: &str) -> HookInput {
        HookInput::parse(&format!(
            r#"{{"session_id":"{session}","tool_name":"Bash","tool_input":{{"command":"{command}"}}}}"#
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_charges_quota_for_bound_session() {
        let ctx = testutil::context().await;
        testutil::bind_session(&ctx, "s1", "bd-1", "glm").await;
        ctx.store.set(&keys::task_provider("bd-1"), "glm").await;
        ctx.store.set(&keys::quota_limit("glm"), "180").await;
        ctx.store.set(&keys::quota_window_hours("glm"), "5").await;

        assert!(run(&ctx, &bash_input("s1", "cargo build")).await.is_none());
        assert_eq!(ctx.store.get_i64(&keys::quota_count("glm"), 0).await, 1);

        run(&ctx, &bash_input("s1", "cargo build")).await;
        assert_eq!(ctx.store.get_i64(&keys::quota_count("glm"), 0).await, 2);
    }

    #[tokio::test]
    async fn test_exhausted_provider_charges_fallback() {
        let ctx = testutil::context().await;
        testutil::bind_session(&ctx, "s1", "bd-1", "claude").await;
        ctx.store.set(&keys::task_provider("bd-1"), "claude").await;
        ctx.store.set(&keys::quota_limit("claude"), "45").await;
        ctx.store.set(&keys::quota_window_hours("claude"), "5").await;
        ctx.store.set(&keys::quota_count("claude"), "45").await;
        ctx.store
            .set(
                &keys::quota_window_start("claude"),
                &chrono::Utc::now().timestamp().to_string(),
            )
            .await;

        run(&ctx, &bash_input("s1", "cargo build")).await;

        // claude untouched, the first usable fallback took the charge
        assert_eq!(ctx.store.get_i64(&keys::quota_count("claude"), 0).await, 45);
        assert_eq!(ctx.store.get_i64(&keys::quota_count("deepseek"), 0).await, 1);
    }

    #[tokio::test]
    async fn test_unbound_session_is_noop() {
        let ctx = testutil::context().await;
        assert!(run(&ctx, &bash_input("s9", "ls")).await.is_none());
        assert_eq!(ctx.store.get_i64(&keys::quota_count("glm"), 0).await, 0);
    }
}
