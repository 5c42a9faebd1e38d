//! Metrics publishing (post-tool-use)
//!
//! Counts tool use per (provider, complexity bucket), publishes remaining
//! quota, and raises a short-lived alert when a provider is nearly out.

use chrono::Utc;
use serde_json::json;

use crate::routing::ComplexityBucket;
use crate::store::keys;

use super::{HookContext, HookInput};

const ALERT_THRESHOLD: i64 = 5;
const ALERT_TTL_SECS: u64 = 300;

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let (task_id, provider) = ctx.session_binding(&input.session_id).await?;

    let complexity = ctx.task_complexity(&task_id).await;
    let label = ComplexityBucket::from_complexity(complexity).metric_label();
    ctx.store
        .incr(&keys::metric_tasks_total(&provider, label))
        .await;

    let count = ctx.store.get_i64(&keys::quota_count(&provider), 0).await;
    let limit = ctx.store.get_i64(&keys::quota_limit(&provider), 50).await;
    let remaining = limit - count;
    ctx.store
        .set(&keys::metric_quota_remaining(&provider), &remaining.to_string())
        .await;

    if remaining <= ALERT_THRESHOLD {
        let alert = json!({
            "type": "quota",
            "severity": if remaining <= 0 { "critical" } else { "warning" },
            "provider": provider,
            "remaining": remaining,
            "threshold": ALERT_THRESHOLD,
            "timestamp": Utc::now().timestamp(),
        });
        ctx.store
            .set_ex(keys::ALERT_QUOTA_WARNING, &alert.to_string(), ALERT_TTL_SECS)
            .await;
    }

    None
}
