//! Verification injection (pre-tool-use)
//!
//! Fires only before read-class tools. Advances verification slots that
//! have been pending for 30 s and injects every completed result so the
//! agent sees its verdicts before it reads code again.

use tracing::info;

use crate::routing::features::READ_TOOLS;
use crate::verify::VerificationPipeline;

use super::{HookContext, HookInput};

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let tool_name = input.tool_name()?;
    if !READ_TOOLS.contains(&tool_name) {
        return None;
    }

    let (task_id, _) = ctx.session_binding(&input.session_id).await?;

    let pipeline = VerificationPipeline::new(ctx.store.clone());
    let completed = pipeline.check_status(&task_id).await;
    if completed.is_empty() {
        return None;
    }

    info!(task = %task_id, count = completed.len(), "injecting verification results");
    Some(format!(
        "\n{}\n",
        VerificationPipeline::format_results(&completed)
    ))
}
