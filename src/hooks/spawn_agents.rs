//! Agent spawning (post-tool-use)
//!
//! After a task-creation command against the issue store, walks the active
//! epics, finds their pending unclaimed tasks, and spawns agents for them
//! under per-provider concurrency caps. The coordination-store claim is
//! taken before the child exists, so a racing supervisor tick skips these
//! tasks cleanly.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::agents::AgentManager;
use crate::providers::Provider;
use crate::store::keys;

use super::{HookContext, HookInput};

struct PendingTask {
    id: String,
    provider_name: String,
}

fn is_task_creation(command: &str) -> bool {
    command.starts_with("bd ") && (command.contains("create") || command.contains("init"))
}

async fn pending_tasks_for_epic(ctx: &HookContext, epic_id: &str) -> Vec<PendingTask> {
    let mut pending = Vec::new();
    for task in ctx.issues.list_all().await {
        let epic_of_task = ctx.store.get_or(&keys::task_epic(&task.id), "").await;
        if epic_of_task != epic_id {
            continue;
        }
        if !matches!(task.status.as_str(), "open" | "pending") {
            continue;
        }
        if ctx.store.exists(&keys::task_owner(&task.id)).await {
            continue;
        }
        let provider_name = ctx.store.get_or(&keys::task_provider(&task.id), "auto").await;
        pending.push(PendingTask {
            id: task.id,
            provider_name,
        });
    }
    pending
}

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let command = input.command()?;
    if !is_task_creation(&command) {
        return None;
    }

    info!("checking for pending tasks after issue creation");

    let manager = AgentManager::new(ctx.store.clone()).with_launcher(ctx.launcher.clone());
    let mut per_provider: HashMap<String, usize> = HashMap::new();
    let mut spawned = 0usize;

    for epic_key in ctx.store.keys("epic:*:status").await {
        let epic_id = match epic_key.split(':').nth(1) {
            Some(id) => id.to_string(),
            None => continue,
        };
        if ctx.store.get_or(&epic_key, "").await != "active" {
            continue;
        }

        let pending = pending_tasks_for_epic(ctx, &epic_id).await;
        if pending.is_empty() {
            continue;
        }
        info!(epic = %epic_id, count = pending.len(), "found pending tasks");

        for task in pending {
            let cap = Provider::spawn_cap_for(&task.provider_name);
            let used = per_provider.entry(task.provider_name.clone()).or_insert(0);
            if *used >= cap {
                continue;
            }

            // "auto" resolves to the workhorse tier
            let provider =
                Provider::parse(&task.provider_name).unwrap_or(Provider::DeepSeek);

            // Claim first so a racing supervisor tick skips this task
            if !ctx
                .store
                .claim(&keys::task_owner(&task.id), provider.as_str(), 3600)
                .await
            {
                continue;
            }

            let workspace = ctx.config.workspace_root.join(&task.id);
            match manager.spawn_agent(provider, &task.id, &workspace, &[]).await {
                Ok(agent_id) => {
                    ctx.store
                        .set(&keys::task_status(&task.id), "in_progress")
                        .await;
                    ctx.issues.update_status(&task.id, "in_progress", None).await;
                    info!(task = %task.id, agent = %agent_id, provider = %provider, "spawned agent");
                    *used += 1;
                    spawned += 1;
                }
                Err(e) => {
                    warn!(task = %task.id, "spawn failed: {e}");
                    ctx.store.del(&keys::task_owner(&task.id)).await;
                }
            }
        }
    }

    if spawned > 0 {
        info!(spawned, "spawned agents for pending tasks");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testutil;
    use crate::hooks::HookInput;
    use crate::issues::IssueStore;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn create_input(command: &str) -> HookInput {
        HookInput::parse(&format!(
            r#"{{"session_id":"s1","tool_response":{{"tool_name":"Bash","tool_input":{{"command":"{command}"}},"success":true}}}}"#
        ))
        .unwrap()
    }

    /// Stub tracker that lists the given tasks as open
    fn tracker_listing(dir: &std::path::Path, tasks: &[&str]) -> String {
        let listing: Vec<String> = tasks
            .iter()
            .map(|id| format!(r#"{{"id":"{id}","title":"t","status":"open"}}"#))
            .collect();
        let path = dir.join("bd-stub");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "#!/bin/sh\nif [ \"$1\" = list ]; then echo '[{}]'; fi",
            listing.join(",")
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    async fn seed_epic_task(ctx: &super::super::HookContext, epic: &str, task: &str, provider: &str) {
        ctx.store.set(&keys::epic_status(epic), "active").await;
        ctx.store.set(&keys::task_epic(task), epic).await;
        ctx.store.set(&keys::task_provider(task), provider).await;
        ctx.store.set(&keys::task_complexity(task), "5").await;
    }

    #[tokio::test]
    async fn test_spawns_and_claims_pending_tasks() {
        let mut ctx = testutil::context().await;
        let dir = tempfile::tempdir().unwrap();
        ctx.issues = IssueStore::new().with_program(tracker_listing(dir.path(), &["bd-1", "bd-2"]));
        seed_epic_task(&ctx, "epic-1", "bd-1", "deepseek").await;
        seed_epic_task(&ctx, "epic-1", "bd-2", "deepseek").await;

        run(&ctx, &create_input("bd create new-task")).await;

        assert_eq!(
            ctx.store.get(&keys::task_owner("bd-1")).await.as_deref(),
            Some("deepseek")
        );
        assert_eq!(
            ctx.store.get(&keys::task_status("bd-2")).await.as_deref(),
            Some("in_progress")
        );
    }

    #[tokio::test]
    async fn test_respects_provider_caps() {
        let mut ctx = testutil::context().await;
        let dir = tempfile::tempdir().unwrap();
        let ids: Vec<String> = (0..4).map(|i| format!("bd-{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        ctx.issues = IssueStore::new().with_program(tracker_listing(dir.path(), &id_refs));
        for id in &ids {
            seed_epic_task(&ctx, "epic-1", id, "claude").await;
        }

        run(&ctx, &create_input("bd create more")).await;

        // claude caps at 2 concurrent spawns
        let mut claimed = 0;
        for id in &ids {
            if ctx.store.exists(&keys::task_owner(id)).await {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 2);
    }

    #[tokio::test]
    async fn test_already_claimed_tasks_are_skipped() {
        let mut ctx = testutil::context().await;
        let dir = tempfile::tempdir().unwrap();
        ctx.issues = IssueStore::new().with_program(tracker_listing(dir.path(), &["bd-1"]));
        seed_epic_task(&ctx, "epic-1", "bd-1", "glm").await;
        ctx.store.set(&keys::task_owner("bd-1"), "claude").await;

        run(&ctx, &create_input("bd create t")).await;

        // The existing claim was not overwritten
        assert_eq!(
            ctx.store.get(&keys::task_owner("bd-1")).await.as_deref(),
            Some("claude")
        );
        assert!(ctx.store.get(&keys::task_status("bd-1")).await.is_none());
    }

    #[tokio::test]
    async fn test_non_creation_commands_are_ignored() {
        let ctx = testutil::context().await;
        assert!(run(&ctx, &create_input("bd list")).await.is_none());
        assert!(run(&ctx, &create_input("git commit")).await.is_none());
    }
}
