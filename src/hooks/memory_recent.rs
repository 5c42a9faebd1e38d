//! Short-term memory injection (pre-tool-use)
//!
//! Scans the recent-pattern inbox for work other agents finished in the
//! last 30 minutes that matches the command about to run, and injects up
//! to five suggestions. Same-provider entries are skipped: that agent
//! already knows what it did.

use chrono::Utc;

use crate::memory::recent::{classify, RecentMemory, SolutionEntry};

use super::{HookContext, HookInput};

const MAX_AGE_SECS: i64 = 1800;
const MAX_SUGGESTIONS: usize = 5;

const RELEVANCE_GROUPS: [(&str, &[&str]); 5] = [
    ("bugfix", &["fix", "bug", "error", "issue", "debug", "patch"]),
    ("test", &["test", "spec", "assert"]),
    ("feature", &["implement", "add", "create", "feature"]),
    ("setup", &["install", "setup", "config", "configure"]),
    ("refactor", &["refactor", "clean", "optimize"]),
];

struct Relevant {
    entry: SolutionEntry,
    age_minutes: i64,
    reason: String,
}

fn find_relevant(entries: Vec<SolutionEntry>, command: &str, provider: &str) -> Vec<Relevant> {
    let now = Utc::now().timestamp();
    let command_lower = command.to_lowercase();
    let current_type = classify(command);

    let mut relevant = Vec::new();
    for entry in entries {
        if entry.provider == provider {
            continue;
        }
        if now - entry.timestamp > MAX_AGE_SECS {
            continue;
        }

        let reason = if entry.pattern.kind == current_type {
            Some(format!("same pattern type ({})", entry.pattern.kind))
        } else {
            let snippet_lower = entry.pattern.command_snippet.to_lowercase();
            RELEVANCE_GROUPS
                .iter()
                .find(|(_, words)| {
                    words.iter().any(|w| command_lower.contains(w))
                        && words.iter().any(|w| snippet_lower.contains(w))
                })
                .map(|(group, _)| format!("related ({group})"))
        };

        if let Some(reason) = reason {
            relevant.push(Relevant {
                age_minutes: (now - entry.timestamp) / 60,
                entry,
                reason,
            });
            if relevant.len() == MAX_SUGGESTIONS {
                break;
            }
        }
    }
    relevant
}

fn format_context(memories: &[Relevant]) -> String {
    let mut parts = vec![
        "[HEKATE MEMORY] Recent relevant work from other agents:".to_string(),
        String::new(),
    ];
    for memory in memories {
        let snippet: String = memory.entry.pattern.command_snippet.chars().take(80).collect();
        parts.push(format!(
            "  • {} agent ({}m ago, {}):",
            memory.entry.provider, memory.age_minutes, memory.reason
        ));
        parts.push(format!("    {snippet}"));
        parts.push(format!("    Task: {}", memory.entry.task_id));
        parts.push(String::new());
    }
    parts.join("\n")
}

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let (_, provider) = ctx.session_binding(&input.session_id).await?;
    let command = input.command()?;

    let entries = RecentMemory::new(ctx.store.clone()).recent(10).await;
    let relevant = find_relevant(entries, &command, &provider);
    if relevant.is_empty() {
        return None;
    }
    Some(format_context(&relevant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testutil;
    use crate::hooks::HookInput;
    use crate::memory::recent::RecentMemory;

    fn bash_input(session: &str, command: &str) -> HookInput {
        HookInput::parse(&format!(
            r#"{{"session_id":"{session}","tool_name":"Bash","tool_input":{{"command":"{command}"}}}}"#
        ))
        .unwrap()
    }

    async fn seed(ctx: &super::super::HookContext, command: &str, provider: &str, age_secs: i64) {
        let memory = RecentMemory::new(ctx.store.clone());
        let mut entry = RecentMemory::record(command, "Bash", "bd-seed", provider, true);
        entry.timestamp -= age_secs;
        memory.store_entry(&entry).await;
    }

    #[tokio::test]
    async fn test_injects_cross_provider_matches() {
        let ctx = testutil::context().await;
        testutil::bind_session(&ctx, "s1", "bd-1", "glm").await;
        seed(&ctx, "fix the connection error in pool", "deepseek", 60).await;

        let context = run(&ctx, &bash_input("s1", "fix broken auth bug")).await.unwrap();
        assert!(context.contains("deepseek agent"));
        assert!(context.contains("same pattern type (bugfix)"));
    }

    #[tokio::test]
    async fn test_skips_same_provider_and_stale_entries() {
        let ctx = testutil::context().await;
        testutil::bind_session(&ctx, "s1", "bd-1", "glm").await;
        // Own provider
        seed(&ctx, "fix the error in retries", "glm", 60).await;
        // Older than 30 minutes
        seed(&ctx, "fix the error in timeouts", "deepseek", 2400).await;

        assert!(run(&ctx, &bash_input("s1", "fix flaky bug")).await.is_none());
    }

    #[tokio::test]
    async fn test_irrelevant_commands_inject_nothing() {
        let ctx = testutil::context().await;
        testutil::bind_session(&ctx, "s1", "bd-1", "glm").await;
        seed(&ctx, "fix the error in retries", "deepseek", 60).await;

        assert!(run(&ctx, &bash_input("s1", "git log --oneline")).await.is_none());
    }

    #[tokio::test]
    async fn test_caps_at_five_suggestions() {
        let ctx = testutil::context().await;
        testutil::bind_session(&ctx, "s1", "bd-1", "glm").await;
        for i in 0..8 {
            seed(&ctx, &format!("fix error number {i}"), "deepseek", 60).await;
        }

        let context = run(&ctx, &bash_input("s1", "fix the login bug")).await.unwrap();
        assert_eq!(context.matches("deepseek agent").count(), 5);
    }
}
