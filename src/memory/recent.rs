//! Recent-pattern memory
//!
//! Commands that look like solutions are sanitized into reusable patterns
//! and pushed onto three bounded FIFO lists in the coordination store:
//! recent-all (cap 100, TTL 1 h), by-type (cap 50, TTL 2 h), and
//! by-provider (cap 50, TTL 1 h). Entries decay rather than accumulate.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::store::{keys, CoordStore};

const RECENT_CAP: i64 = 100;
const RECENT_TTL_SECS: i64 = 3600;
const BY_TYPE_CAP: i64 = 50;
const BY_TYPE_TTL_SECS: i64 = 7200;
const BY_PROVIDER_CAP: i64 = 50;
const BY_PROVIDER_TTL_SECS: i64 = 3600;

const SNIPPET_CAP: usize = 200;

pub const PATTERN_TYPES: [&str; 6] = ["bugfix", "test", "refactor", "feature", "setup", "general"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentPattern {
    #[serde(rename = "type")]
    pub kind: String,
    pub tool: String,
    pub command_snippet: String,
    pub original_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionEntry {
    pub pattern: RecentPattern,
    pub task_id: String,
    pub provider: String,
    pub timestamp: i64,
    pub success: bool,
}

/// Does this command look like a solution worth remembering?
pub fn is_solution_pattern(command: &str, output: &str) -> bool {
    const SOLUTION_WORDS: [&str; 8] = [
        "fix", "solve", "resolve", "patch", "correct", "repair", "debug", "working",
    ];
    const ERROR_WORDS: [&str; 8] = [
        "error", "fail", "bug", "issue", "broken", "not working", "exception", "traceback",
    ];

    let command = command.to_lowercase();
    let output = output.to_lowercase();

    let has_solution_word = SOLUTION_WORDS.iter().any(|w| command.contains(w));
    let has_error_context = ERROR_WORDS.iter().any(|w| command.contains(w));
    let output_indicates_success = output.contains("success")
        || output.contains("fixed")
        || output.contains("resolved")
        || (command.contains("error") && !output.contains("error"));

    let is_test_addition = command.contains("test")
        && ["add", "create", "write"].iter().any(|w| command.contains(w));
    let is_significant = command.contains("refactor")
        || command.contains("optimize")
        || command.contains("implement");

    (has_solution_word && has_error_context)
        || (has_solution_word && output_indicates_success)
        || is_test_addition
        || is_significant
}

/// Classify a command into a pattern type by keyword
pub fn classify(command: &str) -> &'static str {
    let command = command.to_lowercase();
    if command.contains("fix") || command.contains("bug") {
        "bugfix"
    } else if command.contains("test") {
        "test"
    } else if command.contains("refactor") {
        "refactor"
    } else if command.contains("implement") || command.contains("add") {
        "feature"
    } else if command.contains("install") || command.contains("setup") {
        "setup"
    } else {
        "general"
    }
}

/// Strip quoted strings and filesystem paths so the snippet generalizes
/// beyond the workspace it came from, capped at 200 chars.
pub fn sanitize(command: &str) -> String {
    let quotes = Regex::new(r#"["'][^"']*["']"#).expect("static regex");
    let paths = Regex::new(r"/[\w\-./]+").expect("static regex");

    let mut snippet = quotes.replace_all(command, "\"\"").into_owned();
    snippet = paths.replace_all(&snippet, "/path").into_owned();

    if snippet.chars().count() > SNIPPET_CAP {
        snippet = snippet.chars().take(SNIPPET_CAP - 3).collect::<String>() + "...";
    }
    snippet
}

pub fn extract_pattern(command: &str, tool_name: &str) -> RecentPattern {
    RecentPattern {
        kind: classify(command).to_string(),
        tool: tool_name.to_string(),
        command_snippet: sanitize(command),
        original_command: command.chars().take(SNIPPET_CAP).collect(),
    }
}

#[derive(Clone)]
pub struct RecentMemory {
    store: CoordStore,
}

impl RecentMemory {
    pub fn new(store: CoordStore) -> Self {
        Self { store }
    }

    /// Push an entry onto all three inbox lists with their caps and TTLs
    pub async fn store_entry(&self, entry: &SolutionEntry) {
        let Ok(line) = serde_json::to_string(entry) else {
            return;
        };

        self.store.lpush(keys::MEMORY_RECENT, &line).await;
        self.store.ltrim(keys::MEMORY_RECENT, 0, RECENT_CAP - 1).await;
        self.store.expire(keys::MEMORY_RECENT, RECENT_TTL_SECS).await;

        let type_key = keys::memory_by_type(&entry.pattern.kind);
        self.store.lpush(&type_key, &line).await;
        self.store.ltrim(&type_key, 0, BY_TYPE_CAP - 1).await;
        self.store.expire(&type_key, BY_TYPE_TTL_SECS).await;

        let provider_key = keys::memory_by_provider(&entry.provider);
        self.store.lpush(&provider_key, &line).await;
        self.store.ltrim(&provider_key, 0, BY_PROVIDER_CAP - 1).await;
        self.store.expire(&provider_key, BY_PROVIDER_TTL_SECS).await;
    }

    pub async fn recent(&self, n: i64) -> Vec<SolutionEntry> {
        self.store
            .lrange(keys::MEMORY_RECENT, 0, n - 1)
            .await
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn record(
        command: &str,
        tool_name: &str,
        task_id: &str,
        provider: &str,
        success: bool,
    ) -> SolutionEntry {
        SolutionEntry {
            pattern: extract_pattern(command, tool_name),
            task_id: task_id.to_string(),
            provider: provider.to_string(),
            timestamp: Utc::now().timestamp(),
            success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKv;
    use std::sync::Arc;

    #[test]
    fn test_solution_detection() {
        assert!(is_solution_pattern("fix the broken login error", ""));
        assert!(is_solution_pattern("debug session timeout", "all tests passed, fixed"));
        assert!(is_solution_pattern("add test for quota window reset", ""));
        assert!(is_solution_pattern("refactor the retry loop", ""));
        assert!(!is_solution_pattern("ls -la", ""));
        assert!(!is_solution_pattern("cat README.md", "contents"));
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify("fix the race in claim logic"), "bugfix");
        assert_eq!(classify("run test suite"), "test");
        assert_eq!(classify("refactor provider registry"), "refactor");
        assert_eq!(classify("implement quota window"), "feature");
        assert_eq!(classify("install redis"), "setup");
        assert_eq!(classify("git log"), "general");
    }

    #[test]
    fn test_sanitize_strips_specifics() {
        let sanitized = sanitize(r#"grep -rn "api_key" /home/user/project/src"#);
        assert!(!sanitized.contains("api_key"));
        assert!(!sanitized.contains("/home/user"));
        assert!(sanitized.contains("/path"));

        let long = "x".repeat(400);
        assert!(sanitize(&long).chars().count() <= 200);
    }

    #[tokio::test]
    async fn test_store_and_fetch_roundtrip() {
        let memory = RecentMemory::new(CoordStore::new(Arc::new(MemoryKv::new())));
        let entry = RecentMemory::record(
            "fix the auth error in middleware",
            "Bash",
            "bd-1",
            "glm",
            true,
        );
        memory.store_entry(&entry).await;

        let fetched = memory.recent(10).await;
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].pattern.kind, "bugfix");
        assert_eq!(fetched[0].provider, "glm");
    }

    #[tokio::test]
    async fn test_recent_list_is_capped() {
        let memory = RecentMemory::new(CoordStore::new(Arc::new(MemoryKv::new())));
        for i in 0..110 {
            let entry = RecentMemory::record(
                &format!("fix error number {i}"),
                "Bash",
                &format!("bd-{i}"),
                "glm",
                true,
            );
            memory.store_entry(&entry).await;
        }
        assert_eq!(memory.recent(200).await.len(), 100);
    }
}
