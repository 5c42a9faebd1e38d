//! Issue-Store Client
//!
//! Subprocess wrapper around the external task-tracker CLI (`bd`). Every
//! call carries a 10 s deadline and degrades to an empty result; tracker
//! errors never propagate upward. Claims performed here are advisory only —
//! the authoritative claim is the coordination-store set-if-absent.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

const ISSUE_DEADLINE: Duration = Duration::from_secs(10);

/// A task as reported by the tracker. Fields beyond `id` are best-effort;
/// the tracker's JSON shape is not under our control.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueTask {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Clone)]
pub struct IssueStore {
    program: String,
    cwd: Option<PathBuf>,
    deadline: Duration,
}

impl Default for IssueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueStore {
    pub fn new() -> Self {
        Self {
            program: "bd".to_string(),
            cwd: None,
            deadline: ISSUE_DEADLINE,
        }
    }

    /// Override the tracker binary (test stubs point this at a script)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    async fn run(&self, args: &[&str]) -> Option<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        let output = match tokio::time::timeout(self.deadline, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("issue store `{} {:?}` failed to run: {e}", self.program, args);
                return None;
            }
            Err(_) => {
                debug!("issue store `{} {:?}` deadline exceeded", self.program, args);
                return None;
            }
        };

        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Ready tasks, i.e. unblocked and not yet assigned in the tracker
    pub async fn list_ready(&self) -> Vec<IssueTask> {
        let Some(raw) = self.run(&["ready", "--json"]).await else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    /// Every task the tracker knows about
    pub async fn list_all(&self) -> Vec<IssueTask> {
        let Some(raw) = self.run(&["list", "--json"]).await else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    pub async fn show(&self, task_id: &str) -> Option<IssueTask> {
        let raw = self.run(&["show", task_id, "--json"]).await?;
        serde_json::from_str(&raw).ok()
    }

    /// Create a task; returns the tracker-assigned id parsed from output
    pub async fn create(
        &self,
        title: &str,
        parent: Option<&str>,
        priority: Option<u8>,
        metadata: Option<&Value>,
    ) -> Option<String> {
        let mut args: Vec<String> = vec!["create".to_string(), title.to_string()];
        if let Some(parent) = parent {
            args.push("--parent".to_string());
            args.push(parent.to_string());
        }
        if let Some(priority) = priority {
            args.push("-p".to_string());
            args.push(priority.to_string());
        }
        if let Some(metadata) = metadata {
            args.push("--metadata".to_string());
            args.push(metadata.to_string());
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&arg_refs).await?;

        // Tracker output names the new issue, e.g. "Created issue bd-1a2b"
        let id_re = Regex::new(r"bd-[A-Za-z0-9]+").ok()?;
        id_re.find(&output).map(|m| m.as_str().to_string())
    }

    /// Advisory claim: record an owner in the tracker's metadata
    pub async fn claim(&self, task_id: &str, owner: &str) -> bool {
        let owner_arg = format!("owner={owner}");
        self.run(&["update", task_id, "--metadata", &owner_arg])
            .await
            .is_some()
    }

    pub async fn update_status(&self, task_id: &str, status: &str, reason: Option<&str>) -> bool {
        let mut args = vec!["update", task_id, "--status", status];
        if let Some(reason) = reason {
            args.push("--reason");
            args.push(reason);
        }
        self.run(&args).await.is_some()
    }

    pub async fn update_metadata(&self, task_id: &str, metadata: &Value) -> bool {
        let metadata_json = metadata.to_string();
        self.run(&["update", task_id, "--metadata", &metadata_json])
            .await
            .is_some()
    }

    pub async fn close(&self, task_id: &str, reason: &str) -> bool {
        self.run(&["close", task_id, "--reason", reason])
            .await
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    /// Write a stub tracker script that echoes canned JSON
    fn stub_tracker(dir: &std::path::Path, body: &str) -> String {
        let path = dir.join("bd-stub");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_list_ready_parses_json() {
        let dir = tempfile::tempdir().unwrap();
        let program = stub_tracker(
            dir.path(),
            r#"echo '[{"id":"bd-1","title":"Fix login","status":"open"},{"id":"bd-2","title":"Add tests","status":"open","type":"verification"}]'"#,
        );

        let store = IssueStore::new().with_program(program);
        let tasks = store.list_ready().await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "bd-1");
        assert_eq!(tasks[1].kind.as_deref(), Some("verification"));
    }

    #[tokio::test]
    async fn test_create_extracts_id() {
        let dir = tempfile::tempdir().unwrap();
        let program = stub_tracker(dir.path(), r#"echo "Created issue bd-7f3a""#);

        let store = IssueStore::new().with_program(program);
        let id = store.create("Wire up CI", Some("epic-1"), Some(4), None).await;
        assert_eq!(id.as_deref(), Some("bd-7f3a"));
    }

    #[tokio::test]
    async fn test_failures_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let program = stub_tracker(dir.path(), "exit 1");

        let store = IssueStore::new().with_program(program);
        assert!(store.list_ready().await.is_empty());
        assert!(store.show("bd-1").await.is_none());
        assert!(!store.claim("bd-1", "supervisor-glm").await);
        assert!(!store.close("bd-1", "done").await);

        // A missing binary degrades the same way
        let store = IssueStore::new().with_program("/nonexistent/bd");
        assert!(store.list_ready().await.is_empty());
    }
}
