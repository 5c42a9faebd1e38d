//! Epic decomposition (user-prompt-submit)
//!
//! Detects an epic-creation phrase in the operator's prompt, asks the
//! decomposition model to break it into sized tasks, creates them in the
//! issue store, and activates the epic. A failed or unparseable
//! decomposition surfaces a note telling the operator to create tasks
//! manually; an ambiguous phrase with no description is an explicit no-op.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::store::keys;

use super::{HookContext, HookInput};

const DECOMPOSE_DEADLINE: Duration = Duration::from_secs(30);
const DECOMPOSE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DECOMPOSE_MODEL: &str = "anthropic/claude-3.5-sonnet";

const DECOMPOSE_SYSTEM_PROMPT: &str = r#"Decompose the epic into tasks. For each task:
1. Provide a clear description (max 100 chars)
2. Estimate complexity (1-10):
   - 1-3: Simple CRUD, config changes
   - 4-6: Medium features, some logic
   - 7-8: Complex features, multiple components
   - 9-10: Architecture, complex integrations

Return JSON only:
{
  "tasks": [
    {"description": "...", "complexity": 7},
    ...
  ]
}"#;

#[derive(Debug, Clone, Deserialize)]
pub struct DecomposedTask {
    pub description: String,
    #[serde(default = "default_complexity")]
    pub complexity: u8,
}

fn default_complexity() -> u8 {
    5
}

#[derive(Debug, Deserialize)]
struct TaskList {
    #[serde(default)]
    tasks: Vec<DecomposedTask>,
}

/// Pull an epic description out of the prompt. `Some("")` means the prompt
/// looked like an epic command but carried no description.
pub fn extract_epic(prompt: &str) -> Option<String> {
    let patterns = [
        r"(?i)(?:create|new)\s+epic:\s*(.*)",
        r"(?i)epic:\s*(.*)",
        r"(?i)create\s+epic\s+(.*)",
        r"(?i)new\s+epic\s+(.*)",
    ];
    for pattern in patterns {
        let re = Regex::new(pattern).expect("static regex");
        if let Some(captures) = re.captures(prompt) {
            return Some(captures[1].trim().to_string());
        }
    }
    None
}

/// Extract the task list from a model response that may wrap the JSON in
/// prose.
pub fn parse_tasks(content: &str) -> Result<Vec<DecomposedTask>> {
    let json_re = Regex::new(r"\{[\s\S]*\}").expect("static regex");
    let blob = json_re
        .find(content)
        .context("no JSON object in decomposition response")?;
    let list: TaskList =
        serde_json::from_str(blob.as_str()).context("unparseable decomposition JSON")?;
    if list.tasks.is_empty() {
        return Err(anyhow!("decomposition returned no tasks"));
    }
    Ok(list.tasks)
}

async fn decompose_epic(
    http: &reqwest::Client,
    api_key: &str,
    description: &str,
) -> Result<Vec<DecomposedTask>> {
    let response = http
        .post(DECOMPOSE_URL)
        .bearer_auth(api_key)
        .timeout(DECOMPOSE_DEADLINE)
        .json(&json!({
            "model": DECOMPOSE_MODEL,
            "messages": [
                {"role": "system", "content": DECOMPOSE_SYSTEM_PROMPT},
                {"role": "user", "content": format!("Epic: {description}")},
            ],
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(anyhow!("decomposition endpoint returned {}", response.status()));
    }
    let body: serde_json::Value = response.json().await?;
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .context("empty decomposition response")?;
    parse_tasks(content)
}

pub async fn run(ctx: &HookContext, input: &HookInput) -> Option<String> {
    let prompt = input.prompt.as_deref()?;
    let description = extract_epic(prompt)?;
    if description.is_empty() {
        return Some(
            "\n[HEKATE] That looked like an epic command, but no description followed. \
             No epic was created. Try: create epic: <what you want built>\n"
                .to_string(),
        );
    }

    info!(description = %description, "decomposing epic");

    let Ok(api_key) = std::env::var("OPENROUTER_API_KEY") else {
        return Some(
            "\n[HEKATE] OPENROUTER_API_KEY not found. Please set it in your environment.\n"
                .to_string(),
        );
    };

    let tasks = match decompose_epic(&ctx.http, &api_key, &description).await {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!("decomposition failed: {e}");
            return Some(format!(
                "\n[HEKATE] Epic decomposition failed: {e}\nYou can create tasks manually using 'bd create'.\n"
            ));
        }
    };

    let epic_id = format!("epic-{}", Utc::now().timestamp());
    ctx.store.set(&keys::epic_status(&epic_id), "planning").await;
    ctx.store
        .set(&keys::epic_task_count(&epic_id), &tasks.len().to_string())
        .await;
    ctx.store.set(&keys::epic_complete_count(&epic_id), "0").await;
    ctx.store
        .set(&keys::epic_description(&epic_id), &description)
        .await;

    let mut task_ids = Vec::new();
    for (i, task) in tasks.iter().enumerate() {
        // Higher complexity runs first in the tracker's priority scheme
        let priority = (11u8.saturating_sub(task.complexity)).max(1);
        let title = format!("[{epic_id}] {}", task.description);
        let metadata = json!({"complexity": task.complexity, "epic": epic_id});

        let Some(task_id) = ctx
            .issues
            .create(&title, Some(&epic_id), Some(priority), Some(&metadata))
            .await
        else {
            warn!(index = i + 1, "failed to create task in issue store");
            continue;
        };

        ctx.store
            .set(&keys::task_complexity(&task_id), &task.complexity.to_string())
            .await;
        ctx.store.set(&keys::task_epic(&task_id), &epic_id).await;
        ctx.store.set(&keys::task_status(&task_id), "pending").await;
        let provider = ctx
            .store
            .get_or(&format!("routing:complexity:{}", task.complexity), "auto")
            .await;
        ctx.store.set(&keys::task_provider(&task_id), &provider).await;

        info!(
            task = %task_id,
            complexity = task.complexity,
            provider = %provider,
            "created task {}/{}",
            i + 1,
            tasks.len()
        );
        ctx.store.sadd(&keys::epic_tasks(&epic_id), &task_id).await;
        task_ids.push(task_id);
    }

    ctx.store.set(&keys::epic_status(&epic_id), "active").await;

    let preview = task_ids
        .iter()
        .take(5)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let ellipsis = if task_ids.len() > 5 { "..." } else { "" };
    Some(format!(
        "\n[HEKATE] Epic {epic_id} decomposed into {} tasks.\nTasks created in issue store: {preview}{ellipsis}\n\nAgent spawning will begin automatically after epic creation.\n",
        tasks.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epic_detection() {
        assert_eq!(
            extract_epic("create epic: rebuild the payment flow").as_deref(),
            Some("rebuild the payment flow")
        );
        assert_eq!(
            extract_epic("Epic: add rate limiting").as_deref(),
            Some("add rate limiting")
        );
        assert_eq!(
            extract_epic("new epic migrate to async io").as_deref(),
            Some("migrate to async io")
        );
        assert_eq!(extract_epic("please fix the login bug"), None);
        // Matched command with nothing after it
        assert_eq!(extract_epic("create epic:").as_deref(), Some(""));
    }

    #[test]
    fn test_parse_tasks_from_wrapped_json() {
        let content = r#"Here is the breakdown:
{"tasks": [{"description": "Add schema", "complexity": 3}, {"description": "Wire API", "complexity": 7}]}
Let me know if you need more."#;
        let tasks = parse_tasks(content).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].description, "Add schema");
        assert_eq!(tasks[1].complexity, 7);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_tasks("no json here").is_err());
        assert!(parse_tasks(r#"{"tasks": []}"#).is_err());
        assert!(parse_tasks(r#"{"tasks": "nope"}"#).is_err());
    }

    #[tokio::test]
    async fn test_ambiguous_epic_is_an_explicit_noop() {
        let ctx = crate::hooks::testutil::context().await;
        let input = HookInput {
            session_id: "s1".to_string(),
            prompt: Some("create epic:".to_string()),
            ..Default::default()
        };
        let note = run(&ctx, &input).await.unwrap();
        assert!(note.contains("No epic was created"));
        assert!(ctx.store.keys("epic:*:status").await.is_empty());
    }

    #[tokio::test]
    async fn test_ordinary_prompts_are_ignored() {
        let ctx = crate::hooks::testutil::context().await;
        let input = HookInput {
            session_id: "s1".to_string(),
            prompt: Some("how do I run the tests?".to_string()),
            ..Default::default()
        };
        assert!(run(&ctx, &input).await.is_none());
    }
}
