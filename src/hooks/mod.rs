//! Event hooks
//!
//! Short-lived handlers the agent host invokes on session and tool events.
//! Handlers are in-process functions registered against event names; the
//! `hekate-hook` binary is the external binding that reads one JSON
//! envelope on stdin and optionally emits one on stdout. Handlers share
//! state only through the coordination store and the semantic index, must
//! be reentrant, and never fail the host: missing context means do nothing,
//! and the process exit code is always 0.

pub mod complete_task;
pub mod decompose;
pub mod memory_recent;
pub mod memory_semantic;
pub mod memory_store;
pub mod metrics;
pub mod router;
pub mod session_start;
pub mod spawn_agents;
pub mod track_outcome;
pub mod verify_inject;
pub mod verify_prefetch;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::agents::Launcher;
use crate::config::Config;
use crate::issues::IssueStore;
use crate::memory::{EmbeddingClient, SemanticIndex};
use crate::store::{keys, CoordStore, MemoryKv, RedisKv};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    SessionStart,
    PreToolUse,
    PostToolUse,
    UserPromptSubmit,
}

impl HookEvent {
    pub fn wire_name(&self) -> &'static str {
        match self {
            HookEvent::SessionStart => "SessionStart",
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
        }
    }

    pub fn parse(s: &str) -> Option<HookEvent> {
        match s.trim().to_lowercase().replace('-', "").replace('_', "").as_str() {
            "sessionstart" => Some(HookEvent::SessionStart),
            "pretooluse" => Some(HookEvent::PreToolUse),
            "posttooluse" => Some(HookEvent::PostToolUse),
            "userpromptsubmit" => Some(HookEvent::UserPromptSubmit),
            _ => None,
        }
    }
}

/// The JSON envelope a host hands to a hook on stdin. Older hosts nest the
/// tool fields inside `tool_response` on post-tool events; the accessors
/// look in both places.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookInput {
    pub session_id: String,
    pub source: Option<String>,
    pub prompt: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Value,
    pub tool_response: Value,
}

impl HookInput {
    pub fn parse(raw: &str) -> Option<HookInput> {
        serde_json::from_str(raw).ok()
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.tool_response.get("tool_name").and_then(Value::as_str))
    }

    pub fn tool_input(&self) -> &Value {
        if !self.tool_input.is_null() {
            &self.tool_input
        } else {
            self.tool_response.get("tool_input").unwrap_or(&Value::Null)
        }
    }

    /// The shell command, for Bash tool events only
    pub fn command(&self) -> Option<String> {
        if self.tool_name() != Some("Bash") {
            return None;
        }
        self.tool_input()
            .get("command")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }

    /// A tool result counts as successful unless the host said otherwise
    pub fn response_success(&self) -> bool {
        self.tool_response.get("success").and_then(Value::as_bool) != Some(false)
    }

    pub fn response_text(&self) -> String {
        match self.tool_response.get("result") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// Build the single JSON response a hook may emit
pub fn envelope(event: HookEvent, context: &str) -> Value {
    json!({
        "hookSpecificOutput": {
            "hookEventName": event.wire_name(),
            "additionalContext": context,
        }
    })
}

/// Shared dependencies handed to every handler
pub struct HookContext {
    pub store: CoordStore,
    pub issues: IssueStore,
    pub embeddings: EmbeddingClient,
    pub semantic: Option<SemanticIndex>,
    pub config: Config,
    pub http: reqwest::Client,
    pub launcher: Launcher,
}

impl HookContext {
    pub fn new(store: CoordStore, issues: IssueStore, config: Config) -> Self {
        Self {
            store,
            issues,
            embeddings: EmbeddingClient::new(),
            semantic: None,
            config,
            http: reqwest::Client::new(),
            launcher: Launcher::Session,
        }
    }

    pub fn with_semantic(mut self, semantic: SemanticIndex) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.launcher = launcher;
        self
    }

    /// Wire up against the configured store. A dead store degrades to an
    /// in-process one so handlers still no-op cleanly.
    pub async fn connect(config: Config) -> Self {
        let store = match RedisKv::connect(&config.redis.url()).await {
            Ok(kv) => CoordStore::new(Arc::new(kv)),
            Err(e) => {
                warn!("coordination store unreachable, degrading: {e}");
                CoordStore::new(Arc::new(MemoryKv::new()))
            }
        };
        let semantic = SemanticIndex::open(&config.memory_dir).ok();
        let mut ctx = Self::new(store, IssueStore::new(), config);
        ctx.semantic = semantic;
        ctx
    }

    /// The task and provider bound to a session, if this is a hekate agent
    pub async fn session_binding(&self, session_id: &str) -> Option<(String, String)> {
        let task_id = self.store.get(&keys::session_task(session_id)).await?;
        let provider = self
            .store
            .get_or(&keys::session_provider(session_id), "unknown")
            .await;
        Some((task_id, provider))
    }

    pub async fn task_complexity(&self, task_id: &str) -> u8 {
        self.store
            .get_i64(&keys::task_complexity(task_id), 5)
            .await
            .clamp(1, 10) as u8
    }
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
pub type Handler = for<'a> fn(&'a HookContext, &'a HookInput) -> HandlerFuture<'a>;

macro_rules! handler {
    ($module:ident) => {{
        fn call<'a>(ctx: &'a HookContext, input: &'a HookInput) -> HandlerFuture<'a> {
            Box::pin($module::run(ctx, input))
        }
        call as Handler
    }};
}

/// Every handler, registered against its event name. Order within an event
/// is the order contexts are injected.
pub fn registry() -> Vec<(HookEvent, &'static str, Handler)> {
    vec![
        (HookEvent::SessionStart, "session-start", handler!(session_start)),
        (HookEvent::PreToolUse, "router", handler!(router)),
        (HookEvent::PreToolUse, "memory-recent", handler!(memory_recent)),
        (HookEvent::PreToolUse, "memory-semantic", handler!(memory_semantic)),
        (HookEvent::PreToolUse, "verify-inject", handler!(verify_inject)),
        (HookEvent::PostToolUse, "track-outcome", handler!(track_outcome)),
        (HookEvent::PostToolUse, "memory-store", handler!(memory_store)),
        (HookEvent::PostToolUse, "verify-prefetch", handler!(verify_prefetch)),
        (HookEvent::PostToolUse, "spawn-agents", handler!(spawn_agents)),
        (HookEvent::PostToolUse, "complete-task", handler!(complete_task)),
        (HookEvent::PostToolUse, "metrics", handler!(metrics)),
        (HookEvent::UserPromptSubmit, "decompose", handler!(decompose)),
    ]
}

/// Run one handler with its panic contained: a broken handler injects
/// nothing instead of unwinding into the host.
async fn run_guarded(handler: Handler, name: &str, ctx: &HookContext, input: &HookInput) -> Option<String> {
    use futures_util::FutureExt;

    match std::panic::AssertUnwindSafe(handler(ctx, input))
        .catch_unwind()
        .await
    {
        Ok(context) => context,
        Err(_) => {
            warn!(handler = name, "hook handler panicked");
            None
        }
    }
}

/// Run every handler registered for an event and merge their injected
/// contexts. Handler panics or failures must never reach the host.
pub async fn dispatch(event: HookEvent, ctx: &HookContext, input: &HookInput) -> Option<String> {
    let mut contexts = Vec::new();
    for (registered_event, name, handler) in registry() {
        if registered_event != event {
            continue;
        }
        if let Some(context) = run_guarded(handler, name, ctx, input).await {
            tracing::debug!(handler = name, "hook injected context");
            if !context.trim().is_empty() {
                contexts.push(context);
            }
        }
    }
    if contexts.is_empty() {
        None
    } else {
        Some(contexts.join("\n\n"))
    }
}
