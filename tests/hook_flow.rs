//! Cross-agent memory and learning flows through the hook dispatcher
//!
//! One agent's post-tool hooks feed the memory bus and the pattern
//! learner; a different agent's pre-tool hooks read them back.

use std::sync::Arc;

use hekate::config::Config;
use hekate::hooks::{self, HookContext, HookEvent, HookInput};
use hekate::issues::IssueStore;
use hekate::memory::semantic::{SemanticEntry, SemanticIndex, SemanticMetadata};
use hekate::routing::{FeatureVector, PatternLearner};
use hekate::store::{keys, CoordStore, MemoryKv};

fn ctx(store: CoordStore) -> HookContext {
    HookContext::new(
        store,
        IssueStore::new().with_program("/nonexistent/bd"),
        Config::default(),
    )
}

async fn bind(store: &CoordStore, session: &str, task: &str, provider: &str) {
    store.set(&keys::session_task(session), task).await;
    store.set(&keys::session_provider(session), provider).await;
}

fn bash_post(session: &str, command: &str, success: bool) -> HookInput {
    HookInput::parse(&format!(
        r#"{{"session_id":"{session}","tool_response":{{"tool_name":"Bash","tool_input":{{"command":"{command}"}},"success":{success},"result":"ok"}}}}"#
    ))
    .unwrap()
}

fn bash_pre(session: &str, command: &str) -> HookInput {
    HookInput::parse(&format!(
        r#"{{"session_id":"{session}","tool_name":"Bash","tool_input":{{"command":"{command}"}}}}"#
    ))
    .unwrap()
}

#[tokio::test]
async fn solution_patterns_flow_between_agents() {
    let store = CoordStore::new(Arc::new(MemoryKv::new()));
    let ctx = ctx(store.clone());

    bind(&store, "s-deepseek", "bd-1", "deepseek").await;
    bind(&store, "s-glm", "bd-2", "glm").await;

    // The deepseek agent fixes something; its post hooks record the pattern
    hooks::dispatch(
        HookEvent::PostToolUse,
        &ctx,
        &bash_post("s-deepseek", "fix the flaky timeout error in client", true),
    )
    .await;

    // The glm agent starts similar work and gets the suggestion injected
    let context = hooks::dispatch(
        HookEvent::PreToolUse,
        &ctx,
        &bash_pre("s-glm", "fix connection error in pool"),
    )
    .await
    .expect("recent memory injected");
    assert!(context.contains("deepseek agent"));
    assert!(context.contains("bd-1"));

    // The deepseek agent itself gets nothing back: it already knows
    assert!(hooks::dispatch(
        HookEvent::PreToolUse,
        &ctx,
        &bash_pre("s-deepseek", "fix another error"),
    )
    .await
    .is_none());
}

#[tokio::test]
async fn outcomes_accumulate_into_learnable_patterns() {
    let store = CoordStore::new(Arc::new(MemoryKv::new()));
    let ctx = ctx(store.clone());
    bind(&store, "s1", "bd-1", "glm").await;
    store.set(&keys::task_complexity("bd-1"), "6").await;

    let edit_ok = HookInput::parse(
        r#"{"session_id":"s1","tool_response":{"tool_name":"Edit","tool_input":{"file_path":"src/lib.rs"},"success":true}}"#,
    )
    .unwrap();
    let edit_bad = HookInput::parse(
        r#"{"session_id":"s1","tool_response":{"tool_name":"Edit","tool_input":{"file_path":"src/lib.rs"},"success":false}}"#,
    )
    .unwrap();

    for _ in 0..3 {
        hooks::dispatch(HookEvent::PostToolUse, &ctx, &edit_ok).await;
    }
    hooks::dispatch(HookEvent::PostToolUse, &ctx, &edit_bad).await;

    let learner = PatternLearner::new(store.clone());
    let features = FeatureVector::from_tool(6, "Edit", edit_ok.tool_input());
    let record = learner.pattern(&features.stable_hash()).await.unwrap();

    assert_eq!(record.attempts, 4);
    assert_eq!(record.successes, 3);
    assert!(record.successes <= record.attempts);
    let rate = record.success_rate();
    assert!((0.0..=1.0).contains(&rate));

    // 3/4 at >= 3 attempts clears the override bar: the learner now
    // recommends glm for this shape of work
    assert_eq!(
        learner.best_provider(&features).await.map(|p| p.as_str()),
        Some("glm")
    );
}

#[tokio::test]
async fn semantic_hits_exclude_same_provider_and_cold_entries() {
    let dir = tempfile::tempdir().unwrap();
    let index = SemanticIndex::open(dir.path()).unwrap();
    let now = chrono::Utc::now().timestamp();

    let seed = |id: &str, provider: &str, embedding: Vec<f32>, timestamp: i64| SemanticEntry {
        id: id.to_string(),
        document: format!("bugfix: patched {id}"),
        embedding,
        metadata: SemanticMetadata {
            session_id: "s0".to_string(),
            task_id: id.to_string(),
            provider: provider.to_string(),
            pattern_type: "bugfix".to_string(),
            tool: "Bash".to_string(),
            embedding_provider: "openrouter".to_string(),
            timestamp,
        },
    };

    index.add(seed("bd-close", "deepseek", vec![1.0, 0.0], now)).await.unwrap();
    index.add(seed("bd-own", "glm", vec![1.0, 0.0], now)).await.unwrap();
    index.add(seed("bd-far", "deepseek", vec![0.0, 1.0], now)).await.unwrap();
    index
        .add(seed("bd-stale", "deepseek", vec![1.0, 0.0], now - 3 * 3600))
        .await
        .unwrap();

    let hits = index.query(&[1.0, 0.0], 5, now - 7200).await;
    let usable: Vec<&str> = hits
        .iter()
        .filter(|h| h.similarity >= 0.65 && h.metadata.provider != "glm")
        .map(|h| h.metadata.task_id.as_str())
        .collect();

    assert_eq!(usable, vec!["bd-close"]);
}
