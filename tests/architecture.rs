//! Structural checks
//!
//! The supervisor's tick and the heartbeat refresher share the agent map,
//! hooks run concurrently across agents, and every shared component is
//! handed across tasks. All of them must stay Send + Sync; trait objects
//! behind the store seam must stay object-safe.

use hekate::agents::AgentManager;
use hekate::issues::IssueStore;
use hekate::memory::{EmbeddingClient, RecentMemory, SemanticIndex};
use hekate::quota::QuotaTracker;
use hekate::routing::PatternLearner;
use hekate::store::{CoordStore, Kv, MemoryKv, RedisKv};
use hekate::verify::VerificationPipeline;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn shared_components_are_thread_safe() {
    assert_send_sync::<CoordStore>();
    assert_send_sync::<MemoryKv>();
    assert_send_sync::<RedisKv>();
    assert_send_sync::<IssueStore>();
    assert_send_sync::<AgentManager>();
    assert_send_sync::<QuotaTracker>();
    assert_send_sync::<PatternLearner>();
    assert_send_sync::<VerificationPipeline>();
    assert_send_sync::<RecentMemory>();
    assert_send_sync::<SemanticIndex>();
    assert_send_sync::<EmbeddingClient>();
}

#[test]
fn kv_backends_are_interchangeable() {
    // The store seam is a trait object; both backends must erase to it
    fn assert_kv<T: Kv>() {}
    assert_kv::<MemoryKv>();
    assert_kv::<RedisKv>();

    let _erased: std::sync::Arc<dyn Kv> = std::sync::Arc::new(MemoryKv::new());
}
