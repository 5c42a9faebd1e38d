//! Coordination Store
//!
//! Typed facade over the shared key-value service that mediates claims,
//! heartbeats, quotas, learned patterns, memory, and metrics across every
//! hekate process. All cross-process synchronization goes through here.

pub mod client;
pub mod keys;
pub mod kv;

pub use client::CoordStore;
pub use kv::{Kv, MemoryKv, RedisKv};

use std::sync::Arc;

use crate::config::RedisSettings;

/// Connect a typed client against the configured backend
pub async fn connect(settings: &RedisSettings) -> Result<CoordStore, redis::RedisError> {
    let kv = RedisKv::connect(&settings.url()).await?;
    Ok(CoordStore::new(Arc::new(kv)))
}
