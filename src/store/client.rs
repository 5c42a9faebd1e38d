//! Typed coordination-store client
//!
//! Every call carries a 2 s deadline and degrades to a caller-supplied
//! default on timeout or backend failure, so hook code never propagates
//! store errors to its host.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::kv::Kv;

const STORE_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct CoordStore {
    kv: Arc<dyn Kv>,
    deadline: Duration,
}

impl CoordStore {
    pub fn new(kv: Arc<dyn Kv>) -> Self {
        Self {
            kv,
            deadline: STORE_DEADLINE,
        }
    }

    async fn run<T, F>(&self, op: &str, default: T, fut: F) -> T
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                debug!("store {op} failed: {e}");
                default
            }
            Err(_) => {
                debug!("store {op} deadline exceeded");
                default
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.run("get", None, self.kv.get(key)).await
    }

    pub async fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).await.unwrap_or_else(|| default.to_string())
    }

    pub async fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .await
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub async fn set(&self, key: &str, value: &str) {
        self.run("set", (), self.kv.set(key, value)).await
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) {
        self.run("set_ex", (), self.kv.set_ex(key, value, ttl_secs))
            .await
    }

    /// The claim primitive: set-if-absent with TTL. Returns false both on
    /// conflict and on store failure, so a degraded store never hands out
    /// a claim two ways.
    pub async fn claim(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        self.run("claim", false, self.kv.set_nx_ex(key, value, ttl_secs))
            .await
    }

    /// Atomic increment. Returns None when the store is unreachable, so
    /// callers can distinguish "no count" from "count is zero".
    pub async fn incr(&self, key: &str) -> Option<i64> {
        self.run("incr", None, async { self.kv.incr(key).await.map(Some) })
            .await
    }

    pub async fn lpush(&self, key: &str, value: &str) {
        self.run("lpush", (), self.kv.lpush(key, value)).await
    }

    pub async fn ltrim(&self, key: &str, start: i64, stop: i64) {
        self.run("ltrim", (), self.kv.ltrim(key, start, stop)).await
    }

    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Vec<String> {
        self.run("lrange", Vec::new(), self.kv.lrange(key, start, stop))
            .await
    }

    pub async fn sadd(&self, key: &str, member: &str) {
        self.run("sadd", (), self.kv.sadd(key, member)).await
    }

    pub async fn smembers(&self, key: &str) -> Vec<String> {
        self.run("smembers", Vec::new(), self.kv.smembers(key)).await
    }

    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        self.run("keys", Vec::new(), self.kv.keys(pattern)).await
    }

    pub async fn del(&self, key: &str) {
        self.run("del", (), self.kv.del(key)).await
    }

    pub async fn expire(&self, key: &str, ttl_secs: i64) {
        self.run("expire", (), self.kv.expire(key, ttl_secs)).await
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.run("exists", false, self.kv.exists(key)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.set(key, &raw).await;
        }
    }

    pub async fn set_json_ex<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.set_ex(key, &raw, ttl_secs).await;
        }
    }
}
