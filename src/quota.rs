//! Quota Tracker
//!
//! Sliding usage window per provider, backed by the coordination store so
//! every supervisor and hook process sees the same counts. The window is
//! lazily reset on access; `count` only grows within a window and the
//! increment is atomic across concurrent processes.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::store::{keys, CoordStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub count: u64,
    pub limit: u64,
    pub percentage: f64,
    pub remaining: i64,
    pub buffer_limit: u64,
    pub emergency_limit: u64,
    pub below_buffer: bool,
    pub is_emergency: bool,
}

#[derive(Clone)]
pub struct QuotaTracker {
    store: CoordStore,
    provider: String,
    pub limit: u64,
    pub window_hours: u64,
    pub buffer_percent: u64,
}

impl QuotaTracker {
    pub fn new(
        store: CoordStore,
        provider: impl Into<String>,
        limit: u64,
        window_hours: u64,
        buffer_percent: u64,
    ) -> Self {
        Self {
            store,
            provider: provider.into(),
            limit,
            window_hours,
            buffer_percent,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Soft limit below which non-emergency callers must stay
    pub fn buffer_limit(&self) -> u64 {
        (self.limit as f64 * (1.0 - self.buffer_percent as f64 / 100.0)) as u64
    }

    /// Size of the slack pool reserved for emergency use
    pub fn emergency_limit(&self) -> u64 {
        (self.limit as f64 * (self.buffer_percent as f64 / 100.0)) as u64
    }

    /// Publish limit and window so short-lived hook processes can
    /// reconstruct this tracker from the store alone.
    pub async fn publish(&self) {
        self.store
            .set(&keys::quota_limit(&self.provider), &self.limit.to_string())
            .await;
        self.store
            .set(
                &keys::quota_window_hours(&self.provider),
                &self.window_hours.to_string(),
            )
            .await;
    }

    /// Reconstruct a tracker from published store state
    pub async fn from_store(store: CoordStore, provider: &str) -> Self {
        let limit = store.get_i64(&keys::quota_limit(provider), 50).await.max(0) as u64;
        let window_hours = store
            .get_i64(&keys::quota_window_hours(provider), 24)
            .await
            .max(1) as u64;
        Self::new(store, provider, limit, window_hours, 0)
    }

    async fn ensure_window(&self) {
        let window_key = keys::quota_window_start(&self.provider);
        let count_key = keys::quota_count(&self.provider);
        let now = Utc::now().timestamp();

        match self.store.get(&window_key).await {
            None => {
                self.store.set(&window_key, &now.to_string()).await;
                self.store.set(&count_key, "0").await;
            }
            Some(raw) => {
                let start = raw.parse::<i64>().unwrap_or(0);
                if now - start > (self.window_hours as i64) * 3600 {
                    self.store.set(&window_key, &now.to_string()).await;
                    self.store.set(&count_key, "0").await;
                }
            }
        }
    }

    pub async fn increment(&self) -> i64 {
        self.ensure_window().await;
        self.store
            .incr(&keys::quota_count(&self.provider))
            .await
            .unwrap_or(0)
    }

    pub async fn count(&self) -> u64 {
        self.ensure_window().await;
        self.store
            .get_i64(&keys::quota_count(&self.provider), 0)
            .await
            .max(0) as u64
    }

    pub async fn usage(&self) -> QuotaUsage {
        let count = self.count().await;
        let buffer_limit = self.buffer_limit();
        QuotaUsage {
            count,
            limit: self.limit,
            percentage: if self.limit > 0 {
                count as f64 / self.limit as f64 * 100.0
            } else {
                0.0
            },
            remaining: self.limit as i64 - count as i64,
            buffer_limit,
            emergency_limit: self.emergency_limit(),
            below_buffer: count < buffer_limit,
            is_emergency: count >= buffer_limit,
        }
    }

    /// Whether another request may be issued. Non-emergency callers stay
    /// below the buffer limit; the slack up to `limit` is only reachable
    /// when `emergency` is set.
    pub async fn can_use(&self, emergency: bool) -> bool {
        let count = self.count().await;
        if emergency {
            count < self.limit
        } else {
            count < self.buffer_limit()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKv;
    use std::sync::Arc;

    fn tracker(limit: u64, buffer_percent: u64) -> QuotaTracker {
        let store = CoordStore::new(Arc::new(MemoryKv::new()));
        QuotaTracker::new(store, "claude", limit, 5, buffer_percent)
    }

    #[tokio::test]
    async fn test_thresholds() {
        let tracker = tracker(45, 20);
        assert_eq!(tracker.buffer_limit(), 36);
        assert_eq!(tracker.emergency_limit(), 9);
    }

    #[tokio::test]
    async fn test_tracks_usage() {
        let tracker = tracker(45, 20);
        tracker.increment().await;
        tracker.increment().await;

        let usage = tracker.usage().await;
        assert_eq!(usage.count, 2);
        assert_eq!(usage.limit, 45);
        assert_eq!(usage.remaining, 43);
        assert!((usage.percentage - 4.44).abs() < 0.1);
        assert!(usage.below_buffer);
    }

    #[tokio::test]
    async fn test_buffer_boundary() {
        let tracker = tracker(45, 20);
        for _ in 0..35 {
            tracker.increment().await;
        }
        // count = 35 < 36
        assert!(tracker.can_use(false).await);
        assert!(tracker.can_use(true).await);

        tracker.increment().await;
        // count = 36: buffer exhausted, emergency slack remains
        assert!(!tracker.can_use(false).await);
        assert!(tracker.can_use(true).await);

        for _ in 0..9 {
            tracker.increment().await;
        }
        // count = 45: fully exhausted
        assert!(!tracker.can_use(true).await);
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let store = CoordStore::new(Arc::new(MemoryKv::new()));
        let tracker = QuotaTracker::new(store.clone(), "test", 45, 5, 20);

        tracker.increment().await;
        tracker.increment().await;
        assert_eq!(tracker.usage().await.count, 2);

        let past = Utc::now().timestamp() - 6 * 3600;
        store
            .set(&keys::quota_window_start("test"), &past.to_string())
            .await;

        tracker.increment().await;
        assert_eq!(tracker.usage().await.count, 1);
    }

    #[tokio::test]
    async fn test_publish_and_reconstruct() {
        let store = CoordStore::new(Arc::new(MemoryKv::new()));
        let tracker = QuotaTracker::new(store.clone(), "glm", 180, 5, 3);
        tracker.publish().await;

        let rebuilt = QuotaTracker::from_store(store, "glm").await;
        assert_eq!(rebuilt.limit, 180);
        assert_eq!(rebuilt.window_hours, 5);
    }
}
