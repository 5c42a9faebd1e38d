//! Pattern Learner
//!
//! Records (features, provider, outcome) triples and keeps three views:
//! per-pattern records keyed by feature hash (24 h TTL), per-provider
//! aggregates, and per-(provider, complexity) aggregates (no TTL). The
//! read-modify-write over JSON blobs may lose an occasional update under
//! contention; success rates are estimators, not ledgers, and each writer
//! preserves `successes <= attempts`.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::providers::Provider;
use crate::routing::features::FeatureVector;
use crate::store::{keys, CoordStore};

const PATTERN_TTL_SECS: i64 = 86_400;
const HISTORY_CAP: i64 = 1000;

/// Minimum attempts before a pattern can override static routing
pub const PATTERN_MIN_ATTEMPTS: u64 = 3;
/// Success rate a pattern must beat to override static routing
pub const PATTERN_MIN_RATE: f64 = 0.7;
/// Minimum attempts before complexity stats are trusted
pub const STATS_MIN_ATTEMPTS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRecord {
    pub features: FeatureVector,
    pub provider: String,
    pub attempts: u64,
    pub successes: u64,
    pub created_at: i64,
    pub last_used: i64,
}

impl PatternRecord {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStats {
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub success_rate: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityStats {
    pub attempts: u64,
    pub successes: u64,
    pub success_rate: f64,
}

/// One line of the bounded routing history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRecord {
    pub task_id: String,
    pub provider: String,
    pub complexity: u8,
    pub tool_name: String,
    pub success: bool,
    pub timestamp: i64,
    pub features: FeatureVector,
}

#[derive(Clone)]
pub struct PatternLearner {
    store: CoordStore,
}

impl PatternLearner {
    pub fn new(store: CoordStore) -> Self {
        Self { store }
    }

    /// Record one tool outcome into all three views plus the history list
    pub async fn record_outcome(
        &self,
        task_id: &str,
        features: &FeatureVector,
        provider: &str,
        tool_name: &str,
        success: bool,
    ) {
        let now = Utc::now().timestamp();

        let record = RoutingRecord {
            task_id: task_id.to_string(),
            provider: provider.to_string(),
            complexity: features.complexity,
            tool_name: tool_name.to_string(),
            success,
            timestamp: now,
            features: features.clone(),
        };
        if let Ok(line) = serde_json::to_string(&record) {
            self.store.lpush(keys::ROUTING_HISTORY, &line).await;
            self.store
                .ltrim(keys::ROUTING_HISTORY, 0, HISTORY_CAP - 1)
                .await;
        }

        self.update_pattern(features, provider, success, now).await;
        self.update_provider_stats(provider, success, now).await;
        self.update_complexity_stats(provider, features.complexity, success)
            .await;
    }

    async fn update_pattern(
        &self,
        features: &FeatureVector,
        provider: &str,
        success: bool,
        now: i64,
    ) {
        let key = keys::routing_pattern(&features.stable_hash());
        let mut record = self
            .store
            .get_json::<PatternRecord>(&key)
            .await
            .unwrap_or_else(|| PatternRecord {
                features: features.clone(),
                provider: provider.to_string(),
                attempts: 0,
                successes: 0,
                created_at: now,
                last_used: now,
            });

        record.attempts += 1;
        if success {
            record.successes += 1;
        }
        record.last_used = now;

        self.store.set_json(&key, &record).await;
        self.store.expire(&key, PATTERN_TTL_SECS).await;
    }

    async fn update_provider_stats(&self, provider: &str, success: bool, now: i64) {
        let key = keys::provider_stats(provider);
        let mut stats = self
            .store
            .get_json::<ProviderStats>(&key)
            .await
            .unwrap_or(ProviderStats {
                total_tasks: 0,
                successful_tasks: 0,
                success_rate: 0.0,
                created_at: now,
            });

        stats.total_tasks += 1;
        if success {
            stats.successful_tasks += 1;
        }
        stats.success_rate = stats.successful_tasks as f64 / stats.total_tasks as f64;

        self.store.set_json(&key, &stats).await;
    }

    async fn update_complexity_stats(&self, provider: &str, complexity: u8, success: bool) {
        let key = keys::provider_complexity_stats(provider, complexity);
        let mut stats = self
            .store
            .get_json::<ComplexityStats>(&key)
            .await
            .unwrap_or(ComplexityStats {
                attempts: 0,
                successes: 0,
                success_rate: 0.0,
            });

        stats.attempts += 1;
        if success {
            stats.successes += 1;
        }
        stats.success_rate = stats.successes as f64 / stats.attempts as f64;

        self.store.set_json(&key, &stats).await;
    }

    pub async fn pattern(&self, feature_hash: &str) -> Option<PatternRecord> {
        self.store
            .get_json(&keys::routing_pattern(feature_hash))
            .await
    }

    pub async fn provider_stats(&self, provider: &str) -> Option<ProviderStats> {
        self.store.get_json(&keys::provider_stats(provider)).await
    }

    pub async fn complexity_stats(
        &self,
        provider: &str,
        complexity: u8,
    ) -> Option<ComplexityStats> {
        self.store
            .get_json(&keys::provider_complexity_stats(provider, complexity))
            .await
    }

    /// Best provider for a feature vector by learned history: an exact
    /// pattern hit wins, then the strongest (provider, complexity) stats.
    pub async fn best_provider(&self, features: &FeatureVector) -> Option<Provider> {
        if let Some(pattern) = self.pattern(&features.stable_hash()).await {
            if pattern.attempts >= PATTERN_MIN_ATTEMPTS && pattern.success_rate() > PATTERN_MIN_RATE
            {
                if let Some(provider) = Provider::parse(&pattern.provider) {
                    return Some(provider);
                }
            }
        }

        let mut best: Option<(Provider, f64, u64)> = None;
        for provider in Provider::ALL {
            if let Some(stats) = self
                .complexity_stats(provider.as_str(), features.complexity)
                .await
            {
                if stats.attempts < STATS_MIN_ATTEMPTS {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((_, rate, attempts)) => {
                        stats.success_rate > rate
                            || (stats.success_rate == rate && stats.attempts > attempts)
                    }
                };
                if better {
                    best = Some((provider, stats.success_rate, stats.attempts));
                }
            }
        }
        best.map(|(provider, _, _)| provider)
    }

    pub async fn recent_history(&self, n: i64) -> Vec<RoutingRecord> {
        self.store
            .lrange(keys::ROUTING_HISTORY, 0, n - 1)
            .await
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKv;
    use serde_json::json;
    use std::sync::Arc;

    fn learner() -> PatternLearner {
        PatternLearner::new(CoordStore::new(Arc::new(MemoryKv::new())))
    }

    fn features() -> FeatureVector {
        FeatureVector::from_tool(6, "Edit", &json!({"file_path": "src/auth.rs"}))
    }

    #[tokio::test]
    async fn test_pattern_accumulates() {
        let learner = learner();
        let features = features();

        learner
            .record_outcome("bd-1", &features, "glm", "Edit", true)
            .await;
        learner
            .record_outcome("bd-1", &features, "glm", "Edit", false)
            .await;
        learner
            .record_outcome("bd-2", &features, "glm", "Edit", true)
            .await;

        let record = learner.pattern(&features.stable_hash()).await.unwrap();
        assert_eq!(record.attempts, 3);
        assert_eq!(record.successes, 2);
        assert!(record.successes <= record.attempts);
        assert!((record.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stats_views() {
        let learner = learner();
        let features = features();

        for _ in 0..4 {
            learner
                .record_outcome("bd-1", &features, "deepseek", "Edit", true)
                .await;
        }
        learner
            .record_outcome("bd-1", &features, "deepseek", "Edit", false)
            .await;

        let stats = learner.provider_stats("deepseek").await.unwrap();
        assert_eq!(stats.total_tasks, 5);
        assert_eq!(stats.successful_tasks, 4);
        assert!((stats.success_rate - 0.8).abs() < 1e-9);

        let cstats = learner.complexity_stats("deepseek", 6).await.unwrap();
        assert_eq!(cstats.attempts, 5);
        assert_eq!(cstats.successes, 4);
    }

    #[tokio::test]
    async fn test_weak_pattern_never_overrides() {
        let learner = learner();
        let features = features();

        // Two attempts is below the confidence floor
        learner
            .record_outcome("bd-1", &features, "glm", "Edit", true)
            .await;
        learner
            .record_outcome("bd-1", &features, "glm", "Edit", true)
            .await;
        assert!(learner.best_provider(&features).await.is_none());

        // Third success crosses it
        learner
            .record_outcome("bd-1", &features, "glm", "Edit", true)
            .await;
        assert_eq!(learner.best_provider(&features).await, Some(Provider::Glm));
    }

    #[tokio::test]
    async fn test_complexity_stats_fallback() {
        let learner = learner();
        let features = features();

        // No exact-pattern hit for a different hash; feed complexity stats
        let other = FeatureVector::from_tool(6, "Write", &json!({}));
        for _ in 0..6 {
            learner
                .record_outcome("bd-3", &other, "claude", "Write", true)
                .await;
        }

        // Pattern miss for `features`, but claude has strong complexity-6 stats
        assert_eq!(
            learner.best_provider(&features).await,
            Some(Provider::Claude)
        );
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_ordered() {
        let learner = learner();
        let features = features();

        for i in 0..5 {
            learner
                .record_outcome(&format!("bd-{i}"), &features, "glm", "Edit", true)
                .await;
        }
        let history = learner.recent_history(3).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].task_id, "bd-4");
    }
}
