//! Provider Router
//!
//! Decision order: task-type routing, then the adaptive override learned
//! from history, then the static complexity policy, and finally quota
//! enforcement over the fallback preference order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::QuotaThresholds;
use crate::providers::Provider;
use crate::quota::QuotaTracker;
use crate::routing::features::{ComplexityBucket, FeatureVector};
use crate::routing::learner::PatternLearner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Planning,
    Review,
    Verification,
    Implementation,
}

impl TaskType {
    pub fn parse(s: &str) -> TaskType {
        match s.trim().to_lowercase().as_str() {
            "planning" => TaskType::Planning,
            "review" => TaskType::Review,
            "verification" => TaskType::Verification,
            _ => TaskType::Implementation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub id: String,
    pub title: String,
    pub task_type: TaskType,
    pub complexity: u8,
    pub previous_provider: Option<Provider>,
}

impl TaskDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>, complexity: u8) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            task_type: TaskType::Implementation,
            complexity,
            previous_provider: None,
        }
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn features(&self) -> FeatureVector {
        FeatureVector::from_task(self.complexity, &self.title)
    }

    pub fn bucket(&self) -> ComplexityBucket {
        ComplexityBucket::from_complexity(self.complexity)
    }
}

pub struct Router {
    quotas: HashMap<Provider, Option<QuotaTracker>>,
    thresholds: QuotaThresholds,
    learner: PatternLearner,
}

impl Router {
    pub fn new(
        quotas: HashMap<Provider, Option<QuotaTracker>>,
        thresholds: QuotaThresholds,
        learner: PatternLearner,
    ) -> Self {
        Self {
            quotas,
            thresholds,
            learner,
        }
    }

    /// Providers without a tracker are unmetered and always usable
    async fn usable(&self, provider: Provider, emergency: bool) -> bool {
        match self.quotas.get(&provider) {
            Some(Some(tracker)) => tracker.can_use(emergency).await,
            _ => true,
        }
    }

    async fn usage_percent(&self, provider: Provider) -> f64 {
        match self.quotas.get(&provider) {
            Some(Some(tracker)) => tracker.usage().await.percentage,
            _ => 0.0,
        }
    }

    pub async fn route(&self, task: &TaskDescriptor) -> Provider {
        let chosen = match task.task_type {
            TaskType::Planning => self.route_planning().await,
            TaskType::Review => self.route_review().await,
            TaskType::Verification => self.route_verification().await,
            TaskType::Implementation => self.route_implementation(task).await,
        };
        self.enforce_quota(chosen).await
    }

    async fn route_planning(&self) -> Provider {
        if self.usable(Provider::Claude, false).await {
            Provider::Claude
        } else if self.usable(Provider::OpenRouter, false).await {
            Provider::OpenRouter
        } else {
            Provider::Glm
        }
    }

    async fn route_review(&self) -> Provider {
        // Reviews may dip into the emergency slack
        if self.usable(Provider::Claude, true).await {
            Provider::Claude
        } else {
            Provider::Glm
        }
    }

    async fn route_verification(&self) -> Provider {
        if self.usable(Provider::Glm, false).await {
            Provider::Glm
        } else {
            Provider::OpenRouter
        }
    }

    async fn route_implementation(&self, task: &TaskDescriptor) -> Provider {
        // Learned history overrides the static policy when confident
        if let Some(provider) = self.learner.best_provider(&task.features()).await {
            debug!(
                task = %task.id,
                provider = %provider,
                "adaptive override from learned patterns"
            );
            return provider;
        }

        match task.bucket() {
            ComplexityBucket::Complex => {
                if self.usable(Provider::Claude, false).await {
                    Provider::Claude
                } else {
                    Provider::Glm
                }
            }
            ComplexityBucket::Medium => {
                if self.usable(Provider::Claude, false).await
                    && self.usage_percent(Provider::Claude).await
                        < self.thresholds.claude_conservative
                {
                    Provider::Claude
                } else if self.usable(Provider::Glm, false).await {
                    Provider::Glm
                } else {
                    Provider::DeepSeek
                }
            }
            ComplexityBucket::Simple => Provider::DeepSeek,
        }
    }

    /// If the selected provider is fully exhausted, walk the preference
    /// order and take the first provider with quota left.
    async fn enforce_quota(&self, chosen: Provider) -> Provider {
        if self.usable(chosen, true).await {
            return chosen;
        }
        for candidate in Provider::FALLBACK_ORDER {
            if candidate != chosen && self.usable(candidate, true).await {
                debug!(from = %chosen, to = %candidate, "quota exhausted, falling back");
                return candidate;
            }
        }
        chosen
    }

    /// Advance a task to the next stronger provider after a failed
    /// verification under its previous one.
    pub fn cascade(&self, task: &TaskDescriptor) -> Provider {
        task.previous_provider
            .unwrap_or(Provider::DeepSeek)
            .cascade_next()
    }
}
