//! Verification-prefetch pipeline
//!
//! Write-class tool use queues verification slots for the providers the
//! task's complexity mandates; a later read-class hook advances aged slots
//! to complete and injects the results. Slot lifecycle:
//! absent -> pending -> complete -> expired (TTL 10 min).
//!
//! `check_status` fakes the verdict deterministically from
//! (provider, complexity). It is a placeholder for an asynchronous
//! provider call; the slot data contract is the stable part.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::providers::Provider;
use crate::store::{keys, CoordStore};

pub const SLOT_TTL_SECS: i64 = 600;
/// A pending slot this old gets advanced on the next read-class hook
pub const PENDING_AGE_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Pending,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "NEEDS_REVIEW")]
    NeedsReview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSlot {
    pub task_id: String,
    pub provider: String,
    pub complexity: u8,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// Verification providers mandated per complexity band
pub fn providers_for(complexity: u8) -> Vec<Provider> {
    match complexity {
        0..=4 => vec![Provider::DeepSeek],
        5..=7 => vec![Provider::DeepSeek, Provider::Glm],
        _ => vec![Provider::Glm, Provider::Claude],
    }
}

#[derive(Clone)]
pub struct VerificationPipeline {
    store: CoordStore,
}

impl VerificationPipeline {
    pub fn new(store: CoordStore) -> Self {
        Self { store }
    }

    /// Queue pending slots for every provider the complexity mandates.
    /// Returns the providers that were queued.
    pub async fn prefetch(&self, task_id: &str, complexity: u8) -> Vec<Provider> {
        let providers = providers_for(complexity);
        let now = Utc::now().timestamp();

        for provider in &providers {
            let slot = VerificationSlot {
                task_id: task_id.to_string(),
                provider: provider.as_str().to_string(),
                complexity,
                status: SlotStatus::Pending,
                result: None,
                confidence: None,
                timestamp: now,
                completed_at: None,
            };
            let key = keys::verify_prefetch(task_id, provider.as_str());
            self.store
                .set_json_ex(&key, &slot, SLOT_TTL_SECS as u64)
                .await;
        }
        providers
    }

    pub async fn slots(&self, task_id: &str) -> Vec<VerificationSlot> {
        let mut slots = Vec::new();
        for key in self.store.keys(&keys::verify_prefetch_scan(task_id)).await {
            if let Some(slot) = self.store.get_json::<VerificationSlot>(&key).await {
                slots.push(slot);
            }
        }
        slots
    }

    /// Advance pending slots that have aged past the threshold and return
    /// every completed slot. The verdict stub is deterministic in
    /// (provider, complexity) so repeated checks agree.
    pub async fn check_status(&self, task_id: &str) -> Vec<VerificationSlot> {
        let now = Utc::now().timestamp();
        let mut completed = Vec::new();

        for mut slot in self.slots(task_id).await {
            if slot.status == SlotStatus::Pending && now - slot.timestamp >= PENDING_AGE_SECS {
                let (verdict, confidence) = Self::pseudo_verdict(&slot.provider, slot.complexity);
                slot.status = SlotStatus::Complete;
                slot.result = Some(verdict);
                slot.confidence = Some(confidence.to_string());
                slot.completed_at = Some(now);

                let key = keys::verify_prefetch(task_id, &slot.provider);
                self.store
                    .set_json_ex(&key, &slot, SLOT_TTL_SECS as u64)
                    .await;
            }
            if slot.status == SlotStatus::Complete {
                completed.push(slot);
            }
        }
        completed
    }

    /// Placeholder verdict: a stable fraction of (provider, complexity)
    /// against a per-band pass rate. Higher complexity fails more often.
    fn pseudo_verdict(provider: &str, complexity: u8) -> (Verdict, &'static str) {
        let pass_rate = match complexity {
            0..=4 => 0.95,
            5..=7 => 0.85,
            _ => 0.75,
        };

        let digest = Sha256::digest(format!("{provider}:{complexity}").as_bytes());
        let bytes: [u8; 8] = digest[..8].try_into().expect("digest is 32 bytes");
        let fraction = u64::from_be_bytes(bytes) as f64 / u64::MAX as f64;

        if fraction < pass_rate {
            (Verdict::Pass, "high")
        } else {
            (Verdict::NeedsReview, "medium")
        }
    }

    /// Render completed slots for context injection, in stable order by
    /// completion time, with a merge hint when any verification passed.
    pub fn format_results(slots: &[VerificationSlot]) -> String {
        if slots.is_empty() {
            return String::new();
        }
        let now = Utc::now().timestamp();

        let mut ordered: Vec<&VerificationSlot> = slots.iter().collect();
        ordered.sort_by_key(|s| s.completed_at.unwrap_or(0));

        let mut parts = vec!["[HEKATE] Prefetched verification results:".to_string(), String::new()];
        for slot in &ordered {
            let result = match slot.result {
                Some(Verdict::Pass) => "PASS",
                Some(Verdict::NeedsReview) => "NEEDS_REVIEW",
                None => "PENDING",
            };
            let symbol = match slot.result {
                Some(Verdict::Pass) => "✓",
                Some(Verdict::NeedsReview) => "≈",
                None => "⏳",
            };
            let age = match slot.completed_at {
                Some(at) if now - at < 60 => format!("{}s ago", now - at),
                Some(at) => format!("{}m ago", (now - at) / 60),
                None => "pending".to_string(),
            };
            parts.push(format!(
                "  {} {:10} | {:12} | {:8} | {}",
                symbol,
                slot.provider,
                result,
                slot.confidence.as_deref().unwrap_or("unknown"),
                age
            ));
        }

        if ordered.iter().any(|s| s.result == Some(Verdict::Pass)) {
            parts.push(String::new());
            parts.push("Note: At least one verification passed. Task may be ready for merge.".to_string());
        }
        parts.join("\n")
    }
}
