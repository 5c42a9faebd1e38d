//! Semantic memory index
//!
//! Persistent vector collection over command patterns, shared by every
//! agent. File-backed JSON with an in-memory cache; embeddings are
//! normalized on insert so similarity is a plain dot product.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

const COLLECTION: &str = "sessions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMetadata {
    pub session_id: String,
    pub task_id: String,
    pub provider: String,
    pub pattern_type: String,
    pub tool: String,
    pub embedding_provider: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticEntry {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: SemanticMetadata,
}

/// A search hit with its cosine similarity
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub document: String,
    pub similarity: f32,
    pub metadata: SemanticMetadata,
}

pub struct SemanticIndex {
    path: PathBuf,
    cache: Arc<RwLock<Vec<SemanticEntry>>>,
}

impl SemanticIndex {
    /// Open (or create) the collection under the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create memory dir {dir:?}"))?;
        let path = dir.join(format!("{COLLECTION}.json"));

        let entries: Vec<SemanticEntry> = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            Vec::new()
        };
        info!("Semantic index loaded {} entries from {:?}", entries.len(), path);

        Ok(Self {
            path,
            cache: Arc::new(RwLock::new(entries)),
        })
    }

    fn normalize(vec: &mut [f32]) {
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vec {
                *x /= norm;
            }
        }
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    pub async fn add(&self, mut entry: SemanticEntry) -> Result<()> {
        Self::normalize(&mut entry.embedding);
        debug!("Indexing pattern {} ({})", entry.id, entry.metadata.pattern_type);
        {
            let mut cache = self.cache.write().await;
            cache.push(entry);
        }
        self.persist().await
    }

    /// Top-k entries newer than `since`, scored by cosine similarity
    pub async fn query(&self, embedding: &[f32], k: usize, since: i64) -> Vec<SemanticHit> {
        let mut query = embedding.to_vec();
        Self::normalize(&mut query);

        let cache = self.cache.read().await;
        let mut scored: Vec<(f32, usize)> = cache
            .iter()
            .enumerate()
            .filter(|(_, e)| e.metadata.timestamp >= since)
            .map(|(idx, e)| (Self::dot(&query, &e.embedding), idx))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(similarity, idx)| {
                let entry = &cache[idx];
                SemanticHit {
                    document: entry.document.clone(),
                    similarity,
                    metadata: entry.metadata.clone(),
                }
            })
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn persist(&self) -> Result<()> {
        let cache = self.cache.read().await;
        let content = serde_json::to_string(&*cache)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}
