//! Embedding service client
//!
//! Two interchangeable HTTP back-ends used only for text -> vector:
//! OpenRouter first, Voyage as fallback. Calls carry a 10 s deadline and
//! inputs are truncated to 500 chars; a total miss returns None and the
//! caller skips semantic memory for that event.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const EMBED_DEADLINE: Duration = Duration::from_secs(10);
const INPUT_CAP: usize = 500;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/embeddings";
const OPENROUTER_MODEL: &str = "openai/text-embedding-3-small";
const VOYAGE_URL: &str = "https://api.voyageai.com/v1/embeddings";
const VOYAGE_MODEL: &str = "voyage-code-3";

/// Whether the text is being stored or used as a search query; Voyage
/// embeds the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Document,
    Query,
}

impl InputKind {
    fn as_str(&self) -> &'static str {
        match self {
            InputKind::Document => "document",
            InputKind::Query => "query",
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Clone)]
pub struct EmbeddingClient {
    http: Client,
}

impl Default for EmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    fn truncate(text: &str) -> &str {
        match text.char_indices().nth(INPUT_CAP) {
            Some((idx, _)) => &text[..idx],
            None => text,
        }
    }

    /// Embed text through the fallback chain. Returns the vector and the
    /// name of the provider that produced it, or None when both fail.
    pub async fn embed(&self, text: &str, kind: InputKind) -> Option<(Vec<f32>, &'static str)> {
        match self.embed_openrouter(text).await {
            Ok(vector) => return Some((vector, "openrouter")),
            Err(e) => debug!("openrouter embedding failed: {e}"),
        }
        match self.embed_voyage(text, kind).await {
            Ok(vector) => Some((vector, "voyage")),
            Err(e) => {
                debug!("voyage embedding failed: {e}");
                None
            }
        }
    }

    async fn embed_openrouter(&self, text: &str) -> Result<Vec<f32>> {
        let api_key =
            std::env::var("OPENROUTER_API_KEY").context("OPENROUTER_API_KEY not set")?;

        let response = self
            .http
            .post(OPENROUTER_URL)
            .bearer_auth(api_key)
            .timeout(EMBED_DEADLINE)
            .json(&json!({
                "model": OPENROUTER_MODEL,
                "input": Self::truncate(text),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("openrouter returned {}", response.status()));
        }
        let body: EmbeddingResponse = response.json().await?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("empty embedding response")
    }

    async fn embed_voyage(&self, text: &str, kind: InputKind) -> Result<Vec<f32>> {
        let api_key = std::env::var("VOYAGE_API_KEY").context("VOYAGE_API_KEY not set")?;

        let response = self
            .http
            .post(VOYAGE_URL)
            .bearer_auth(api_key)
            .timeout(EMBED_DEADLINE)
            .json(&json!({
                "model": VOYAGE_MODEL,
                "input": Self::truncate(text),
                "input_type": kind.as_str(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("voyage returned {}", response.status()));
        }
        let body: EmbeddingResponse = response.json().await?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("empty embedding response")
    }
}
