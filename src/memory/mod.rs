//! Cross-agent memory bus
//!
//! Two layers: short-lived recent patterns on bounded coordination-store
//! lists, and a long-lived semantic index keyed by embeddings of command
//! patterns so agents can learn from each other's solutions.

pub mod embeddings;
pub mod recent;
pub mod semantic;

pub use embeddings::EmbeddingClient;
pub use recent::{RecentMemory, RecentPattern, SolutionEntry};
pub use semantic::{SemanticEntry, SemanticHit, SemanticIndex, SemanticMetadata};
