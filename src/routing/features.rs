//! Task feature vectors
//!
//! The tuple routing and learning share: complexity, tool kind, and the
//! write/read/test flags. Hashing is a stable sha256 over the canonical
//! JSON encoding, so every process derives the same pattern key for the
//! same features.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const WRITE_TOOLS: [&str; 3] = ["Write", "Edit", "MultiEdit"];
pub const READ_TOOLS: [&str; 3] = ["Read", "Glob", "Grep"];

/// Complexity bucket boundaries: 1-4 simple, 5-7 medium, 8-10 complex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexityBucket {
    Simple,
    Medium,
    Complex,
}

impl ComplexityBucket {
    pub fn from_complexity(complexity: u8) -> Self {
        match complexity {
            0..=4 => ComplexityBucket::Simple,
            5..=7 => ComplexityBucket::Medium,
            _ => ComplexityBucket::Complex,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityBucket::Simple => "simple",
            ComplexityBucket::Medium => "medium",
            ComplexityBucket::Complex => "complex",
        }
    }

    /// Label used on metric keys
    pub fn metric_label(&self) -> &'static str {
        match self {
            ComplexityBucket::Simple => "low",
            ComplexityBucket::Medium => "medium",
            ComplexityBucket::Complex => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub complexity: u8,
    pub tool_kind: String,
    pub is_write: bool,
    pub is_read: bool,
    pub is_test_related: bool,
}

impl FeatureVector {
    /// Features of a tool invocation inside a running session
    pub fn from_tool(complexity: u8, tool_name: &str, tool_input: &Value) -> Self {
        let input_text = tool_input.to_string().to_lowercase();
        Self {
            complexity,
            tool_kind: tool_name.to_string(),
            is_write: WRITE_TOOLS.contains(&tool_name),
            is_read: READ_TOOLS.contains(&tool_name),
            is_test_related: input_text.contains("test"),
        }
    }

    /// Task-level features, used when routing before any tool has run
    pub fn from_task(complexity: u8, title: &str) -> Self {
        Self {
            complexity,
            tool_kind: "task".to_string(),
            is_write: false,
            is_read: false,
            is_test_related: title.to_lowercase().contains("test"),
        }
    }

    pub fn bucket(&self) -> ComplexityBucket {
        ComplexityBucket::from_complexity(self.complexity)
    }

    /// Stable pattern key: hex sha256 of the canonical JSON encoding,
    /// truncated to 16 bytes.
    pub fn stable_hash(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(&digest[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_classification() {
        let write = FeatureVector::from_tool(6, "Edit", &json!({"file_path": "src/lib.rs"}));
        assert!(write.is_write);
        assert!(!write.is_read);

        let read = FeatureVector::from_tool(6, "Grep", &json!({"pattern": "fn main"}));
        assert!(read.is_read);

        let test = FeatureVector::from_tool(3, "Bash", &json!({"command": "cargo test"}));
        assert!(test.is_test_related);
        assert!(!test.is_write);
    }

    #[test]
    fn test_hash_is_stable_and_discriminating() {
        let a = FeatureVector::from_tool(6, "Edit", &json!({"file_path": "a.rs"}));
        let b = FeatureVector::from_tool(6, "Edit", &json!({"file_path": "b.rs"}));
        // Same features hash alike even when inputs differ
        assert_eq!(a.stable_hash(), b.stable_hash());

        let c = FeatureVector::from_tool(7, "Edit", &json!({"file_path": "a.rs"}));
        assert_ne!(a.stable_hash(), c.stable_hash());
        assert_eq!(a.stable_hash().len(), 32);
    }

    #[test]
    fn test_buckets() {
        assert_eq!(ComplexityBucket::from_complexity(1), ComplexityBucket::Simple);
        assert_eq!(ComplexityBucket::from_complexity(4), ComplexityBucket::Simple);
        assert_eq!(ComplexityBucket::from_complexity(5), ComplexityBucket::Medium);
        assert_eq!(ComplexityBucket::from_complexity(7), ComplexityBucket::Medium);
        assert_eq!(ComplexityBucket::from_complexity(8), ComplexityBucket::Complex);
        assert_eq!(ComplexityBucket::from_complexity(10), ComplexityBucket::Complex);
        assert_eq!(ComplexityBucket::Complex.metric_label(), "high");
    }
}
