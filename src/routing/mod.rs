//! Routing
//!
//! Picks a provider for each task from static policy, learned patterns, and
//! quota state, and records outcomes so the policy improves over time.

pub mod features;
pub mod learner;
pub mod router;

pub use features::{ComplexityBucket, FeatureVector};
pub use learner::{PatternLearner, PatternRecord, ProviderStats};
pub use router::{Router, TaskDescriptor, TaskType};
