//! Agent lifecycle
//!
//! Spawning, heartbeat upkeep, status classification, and reclamation of
//! the child processes that host coding sessions.

pub mod manager;

pub use manager::{AgentManager, AgentStatus, Launcher};
