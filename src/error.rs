//! Fatal startup errors
//!
//! Everything past startup degrades to defaults instead of erroring; only
//! configuration and coordination-store connectivity can abort the process.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HekateError {
    #[error("no config.yaml found in any of: {0:?}")]
    ConfigNotFound(Vec<PathBuf>),

    #[error("failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("coordination store unreachable at {addr}: {source}")]
    StoreUnreachable {
        addr: String,
        #[source]
        source: redis::RedisError,
    },
}
