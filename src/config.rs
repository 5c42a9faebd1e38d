//! Configuration loading
//!
//! YAML config resolved from `~/.hekate/config.yaml`, then
//! `~/.config/hekate/config.yaml`, then a bundled default.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::HekateError;

/// Per-provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// "web_subscription" providers carry a quota window; "api" providers do not
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub quota_limit: u64,
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,
    #[serde(default)]
    pub buffer_percent: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_window_hours() -> u64 {
    5
}

fn default_pool_size() -> usize {
    2
}

impl ProviderSettings {
    pub fn is_metered(&self) -> bool {
        self.kind == "web_subscription"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPools {
    pub total_agents: usize,
}

/// Iteration budget handed to a spawned child by complexity bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationBudgets {
    pub simple: u32,
    pub medium: u32,
    pub complex: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaThresholds {
    pub claude_conservative: f64,
    pub glm_conservative: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl RedisSettings {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub providers: HashMap<String, ProviderSettings>,
    pub agent_pools: AgentPools,
    pub iteration_budgets: IterationBudgets,
    pub quota_thresholds: QuotaThresholds,
    pub redis: RedisSettings,
    /// Directory holding the semantic memory collection
    #[serde(default = "default_memory_dir")]
    pub memory_dir: PathBuf,
    /// Root under which per-epic agent workspaces are created
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}

fn default_memory_dir() -> PathBuf {
    home_dir().join(".hekate").join("memory")
}

fn default_workspace_root() -> PathBuf {
    home_dir().join("hekate-projects")
}

impl Default for Config {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "claude".to_string(),
            ProviderSettings {
                kind: "web_subscription".to_string(),
                quota_limit: 45,
                window_hours: 5,
                buffer_percent: 20,
                pool_size: 2,
            },
        );
        providers.insert(
            "glm".to_string(),
            ProviderSettings {
                kind: "web_subscription".to_string(),
                quota_limit: 180,
                window_hours: 5,
                buffer_percent: 3,
                pool_size: 4,
            },
        );
        providers.insert(
            "deepseek".to_string(),
            ProviderSettings {
                kind: "api".to_string(),
                quota_limit: 0,
                window_hours: 5,
                buffer_percent: 0,
                pool_size: 6,
            },
        );
        providers.insert(
            "openrouter".to_string(),
            ProviderSettings {
                kind: "api".to_string(),
                quota_limit: 0,
                window_hours: 5,
                buffer_percent: 0,
                pool_size: 2,
            },
        );

        Self {
            providers,
            agent_pools: AgentPools { total_agents: 8 },
            iteration_budgets: IterationBudgets {
                simple: 10,
                medium: 25,
                complex: 50,
            },
            quota_thresholds: QuotaThresholds {
                claude_conservative: 40.0,
                glm_conservative: 50.0,
            },
            redis: RedisSettings {
                host: "localhost".to_string(),
                port: 6379,
                db: 0,
            },
            memory_dir: default_memory_dir(),
            workspace_root: default_workspace_root(),
        }
    }
}

impl Config {
    /// Candidate config locations, highest priority first
    pub fn search_paths() -> Vec<PathBuf> {
        let home = home_dir();
        vec![
            home.join(".hekate").join("config.yaml"),
            home.join(".config").join("hekate").join("config.yaml"),
        ]
    }

    /// Load config from an explicit path, or walk the search order.
    /// Falls back to the bundled default when nothing is found and no
    /// explicit path was given.
    pub fn load(path: Option<&Path>) -> Result<Self, HekateError> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(HekateError::ConfigNotFound(vec![path.to_path_buf()]));
            }
            return Self::from_file(path);
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                info!("Loading config from {:?}", candidate);
                return Self::from_file(&candidate);
            }
        }

        info!("No config file found, using bundled defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, HekateError> {
        let content = std::fs::read_to_string(path).map_err(|source| HekateError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| HekateError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.get(name)
    }

    /// Total concurrent-agent capacity across all pools
    pub fn total_pool_capacity(&self) -> usize {
        self.providers.values().map(|p| p.pool_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_complete() {
        let config = Config::default();
        assert!(config.providers.contains_key("claude"));
        assert!(config.providers.contains_key("glm"));
        assert!(config.providers.contains_key("deepseek"));
        assert!(config.providers.contains_key("openrouter"));
        assert_eq!(config.agent_pools.total_agents, 8);
        assert!(config.provider("claude").unwrap().is_metered());
        assert!(!config.provider("deepseek").unwrap().is_metered());
    }

    #[test]
    fn test_load_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
providers:
  claude:
    type: web_subscription
    quota_limit: 45
    window_hours: 5
    buffer_percent: 20
    pool_size: 2
  deepseek:
    type: api
    pool_size: 6
agent_pools:
  total_agents: 4
iteration_budgets:
  simple: 10
  medium: 25
  complex: 50
quota_thresholds:
  claude_conservative: 40
  glm_conservative: 50
redis:
  host: localhost
  port: 6379
  db: 15
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.agent_pools.total_agents, 4);
        assert_eq!(config.redis.db, 15);
        assert_eq!(config.provider("claude").unwrap().quota_limit, 45);
        assert_eq!(config.provider("deepseek").unwrap().pool_size, 6);
        assert_eq!(config.total_pool_capacity(), 8);
        assert_eq!(config.redis.url(), "redis://localhost:6379/15");
    }

    #[test]
    fn test_explicit_missing_path_is_fatal() {
        assert!(matches!(
            Config::load(Some(Path::new("/nonexistent/hekate.yaml"))),
            Err(HekateError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn test_bad_yaml_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "providers: [not, a, map]").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(HekateError::ConfigParse { .. })
        ));
    }
}
