//! Provider Registry
//!
//! The closed set of LLM back-ends agents can run against. Each provider
//! maps to a base URL, the environment variable holding its auth token, and
//! an optional model override. `env_bundle` is pure: the supervisor never
//! mutates its own environment, only the one inherited by a spawned child.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    Glm,
    DeepSeek,
    OpenRouter,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Claude,
        Provider::Glm,
        Provider::DeepSeek,
        Provider::OpenRouter,
    ];

    /// Preference order when a selected provider's quota is exhausted
    pub const FALLBACK_ORDER: [Provider; 4] = [
        Provider::DeepSeek,
        Provider::Glm,
        Provider::OpenRouter,
        Provider::Claude,
    ];

    /// Escalation chain for tasks that failed verification
    pub const CASCADE: [Provider; 4] = [
        Provider::DeepSeek,
        Provider::Glm,
        Provider::OpenRouter,
        Provider::Claude,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Glm => "glm",
            Provider::DeepSeek => "deepseek",
            Provider::OpenRouter => "openrouter",
        }
    }

    pub fn parse(s: &str) -> Option<Provider> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Some(Provider::Claude),
            "glm" => Some(Provider::Glm),
            "deepseek" => Some(Provider::DeepSeek),
            "openrouter" => Some(Provider::OpenRouter),
            _ => None,
        }
    }

    /// Anthropic-compatible endpoint the session CLI is pointed at.
    /// Claude uses its native default and needs no override.
    pub fn base_url(&self) -> Option<&'static str> {
        match self {
            Provider::Claude => None,
            Provider::Glm => Some("https://api.z.ai/api/anthropic"),
            Provider::DeepSeek => Some("https://api.deepseek.com/anthropic"),
            Provider::OpenRouter => Some("https://openrouter.ai/api"),
        }
    }

    /// Environment variable carrying the auth token for this provider
    pub fn auth_env(&self) -> Option<&'static str> {
        match self {
            Provider::Claude => None,
            Provider::Glm => Some("Z_AI_API_KEY"),
            Provider::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
        }
    }

    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Provider::Glm => Some("glm-4.7"),
            _ => None,
        }
    }

    /// Hard cap on agents the spawn hook may start per provider
    pub fn spawn_cap(&self) -> usize {
        match self {
            Provider::Claude => 2,
            Provider::Glm => 4,
            Provider::DeepSeek => 6,
            Provider::OpenRouter => 2,
        }
    }

    /// Spawn cap for a provider string that may be the unresolved "auto"
    pub fn spawn_cap_for(name: &str) -> usize {
        Provider::parse(name).map(|p| p.spawn_cap()).unwrap_or(2)
    }

    /// Environment bundle a child session inherits to talk to this provider
    pub fn env_bundle(&self) -> Vec<(String, String)> {
        let mut bundle = Vec::new();
        if let Some(url) = self.base_url() {
            bundle.push(("ANTHROPIC_BASE_URL".to_string(), url.to_string()));
        }
        if let Some(var) = self.auth_env() {
            let token = std::env::var(var).unwrap_or_default();
            bundle.push(("ANTHROPIC_AUTH_TOKEN".to_string(), token));
        }
        if let Some(model) = self.default_model() {
            bundle.push(("ANTHROPIC_DEFAULT_OPUS_MODEL".to_string(), model.to_string()));
        }
        bundle
    }

    /// Next provider in the verification-failure cascade; the chain ends at
    /// claude, which also absorbs unknown predecessors.
    pub fn cascade_next(&self) -> Provider {
        let chain = Self::CASCADE;
        match chain.iter().position(|p| p == self) {
            Some(i) if i + 1 < chain.len() => chain[i + 1],
            _ => Provider::Claude,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_roundtrip() {
        for p in Provider::ALL {
            assert_eq!(Provider::parse(p.as_str()), Some(p));
        }
        assert_eq!(Provider::parse("CLAUDE"), Some(Provider::Claude));
        assert_eq!(Provider::parse("auto"), None);
    }

    #[test]
    fn test_cascade_chain() {
        assert_eq!(Provider::DeepSeek.cascade_next(), Provider::Glm);
        assert_eq!(Provider::Glm.cascade_next(), Provider::OpenRouter);
        assert_eq!(Provider::OpenRouter.cascade_next(), Provider::Claude);
        // End of chain stays at claude
        assert_eq!(Provider::Claude.cascade_next(), Provider::Claude);
    }

    #[test]
    fn test_env_bundle_shape() {
        let bundle = Provider::Glm.env_bundle();
        let keys: Vec<&str> = bundle.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"ANTHROPIC_BASE_URL"));
        assert!(keys.contains(&"ANTHROPIC_AUTH_TOKEN"));
        assert!(keys.contains(&"ANTHROPIC_DEFAULT_OPUS_MODEL"));

        // Claude runs against its native endpoint untouched
        assert!(Provider::Claude.env_bundle().is_empty());
    }

    #[test]
    fn test_spawn_caps() {
        assert_eq!(Provider::DeepSeek.spawn_cap(), 6);
        assert_eq!(Provider::spawn_cap_for("glm"), 4);
        assert_eq!(Provider::spawn_cap_for("auto"), 2);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Provider::DeepSeek).unwrap(),
            "\"deepseek\""
        );
        let p: Provider = serde_json::from_str("\"glm\"").unwrap();
        assert_eq!(p, Provider::Glm);
    }
}
