//! Orchestrator configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment:
//!
//! ```text
//! Variable                  | Field
//! --------------------------|---------------------
//! COORDINATOR_ENDPOINT_URL  | endpoint.url
//! COORDINATOR_API_KEY       | endpoint.api_key
//! COORDINATOR_TIMEOUT_SECS  | default_timeout_secs
//! COORDINATOR_LOG_CAPACITY  | log_capacity
//! ```
//!
//! Every section is optional; an empty file yields the four reference
//! backends with one agent each.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::HttpBackendConfig;
use crate::events::DEFAULT_LOG_CAPACITY;
use crate::orchestration::Agent;
use crate::registry::{BackendDescriptor, CapabilityRegistry, RegistryError, RoutingTable};
use crate::task::DEFAULT_TIMEOUT_SECS;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("agent {agent} is pinned to unknown backend {backend}")]
    UnknownAgentBackend { agent: String, backend: String },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub backends: Vec<BackendDescriptor>,
    /// Legacy routing table; derived from the backends when omitted
    pub routing: Option<RoutingTable>,
    /// Empty means one agent per backend
    pub agents: Vec<Agent>,
    pub endpoint: HttpBackendConfig,
    pub default_timeout_secs: u64,
    pub log_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            backends: BackendDescriptor::reference_set(),
            routing: None,
            agents: Vec::new(),
            endpoint: HttpBackendConfig::default(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    /// Read `path` if given, apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from `lookup` (the process environment in [`load`])
    ///
    /// [`load`]: Self::load
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(url) = lookup("COORDINATOR_ENDPOINT_URL").filter(|v| !v.is_empty()) {
            self.endpoint.url = url;
        }
        if let Some(key) = lookup("COORDINATOR_API_KEY").filter(|v| !v.is_empty()) {
            self.endpoint.api_key = Some(key);
        }
        if let Some(secs) = parse_env(&lookup, "COORDINATOR_TIMEOUT_SECS")? {
            self.default_timeout_secs = secs;
        }
        if let Some(capacity) = parse_env(&lookup, "COORDINATOR_LOG_CAPACITY")? {
            self.log_capacity = capacity;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let registry = self.registry()?;
        for agent in &self.agents {
            if let Some(backend) = &agent.backend {
                if !registry.contains(backend) {
                    return Err(ConfigError::UnknownAgentBackend {
                        agent: agent.name.clone(),
                        backend: backend.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Effective legacy table: explicit, the reference table for the
    /// reference backends, or derived from the backend tiers
    pub fn routing_table(&self) -> Option<RoutingTable> {
        match &self.routing {
            Some(routing) => Some(routing.clone()),
            None if self.backends == BackendDescriptor::reference_set() => {
                Some(RoutingTable::default())
            }
            None => RoutingTable::derive(&self.backends),
        }
    }

    pub fn registry(&self) -> ConfigResult<CapabilityRegistry> {
        let routing = self.routing_table().ok_or(RegistryError::Empty)?;
        Ok(CapabilityRegistry::new(self.backends.clone(), routing)?)
    }

    /// Configured agents, or one pinned agent per backend
    pub fn roster(&self, registry: &CapabilityRegistry) -> Vec<Agent> {
        if self.agents.is_empty() {
            Agent::roster(registry)
        } else {
            self.agents.clone()
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> ConfigResult<Option<T>> {
    match lookup(var).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CLAUDE_SONNET, MISTRAL_7B};
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = OrchestratorConfig::default();
        config.validate().unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(config.roster(&registry).len(), 4);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = OrchestratorConfig::from_toml("").unwrap();
        assert_eq!(config.backends.len(), 4);
        assert_eq!(config.routing_table(), Some(RoutingTable::default()));
        assert_eq!(config.default_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_custom_backends_get_derived_routing() {
        let config = OrchestratorConfig::from_toml(
            r#"
default_timeout_secs = 30

[[backends]]
id = "small"
tier = "fast"
baseline_latency = 2.0
baseline_quality = 0.7

[[backends]]
id = "large"
tier = "high_capability"
baseline_latency = 12.0
baseline_quality = 0.92

[[agents]]
name = "writer"
backend = "large"

[endpoint]
url = "http://127.0.0.1:8000/v1/chat/completions"
"#,
        )
        .unwrap();
        config.validate().unwrap();
        let routing = config.routing_table().unwrap();
        assert_eq!(routing.fast, "small");
        assert_eq!(routing.high_capability, "large");
        assert_eq!(config.default_timeout_secs, 30);
        assert_eq!(config.endpoint.url, "http://127.0.0.1:8000/v1/chat/completions");

        let registry = config.registry().unwrap();
        let roster = config.roster(&registry);
        assert_eq!(roster, vec![Agent::pinned("writer", "large")]);
    }

    #[test]
    fn test_unknown_agent_backend_is_rejected() {
        let mut config = OrchestratorConfig::default();
        config.agents = vec![Agent::pinned("x", "gpt-nope")];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownAgentBackend { backend, .. }) if backend == "gpt-nope"
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("COORDINATOR_ENDPOINT_URL", "http://gateway:4000/v1/chat/completions"),
            ("COORDINATOR_API_KEY", "secret"),
            ("COORDINATOR_TIMEOUT_SECS", "45"),
        ]
        .into_iter()
        .collect();
        let mut config = OrchestratorConfig::default();
        config
            .apply_overrides(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.endpoint.url, "http://gateway:4000/v1/chat/completions");
        assert_eq!(config.endpoint.api_key.as_deref(), Some("secret"));
        assert_eq!(config.default_timeout_secs, 45);
        assert_eq!(config.log_capacity, DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = OrchestratorConfig::default();
        let err = config
            .apply_overrides(|var| (var == "COORDINATOR_LOG_CAPACITY").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("COORDINATOR_LOG_CAPACITY"));
    }

    #[test]
    fn test_reference_routing_points_at_known_backends() {
        let routing = RoutingTable::default();
        assert_eq!(routing.documentation, MISTRAL_7B);
        assert_eq!(routing.default_fallback, CLAUDE_SONNET);
    }
}
