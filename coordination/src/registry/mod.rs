//! Capability registry: backend baselines and routing tables
//!
//! Static table of known backends with baseline latency/quality and
//! task-category affinities, plus the legacy routing table used when no
//! candidate clears the quality bar. Loaded once at startup and shared
//! read-only (via [`SharedCapabilityRegistry`]) across concurrent routing
//! decisions.
//!
//! # Reference backends
//!
//! ```text
//! Backend                      | Tier            | Latency (s) | Quality
//! -----------------------------|-----------------|-------------|--------
//! mistral:7b-instruct          | fast            | 24.97       | 0.75
//! codellama:7b                 | fast            | 30.00       | 0.80
//! llama3.1:70b-instruct        | high_capability | 45.00       | 0.85
//! claude-3-5-sonnet-20241022   | high_capability |  8.94       | 0.95
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::router::TaskCategory;

pub const MISTRAL_7B: &str = "mistral:7b-instruct";
pub const CODELLAMA_7B: &str = "codellama:7b";
pub const LLAMA31_70B: &str = "llama3.1:70b-instruct";
pub const CLAUDE_SONNET: &str = "claude-3-5-sonnet-20241022";

/// Errors raised while assembling a registry
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("registry must contain at least one backend")]
    Empty,

    #[error("duplicate backend id: {0}")]
    DuplicateBackend(String),

    #[error("{field} references unknown backend: {id}")]
    UnknownBackend { field: String, id: String },

    #[error("backend {id} has baseline quality {value} outside [0, 1]")]
    InvalidQuality { id: String, value: f64 },

    #[error("backend {id} has negative baseline latency {value}")]
    InvalidLatency { id: String, value: f64 },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Shared reference to a CapabilityRegistry
pub type SharedCapabilityRegistry = Arc<CapabilityRegistry>;

/// Backend tier used to build candidate sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTier {
    /// Cheap, quick, good at routine work
    Fast,
    /// Slower or costlier, strongest reasoning
    HighCapability,
}

impl std::fmt::Display for BackendTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::HighCapability => write!(f, "high_capability"),
        }
    }
}

/// Static description of one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub id: String,
    pub tier: BackendTier,
    /// Expected seconds per request
    pub baseline_latency: f64,
    /// Expected normalized output quality in [0, 1]
    pub baseline_quality: f64,
    /// Categories this backend is suited to; empty means any
    #[serde(default)]
    pub supported_categories: Vec<TaskCategory>,
    /// Static pairwise fallback
    #[serde(default)]
    pub fallback: Option<String>,
}

impl BackendDescriptor {
    pub fn new(
        id: impl Into<String>,
        tier: BackendTier,
        baseline_latency: f64,
        baseline_quality: f64,
    ) -> Self {
        Self {
            id: id.into(),
            tier,
            baseline_latency,
            baseline_quality,
            supported_categories: Vec::new(),
            fallback: None,
        }
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = TaskCategory>) -> Self {
        self.supported_categories = categories.into_iter().collect();
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn supports(&self, category: TaskCategory) -> bool {
        self.supported_categories.is_empty() || self.supported_categories.contains(&category)
    }

    /// The four reference backends with their measured baselines
    pub fn reference_set() -> Vec<Self> {
        vec![
            Self::new(MISTRAL_7B, BackendTier::Fast, 24.97, 0.75)
                .with_categories([
                    TaskCategory::Documentation,
                    TaskCategory::SimpleQuery,
                    TaskCategory::Debugging,
                    TaskCategory::CodeGeneration,
                ])
                .with_fallback(CLAUDE_SONNET),
            Self::new(CODELLAMA_7B, BackendTier::Fast, 30.0, 0.80)
                .with_categories([
                    TaskCategory::CodeGeneration,
                    TaskCategory::Refactoring,
                    TaskCategory::Debugging,
                ])
                .with_fallback(MISTRAL_7B),
            Self::new(LLAMA31_70B, BackendTier::HighCapability, 45.0, 0.85)
                .with_fallback(MISTRAL_7B),
            Self::new(CLAUDE_SONNET, BackendTier::HighCapability, 8.94, 0.95)
                .with_fallback(MISTRAL_7B),
        ]
    }
}

/// Category-keyed lookup used when quality-aware routing has no good pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    /// Fast pick for code generation and refactoring
    pub code: String,
    /// Fast pick for documentation
    pub documentation: String,
    /// Fast pick for everything else
    pub fast: String,
    /// Pick when the task needs high capability
    pub high_capability: String,
    /// Candidates scored when the classifier expresses no preference
    pub default_candidates: Vec<String>,
    /// Fallback for backends with no static pairing
    pub default_fallback: String,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            code: CODELLAMA_7B.to_string(),
            documentation: MISTRAL_7B.to_string(),
            fast: MISTRAL_7B.to_string(),
            high_capability: CLAUDE_SONNET.to_string(),
            default_candidates: vec![MISTRAL_7B.to_string(), CLAUDE_SONNET.to_string()],
            default_fallback: CLAUDE_SONNET.to_string(),
        }
    }
}

impl RoutingTable {
    /// Derive a table from an arbitrary backend list: the first fast-tier
    /// backend (or the first backend) covers routine work, the highest
    /// baseline quality covers everything else.
    pub fn derive(backends: &[BackendDescriptor]) -> Option<Self> {
        let first = backends.first()?;
        let fast = backends
            .iter()
            .find(|b| b.tier == BackendTier::Fast)
            .unwrap_or(first);
        let strongest = backends
            .iter()
            .fold(first, |best, b| if b.baseline_quality > best.baseline_quality { b } else { best });

        let mut default_candidates = vec![fast.id.clone()];
        if strongest.id != fast.id {
            default_candidates.push(strongest.id.clone());
        }

        Some(Self {
            code: fast.id.clone(),
            documentation: fast.id.clone(),
            fast: fast.id.clone(),
            high_capability: strongest.id.clone(),
            default_candidates,
            default_fallback: strongest.id.clone(),
        })
    }

    fn references(&self) -> Vec<(&'static str, &str)> {
        let mut refs = vec![
            ("routing.code", self.code.as_str()),
            ("routing.documentation", self.documentation.as_str()),
            ("routing.fast", self.fast.as_str()),
            ("routing.high_capability", self.high_capability.as_str()),
            ("routing.default_fallback", self.default_fallback.as_str()),
        ];
        refs.extend(
            self.default_candidates
                .iter()
                .map(|id| ("routing.default_candidates", id.as_str())),
        );
        refs
    }
}

/// Ordered, validated backend table
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    backends: Vec<BackendDescriptor>,
    routing: RoutingTable,
}

impl CapabilityRegistry {
    /// Build a registry, validating ids, baselines and table references
    pub fn new(backends: Vec<BackendDescriptor>, routing: RoutingTable) -> RegistryResult<Self> {
        if backends.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for backend in &backends {
            if !seen.insert(backend.id.as_str()) {
                return Err(RegistryError::DuplicateBackend(backend.id.clone()));
            }
            if !(0.0..=1.0).contains(&backend.baseline_quality) {
                return Err(RegistryError::InvalidQuality {
                    id: backend.id.clone(),
                    value: backend.baseline_quality,
                });
            }
            if backend.baseline_latency < 0.0 {
                return Err(RegistryError::InvalidLatency {
                    id: backend.id.clone(),
                    value: backend.baseline_latency,
                });
            }
        }

        for backend in &backends {
            if let Some(fallback) = &backend.fallback {
                if !seen.contains(fallback.as_str()) {
                    return Err(RegistryError::UnknownBackend {
                        field: format!("{}.fallback", backend.id),
                        id: fallback.clone(),
                    });
                }
            }
        }
        for (field, id) in routing.references() {
            if !seen.contains(id) {
                return Err(RegistryError::UnknownBackend {
                    field: field.to_string(),
                    id: id.to_string(),
                });
            }
        }

        Ok(Self { backends, routing })
    }

    /// Build a registry whose routing table is derived from the backends
    pub fn from_backends(backends: Vec<BackendDescriptor>) -> RegistryResult<Self> {
        let routing = RoutingTable::derive(&backends).ok_or(RegistryError::Empty)?;
        Self::new(backends, routing)
    }

    /// Wrap in an Arc for sharing across routers and strategies
    pub fn shared(self) -> SharedCapabilityRegistry {
        Arc::new(self)
    }

    pub fn get(&self, id: &str) -> Option<&BackendDescriptor> {
        self.backends.iter().find(|b| b.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// All backends, in registration order
    pub fn backends(&self) -> &[BackendDescriptor] {
        &self.backends
    }

    pub fn ids(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Backends of a tier that suit the category. If none of the tier's
    /// backends declare the category, the whole tier is returned.
    pub fn tier_candidates(&self, tier: BackendTier, category: TaskCategory) -> Vec<&BackendDescriptor> {
        let tier_members: Vec<&BackendDescriptor> =
            self.backends.iter().filter(|b| b.tier == tier).collect();
        let suited: Vec<&BackendDescriptor> = tier_members
            .iter()
            .copied()
            .filter(|b| b.supports(category))
            .collect();
        if suited.is_empty() {
            tier_members
        } else {
            suited
        }
    }

    /// The default two-backend candidate set
    pub fn default_candidates(&self) -> Vec<&BackendDescriptor> {
        self.routing
            .default_candidates
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Static pairwise fallback for a backend
    pub fn static_fallback(&self, id: &str) -> &str {
        self.get(id)
            .and_then(|b| b.fallback.as_deref())
            .unwrap_or(self.routing.default_fallback.as_str())
    }

    /// Highest baseline quality backend other than `exclude`
    pub fn strongest_excluding(&self, exclude: &str) -> Option<&BackendDescriptor> {
        self.backends
            .iter()
            .filter(|b| b.id != exclude)
            .fold(None, |best: Option<&BackendDescriptor>, b| match best {
                Some(current) if current.baseline_quality >= b.baseline_quality => Some(current),
                _ => Some(b),
            })
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self {
            backends: BackendDescriptor::reference_set(),
            routing: RoutingTable::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_registry_is_valid() {
        let registry = CapabilityRegistry::new(
            BackendDescriptor::reference_set(),
            RoutingTable::default(),
        )
        .unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.get(CLAUDE_SONNET).unwrap().baseline_quality, 0.95);
        assert_eq!(registry.get(MISTRAL_7B).unwrap().baseline_latency, 24.97);
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert_eq!(
            CapabilityRegistry::from_backends(Vec::new()).unwrap_err(),
            RegistryError::Empty
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let backends = vec![
            BackendDescriptor::new("a", BackendTier::Fast, 1.0, 0.5),
            BackendDescriptor::new("a", BackendTier::Fast, 1.0, 0.5),
        ];
        assert_eq!(
            CapabilityRegistry::from_backends(backends).unwrap_err(),
            RegistryError::DuplicateBackend("a".into())
        );
    }

    #[test]
    fn test_unknown_fallback_rejected() {
        let backends =
            vec![BackendDescriptor::new("a", BackendTier::Fast, 1.0, 0.5).with_fallback("ghost")];
        assert!(matches!(
            CapabilityRegistry::from_backends(backends),
            Err(RegistryError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn test_quality_out_of_range_rejected() {
        let backends = vec![BackendDescriptor::new("a", BackendTier::Fast, 1.0, 1.5)];
        assert!(matches!(
            CapabilityRegistry::from_backends(backends),
            Err(RegistryError::InvalidQuality { .. })
        ));
    }

    #[test]
    fn test_tier_candidates_filter_by_category() {
        let registry = CapabilityRegistry::default();
        let ids: Vec<&str> = registry
            .tier_candidates(BackendTier::Fast, TaskCategory::Refactoring)
            .iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(ids, vec![CODELLAMA_7B]);

        // Nobody in the fast tier declares architecture: whole tier
        let ids: Vec<&str> = registry
            .tier_candidates(BackendTier::Fast, TaskCategory::ArchitecturePlanning)
            .iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(ids, vec![MISTRAL_7B, CODELLAMA_7B]);
    }

    #[test]
    fn test_static_fallbacks() {
        let registry = CapabilityRegistry::default();
        assert_eq!(registry.static_fallback(MISTRAL_7B), CLAUDE_SONNET);
        assert_eq!(registry.static_fallback(CODELLAMA_7B), MISTRAL_7B);
        assert_eq!(registry.static_fallback(CLAUDE_SONNET), MISTRAL_7B);
        assert_eq!(registry.static_fallback("unknown"), CLAUDE_SONNET);
    }

    #[test]
    fn test_strongest_excluding() {
        let registry = CapabilityRegistry::default();
        assert_eq!(registry.strongest_excluding(MISTRAL_7B).unwrap().id, CLAUDE_SONNET);
        assert_eq!(registry.strongest_excluding(CLAUDE_SONNET).unwrap().id, LLAMA31_70B);
    }

    #[test]
    fn test_derived_routing_table() {
        let backends = vec![
            BackendDescriptor::new("slow", BackendTier::HighCapability, 9.0, 0.9),
            BackendDescriptor::new("quick", BackendTier::Fast, 1.0, 0.6),
        ];
        let registry = CapabilityRegistry::from_backends(backends).unwrap();
        assert_eq!(registry.routing().fast, "quick");
        assert_eq!(registry.routing().high_capability, "slow");
        assert_eq!(registry.routing().default_candidates, vec!["quick", "slow"]);
    }
}
