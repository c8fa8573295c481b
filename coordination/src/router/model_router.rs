//! Quality-aware model routing
//!
//! Combines classifier output, the per-category minimum quality table and
//! capability scoring over the registry to pick a primary backend and an
//! adaptive fallback. Routing is a pure function of its inputs: the same
//! query, context and preference always yield the same decision.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::{BackendDescriptor, BackendTier, SharedCapabilityRegistry};
use crate::task::TaskContext;

use super::task_classifier::{
    ClassificationResult, Classifier, ComplexityLevel, HeuristicClassifier, TaskCategory,
};

/// Best capability below this means no candidate clears the bar with margin
pub const MIN_CAPABILITY_MARGIN: f64 = 0.3;

/// Minimum quality at or above which the fallback is chosen by capability
pub const ADAPTIVE_FALLBACK_THRESHOLD: f64 = 0.85;

/// Quality threshold recorded for explicit-preference decisions
pub const PREFERENCE_QUALITY_THRESHOLD: f64 = 0.7;

/// Sentinel accepted in place of a backend id to request automatic routing
pub const AUTO_BACKEND: &str = "auto";

/// Outcome of routing one (sub)task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub selected_backend: String,
    pub fallback_backend: Option<String>,
    pub reasoning: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Baseline latency of the selected backend, in seconds
    pub estimated_latency: f64,
    /// Normalized quality the output should reach
    pub quality_threshold: f64,
}

/// Capability of a backend to meet a minimum quality, in [0, 1]
pub fn capability_score(backend: &BackendDescriptor, min_required: f64) -> f64 {
    ((backend.baseline_quality - min_required) * 2.0).clamp(0.0, 1.0)
}

/// Routes queries to backends
pub struct ModelRouter {
    registry: SharedCapabilityRegistry,
    classifier: Arc<dyn Classifier>,
}

impl ModelRouter {
    /// Create a router using the heuristic classifier
    pub fn new(registry: SharedCapabilityRegistry) -> Self {
        Self {
            registry,
            classifier: Arc::new(HeuristicClassifier::new()),
        }
    }

    /// Swap in a different classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn registry(&self) -> &SharedCapabilityRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    /// Pick a backend for `query`.
    ///
    /// An explicit `preferred_backend` (anything other than `"auto"`) short
    /// circuits classification and is always honored.
    pub fn route_task(
        &self,
        query: &str,
        context: &TaskContext,
        preferred_backend: Option<&str>,
    ) -> RoutingDecision {
        if let Some(preferred) = preferred_backend.filter(|p| *p != AUTO_BACKEND) {
            return self.preference_decision(preferred);
        }

        let classification = self.classifier.classify(query, context);
        let min_required = classification.category.min_quality();
        let candidates = self.candidates(&classification);

        let best = candidates
            .iter()
            .map(|b| (*b, capability_score(b, min_required)))
            .fold(None, |best: Option<(&BackendDescriptor, f64)>, (b, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((b, score)),
            });

        let (selected, path) = match best {
            Some((backend, score)) if score >= MIN_CAPABILITY_MARGIN => (
                backend.id.clone(),
                format!("quality-aware capability {score:.2}"),
            ),
            best => {
                let legacy = self.legacy_choice(&classification);
                debug!(
                    category = %classification.category,
                    best_capability = best.map(|(_, s)| s).unwrap_or(0.0),
                    selected = %legacy,
                    "No candidate cleared capability margin, using legacy routing"
                );
                (legacy, "legacy routing".to_string())
            }
        };

        let fallback = self.fallback_for(&selected, min_required);
        let estimated_latency = self
            .registry
            .get(&selected)
            .map(|b| b.baseline_latency)
            .unwrap_or(0.0);

        RoutingDecision {
            reasoning: format!(
                "Task: {} | Complexity: {} | Selected: {} | {} | {}",
                classification.category,
                classification.complexity,
                selected,
                path,
                classification.reasoning
            ),
            selected_backend: selected,
            fallback_backend: fallback,
            confidence: classification.confidence,
            estimated_latency,
            quality_threshold: classification.complexity.quality_threshold(),
        }
    }

    fn preference_decision(&self, preferred: &str) -> RoutingDecision {
        let fallback = self.registry.static_fallback(preferred);
        RoutingDecision {
            selected_backend: preferred.to_string(),
            fallback_backend: (fallback != preferred).then(|| fallback.to_string()),
            reasoning: format!("explicit preference: {preferred}"),
            confidence: 1.0,
            estimated_latency: self
                .registry
                .get(preferred)
                .map(|b| b.baseline_latency)
                .unwrap_or(0.0),
            quality_threshold: PREFERENCE_QUALITY_THRESHOLD,
        }
    }

    /// Candidate set from classification flags, in registry order
    fn candidates(&self, classification: &ClassificationResult) -> Vec<&BackendDescriptor> {
        let category = classification.category;
        let fast = || self.registry.tier_candidates(BackendTier::Fast, category);
        let strong = || self.registry.tier_candidates(BackendTier::HighCapability, category);

        let candidates = if classification.complexity >= ComplexityLevel::Complex {
            let mut union = fast();
            union.extend(strong());
            union
        } else if classification.prefers_fast_backend {
            fast()
        } else if classification.prefers_high_capability_backend {
            strong()
        } else {
            self.registry.default_candidates()
        };

        if candidates.is_empty() {
            self.registry.default_candidates()
        } else {
            candidates
        }
    }

    fn legacy_choice(&self, classification: &ClassificationResult) -> String {
        let table = self.registry.routing();
        let id = if classification.prefers_fast_backend {
            match classification.category {
                TaskCategory::CodeGeneration | TaskCategory::Refactoring => &table.code,
                TaskCategory::Documentation => &table.documentation,
                _ => &table.fast,
            }
        } else if classification.prefers_high_capability_backend
            || classification.complexity >= ComplexityLevel::Complex
        {
            &table.high_capability
        } else {
            &table.fast
        };
        id.clone()
    }

    fn fallback_for(&self, selected: &str, min_required: f64) -> Option<String> {
        if min_required >= ADAPTIVE_FALLBACK_THRESHOLD {
            if let Some(strongest) = self.registry.strongest_excluding(selected) {
                return Some(strongest.id.clone());
            }
        }
        let fallback = self.registry.static_fallback(selected);
        (fallback != selected).then(|| fallback.to_string())
    }
}
