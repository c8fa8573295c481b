//! Routing and validation properties that must hold for any input.

use std::sync::Arc;

use agent_coordination::{
    CapabilityRegistry, Classifier, HeuristicClassifier, ModelRouter, QualityScore,
    QualityValidator, TaskCategory, TaskContext,
};
use serde_json::json;

const QUERIES: &[&str] = &[
    "",
    "   ",
    "hi",
    "What is the capital of France?",
    "Write a Python function to merge two sorted lists",
    "Debug this segfault in my allocator, it crashes on free",
    "Refactor the payment module to remove duplicated validation",
    "Design a distributed architecture for a multi-region event store",
    "Explain step by step why the proof of the halting problem works and analyze its implications",
    "Write documentation for the REST API endpoints",
    "critical production outage: database replication is broken across all regions, need a comprehensive plan",
    "日本語の質問です",
    "fn main() { println!(\"hello\"); }",
];

fn router() -> ModelRouter {
    ModelRouter::new(CapabilityRegistry::default().shared())
}

// ── Classification ──────────────────────────────────────────────────

#[test]
fn test_classification_is_total() {
    let classifier = HeuristicClassifier::new();
    let mut context = TaskContext::new();
    context.insert("language".into(), json!("rust"));

    for query in QUERIES {
        for ctx in [TaskContext::new(), context.clone()] {
            let result = classifier.classify(query, &ctx);
            assert!(TaskCategory::ALL.contains(&result.category), "query {query:?}");
            assert!(
                (0.0..=1.0).contains(&result.confidence),
                "confidence {} for {query:?}",
                result.confidence
            );
            assert!((1..=4).contains(&result.complexity.value()));
            assert!(!result.reasoning.is_empty());
        }
    }
}

#[test]
fn test_classification_is_deterministic() {
    let classifier = HeuristicClassifier::new();
    for query in QUERIES {
        assert_eq!(
            classifier.classify(query, &TaskContext::new()),
            classifier.classify(query, &TaskContext::new())
        );
    }
}

// ── Routing ─────────────────────────────────────────────────────────

#[test]
fn test_preference_always_wins() {
    let router = router();
    for query in QUERIES {
        for preferred in ["codellama:7b", "claude-3-5-sonnet-20241022", "not-registered"] {
            let decision = router.route_task(query, &TaskContext::new(), Some(preferred));
            assert_eq!(decision.selected_backend, preferred);
            assert_eq!(decision.confidence, 1.0);
        }
    }
}

#[test]
fn test_auto_preference_is_ignored() {
    let router = router();
    let query = "Design a distributed architecture for a multi-region event store";
    assert_eq!(
        router.route_task(query, &TaskContext::new(), Some("auto")),
        router.route_task(query, &TaskContext::new(), None)
    );
}

#[test]
fn test_routing_is_idempotent() {
    let router = router();
    for query in QUERIES {
        let first = router.route_task(query, &TaskContext::new(), None);
        let second = router.route_task(query, &TaskContext::new(), None);
        assert_eq!(first, second, "query {query:?}");
    }
}

#[test]
fn test_routing_selects_registered_backends() {
    let registry = CapabilityRegistry::default().shared();
    let router = ModelRouter::new(Arc::clone(&registry));
    for query in QUERIES {
        let decision = router.route_task(query, &TaskContext::new(), None);
        assert!(registry.contains(&decision.selected_backend), "query {query:?}");
        if let Some(fallback) = &decision.fallback_backend {
            assert_ne!(fallback, &decision.selected_backend);
            assert!(registry.contains(fallback));
        }
        assert!((0.0..=1.0).contains(&decision.confidence));
        assert!([0.6, 0.7, 0.8, 0.9].contains(&decision.quality_threshold));
    }
}

// ── Validation ──────────────────────────────────────────────────────

#[test]
fn test_empty_code_fails() {
    let validator = QualityValidator::new();
    for language in ["python", "rust", "go", "typescript", "javascript", "cobol"] {
        for code in ["", "  \n\t "] {
            let result = validator.validate_code(code, language);
            assert_eq!(result.score, QualityScore::Failed);
            assert!(result.needs_fallback);
        }
    }
}

#[test]
fn test_invalid_python_fails_confidently() {
    let result = QualityValidator::new().validate_code("def f(:\n  return", "python");
    assert_eq!(result.score, QualityScore::Failed);
    assert!(result.confidence >= 0.9);
    assert!(result.needs_fallback);
}

#[test]
fn test_normalized_scores_stay_in_range() {
    let validator = QualityValidator::new();
    for text in QUERIES {
        let code = validator.validate_code(text, "python");
        let normalized = code.score.normalized();
        assert!((0.0..=1.0).contains(&normalized));
        assert!((0.0..=1.0).contains(&code.confidence));
    }
}
