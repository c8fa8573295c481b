//! Router Module
//!
//! Decides which backend handles a request and how confidently:
//! - Heuristic task classification (category, complexity, confidence)
//! - Quality-aware candidate scoring against the capability registry
//! - Legacy table fallback when no candidate clears the bar
//!
//! # Selection Strategy
//!
//! ```text
//! Classification             | Candidate set            | Fallback
//! ---------------------------|--------------------------|-------------------------
//! complexity >= complex      | fast ∪ high_capability   | strongest other if min >= 0.85
//! prefers fast backend       | fast tier                | static pairwise table
//! prefers high capability    | high_capability tier     | static pairwise table
//! neither                    | default pair             | static pairwise table
//! ```

pub mod model_router;
pub mod task_classifier;

pub use model_router::{capability_score, ModelRouter, RoutingDecision, AUTO_BACKEND};
pub use task_classifier::{
    ClassificationResult, Classifier, ComplexityLevel, HeuristicClassifier, TaskCategory,
};
