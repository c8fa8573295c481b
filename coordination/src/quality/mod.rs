//! Output quality: validation of individual results and the feedback loop
//! that aggregates them per backend.

pub mod intelligence;
pub mod validator;

pub use intelligence::{
    ExecutionSample, IntelligenceSummary, PerformanceReport, QualityIntelligence,
    RoutingRecommendation, SharedQualityIntelligence, ThresholdAdjustment, Trend,
};
pub use validator::{
    response_quality, CodeLanguage, QualityRequirements, QualityResult, QualityScore,
    QualityValidator, TextKind,
};
