//! Task classification
//!
//! Maps a raw query (plus optional context) to a task category, a complexity
//! level and a confidence score. Classification never fails: queries that
//! match nothing land in [`TaskCategory::SimpleQuery`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::task::TaskContext;

/// Categories a query can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    /// Writing new code, scripts or shell commands
    CodeGeneration,
    /// Reviewing or validating existing work
    CodeReview,
    /// READMEs, explanations, doc comments
    Documentation,
    /// Routine error hunting
    Debugging,
    /// System and architecture design
    ArchitecturePlanning,
    /// Open-ended reasoning that needs the strongest backend
    ComplexReasoning,
    /// Catch-all
    SimpleQuery,
    /// Restructuring existing code
    Refactoring,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 8] = [
        Self::CodeGeneration,
        Self::CodeReview,
        Self::Documentation,
        Self::Debugging,
        Self::ArchitecturePlanning,
        Self::ComplexReasoning,
        Self::SimpleQuery,
        Self::Refactoring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "code_generation",
            Self::CodeReview => "code_review",
            Self::Documentation => "documentation",
            Self::Debugging => "debugging",
            Self::ArchitecturePlanning => "architecture_planning",
            Self::ComplexReasoning => "complex_reasoning",
            Self::SimpleQuery => "simple_query",
            Self::Refactoring => "refactoring",
        }
    }

    /// Minimum normalized quality score an output for this category must reach.
    ///
    /// Shared by routing (capability scoring) and validation (fallback checks).
    pub fn min_quality(&self) -> f64 {
        match self {
            Self::ArchitecturePlanning | Self::ComplexReasoning => 0.9,
            Self::CodeGeneration | Self::Debugging | Self::Refactoring => 0.8,
            Self::Documentation => 0.75,
            Self::CodeReview | Self::SimpleQuery => 0.7,
        }
    }

    /// Categories that a fast, cheap backend handles well
    pub fn suits_fast_backend(&self) -> bool {
        matches!(
            self,
            Self::CodeGeneration | Self::Documentation | Self::SimpleQuery | Self::Debugging
        )
    }

    /// Categories that need a high-capability backend regardless of complexity
    pub fn needs_high_capability(&self) -> bool {
        matches!(
            self,
            Self::ArchitecturePlanning | Self::ComplexReasoning | Self::CodeReview
        )
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown task category: {s}"))
    }
}

/// Complexity levels, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Simple = 1,
    Moderate = 2,
    Complex = 3,
    Critical = 4,
}

impl ComplexityLevel {
    /// Map a raw complexity score to a level
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=2 => Self::Simple,
            3..=4 => Self::Moderate,
            5..=7 => Self::Complex,
            _ => Self::Critical,
        }
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Minimum acceptable quality for a routed decision at this level
    pub fn quality_threshold(&self) -> f64 {
        match self {
            Self::Simple => 0.6,
            Self::Moderate => 0.7,
            Self::Complex => 0.8,
            Self::Critical => 0.9,
        }
    }
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Moderate => write!(f, "moderate"),
            Self::Complex => write!(f, "complex"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Result of classifying one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: TaskCategory,
    pub complexity: ComplexityLevel,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    pub prefers_fast_backend: bool,
    pub prefers_high_capability_backend: bool,
}

/// Anything that can classify a query.
///
/// The heuristic implementation below is the default; a learned model can be
/// dropped in without touching routing, validation or strategies.
pub trait Classifier: Send + Sync {
    fn classify(&self, query: &str, context: &TaskContext) -> ClassificationResult;
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("classifier pattern should compile"))
        .collect()
}

static CODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"def\s+\w+",
        r"class\s+\w+",
        r"import\s+\w+",
        r"function\s*\(",
        r"const\s+\w+",
        r"var\s+\w+",
        r"git\s+\w+",
        r"npm\s+\w+",
        r"pip\s+install",
    ])
});

static DOCUMENTATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"readme",
        r"documentation",
        r"docs?/",
        r"\.md$",
        r"explain",
        r"describe",
        r"document",
        r"comment",
    ])
});

static ARCHITECTURE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"architecture",
        r"design",
        r"system",
        r"structure",
        r"microservice",
        r"database",
        r"api",
        r"integration",
    ])
});

/// Keyword tiers and their weight per match
const COMPLEXITY_TIERS: [(&[&str], u32); 4] = [
    (&["fix", "format", "rename", "delete", "add"], 1),
    (&["refactor", "optimize", "implement", "create"], 2),
    (&["design", "architect", "analyze", "solve"], 3),
    (&["migrate", "security", "performance", "scale"], 4),
];

const ARCHITECTURE_BOOST_KEYWORDS: [&str; 4] =
    ["architecture", "microservice", "system", "distributed"];

const CODE_FILE_TYPES: [&str; 5] = [".py", ".js", ".ts", ".java", ".cpp"];

fn matches_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Regex and keyword classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    fn category(query: &str, context: &TaskContext) -> TaskCategory {
        if matches_any(&CODE_PATTERNS, query) {
            return TaskCategory::CodeGeneration;
        }
        if matches_any(&DOCUMENTATION_PATTERNS, query) {
            return TaskCategory::Documentation;
        }
        if matches_any(&ARCHITECTURE_PATTERNS, query) {
            return TaskCategory::ArchitecturePlanning;
        }

        let has_code_files = context
            .get("file_types")
            .and_then(|v| v.as_array())
            .is_some_and(|types| {
                types
                    .iter()
                    .filter_map(|t| t.as_str())
                    .any(|t| CODE_FILE_TYPES.contains(&t))
            });
        if has_code_files {
            return TaskCategory::CodeGeneration;
        }

        if contains_any(query, &["debug", "error", "fix", "bug"]) {
            TaskCategory::Debugging
        } else if contains_any(query, &["review", "check", "validate"]) {
            TaskCategory::CodeReview
        } else if contains_any(query, &["refactor", "improve", "optimize"]) {
            TaskCategory::Refactoring
        } else {
            TaskCategory::SimpleQuery
        }
    }

    fn complexity(query: &str, word_count: usize, context: &TaskContext) -> ComplexityLevel {
        let mut score: u32 = COMPLEXITY_TIERS
            .iter()
            .map(|(keywords, weight)| {
                keywords.iter().filter(|k| query.contains(*k)).count() as u32 * weight
            })
            .sum();

        if contains_any(query, &ARCHITECTURE_BOOST_KEYWORDS) {
            score += 2;
        }
        if word_count > 50 {
            score += 1;
        }
        if word_count > 100 {
            score += 1;
        }

        let file_count = context.get("file_count").and_then(as_count).unwrap_or(0.0);
        if file_count > 10.0 {
            score += 1;
        }
        if context.get("dependencies").is_some_and(is_truthy) {
            score += 1;
        }

        ComplexityLevel::from_score(score)
    }

    fn confidence(query: &str, word_count: usize) -> f64 {
        let mut confidence = 0.5;
        for family in [&*CODE_PATTERNS, &*DOCUMENTATION_PATTERNS, &*ARCHITECTURE_PATTERNS] {
            if matches_any(family, query) {
                confidence += 0.3;
            }
        }
        if word_count > 20 {
            confidence += 0.1;
        }
        if word_count > 50 {
            confidence += 0.1;
        }
        f64::min(confidence, 1.0)
    }

    fn reasoning(
        category: TaskCategory,
        complexity: ComplexityLevel,
        prefers_fast: bool,
        prefers_high: bool,
    ) -> String {
        let preference = if prefers_fast {
            "Fast backend preferred: routine task matching established patterns."
        } else if prefers_high {
            "High-capability backend preferred: complex reasoning or critical decision required."
        } else {
            "Mixed complexity: consider hybrid approach or quality validation."
        };
        format!("Task classified as {category} with {complexity} complexity. {preference}")
    }
}

/// Non-empty arrays, objects and strings, non-zero numbers and `true`.
/// Numeric context value, also accepted as a float or a numeric string
fn as_count(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

impl Classifier for HeuristicClassifier {
    fn classify(&self, query: &str, context: &TaskContext) -> ClassificationResult {
        let lowered = query.to_lowercase();
        let word_count = query.split_whitespace().count();

        let category = Self::category(&lowered, context);
        let complexity = Self::complexity(&lowered, word_count, context);

        let prefers_fast_backend =
            category.suits_fast_backend() && complexity <= ComplexityLevel::Moderate;
        let prefers_high_capability_backend =
            category.needs_high_capability() || complexity >= ComplexityLevel::Complex;

        ClassificationResult {
            category,
            complexity,
            confidence: Self::confidence(&lowered, word_count),
            reasoning: Self::reasoning(
                category,
                complexity,
                prefers_fast_backend,
                prefers_high_capability_backend,
            ),
            prefers_fast_backend,
            prefers_high_capability_backend,
        }
    }
}
