//! Output validation
//!
//! Scores generated code and prose on a 1-5 scale and flags whether the
//! output warrants routing the next attempt to a different backend.
//!
//! Code in python, rust, go, typescript and tsx is parsed with tree-sitter;
//! any other language gets a bracket/paren-balance heuristic with lower
//! confidence.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tree_sitter::{Language, Node, Parser};

use crate::registry::BackendDescriptor;
use crate::router::{capability_score, TaskCategory};

/// Discrete quality grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum QualityScore {
    Failed = 1,
    Poor = 2,
    Acceptable = 3,
    Good = 4,
    Excellent = 5,
}

impl QualityScore {
    /// Round (ties to even) and clamp a raw score into the grade range
    pub fn from_raw(raw: f64) -> Self {
        match raw.round_ties_even().clamp(1.0, 5.0) as u8 {
            1 => Self::Failed,
            2 => Self::Poor,
            3 => Self::Acceptable,
            4 => Self::Good,
            _ => Self::Excellent,
        }
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Grade mapped onto [0.2, 1.0]
    pub fn normalized(&self) -> f64 {
        f64::from(self.value()) / 5.0
    }
}

impl From<QualityScore> for u8 {
    fn from(score: QualityScore) -> Self {
        score.value()
    }
}

impl TryFrom<u8> for QualityScore {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Failed),
            2 => Ok(Self::Poor),
            3 => Ok(Self::Acceptable),
            4 => Ok(Self::Good),
            5 => Ok(Self::Excellent),
            other => Err(format!("quality score out of range: {other}")),
        }
    }
}

impl std::fmt::Display for QualityScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed => write!(f, "failed"),
            Self::Poor => write!(f, "poor"),
            Self::Acceptable => write!(f, "acceptable"),
            Self::Good => write!(f, "good"),
            Self::Excellent => write!(f, "excellent"),
        }
    }
}

/// Outcome of validating one output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityResult {
    pub score: QualityScore,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub issues: Vec<String>,
    pub reasoning: String,
    pub metrics: BTreeMap<String, Value>,
    pub needs_fallback: bool,
}

impl QualityResult {
    fn empty(kind: &str) -> Self {
        Self {
            score: QualityScore::Failed,
            confidence: 1.0,
            issues: vec![format!("Empty {kind} output")],
            reasoning: format!("No {kind} provided"),
            metrics: BTreeMap::new(),
            needs_fallback: true,
        }
    }
}

/// What kind of prose is expected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    #[default]
    General,
    Documentation,
    Explanation,
}

impl std::str::FromStr for TextKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "general" | "text" => Ok(Self::General),
            "documentation" | "docs" => Ok(Self::Documentation),
            "explanation" => Ok(Self::Explanation),
            other => Err(format!("unknown text kind: {other}")),
        }
    }
}

/// Languages the validator knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeLanguage {
    Python,
    Rust,
    Go,
    TypeScript,
    Tsx,
    JavaScript,
    Other,
}

impl CodeLanguage {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Self::Python,
            "rust" | "rs" => Self::Rust,
            "go" | "golang" => Self::Go,
            "typescript" | "ts" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "javascript" | "js" => Self::JavaScript,
            _ => Self::Other,
        }
    }

    fn grammar(&self) -> Option<Language> {
        match self {
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Self::JavaScript | Self::Other => None,
        }
    }

    fn has_docs(&self, code: &str) -> bool {
        match self {
            Self::Python => PYTHON_DOCSTRING.is_match(code),
            Self::Rust => RUST_DOC_COMMENT.is_match(code),
            Self::Go => GO_DOC_COMMENT.is_match(code),
            Self::TypeScript | Self::Tsx | Self::JavaScript | Self::Other => {
                JSDOC_COMMENT.is_match(code)
            }
        }
    }
}

impl std::fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Rust => write!(f, "rust"),
            Self::Go => write!(f, "go"),
            Self::TypeScript => write!(f, "typescript"),
            Self::Tsx => write!(f, "tsx"),
            Self::JavaScript => write!(f, "javascript"),
            Self::Other => write!(f, "generic"),
        }
    }
}

static PYTHON_DOCSTRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)""".*?"""|'''.*?'''"#).expect("PYTHON_DOCSTRING regex should compile")
});
static RUST_DOC_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(///|//!|/\*\*)").expect("RUST_DOC_COMMENT regex should compile")
});
static GO_DOC_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*//.*\n\s*(func|type)\s").expect("GO_DOC_COMMENT regex should compile")
});
static JSDOC_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*\*").expect("JSDOC_COMMENT regex should compile"));
static JS_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"function\s+\w+|=>\s*\{|\w+\s*=\s*function")
        .expect("JS_FUNCTION regex should compile")
});

static COHERENCE_FAMILIES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(therefore|thus|hence|consequently)\b",
        r"\b(however|but|although|despite)\b",
        r"\b(first|second|next|finally)\b",
        r"\b(because|since|due to)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("coherence regex should compile"))
    .collect()
});
static COMPLETENESS_FAMILIES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(summary|conclusion|result)\b",
        r"\b(example|instance|for instance)\b",
        r"\b(implementation|solution|approach)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("completeness regex should compile"))
    .collect()
});
static TEXT_STRUCTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n\-\*\d\.]").expect("TEXT_STRUCTURE regex should compile"));
static COMPLETENESS_STRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\n\-\*\d\.:]").expect("COMPLETENESS_STRUCTURE regex should compile")
});
static DOCUMENTATION_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(usage|example|api|parameter|return)\b")
        .expect("DOCUMENTATION_VOCABULARY regex should compile")
});
static EXPLANATION_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(because|reason|why|how|what)\b")
        .expect("EXPLANATION_VOCABULARY regex should compile")
});

const FUNCTION_KINDS: &[&str] = &[
    "function_definition",
    "function_item",
    "function_declaration",
    "method_declaration",
    "method_definition",
    "arrow_function",
];

const TYPE_KINDS: &[&str] = &[
    "class_definition",
    "class_declaration",
    "interface_declaration",
    "struct_item",
    "enum_item",
    "trait_item",
    "type_declaration",
];

/// Counts gathered from one walk over a syntax tree
#[derive(Debug, Default)]
struct SyntaxStats {
    comments: usize,
    functions: usize,
    types: usize,
    first_error_line: Option<usize>,
}

impl SyntaxStats {
    fn collect(root: Node) -> Self {
        let mut stats = Self::default();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let kind = node.kind();
            if kind.contains("comment") {
                stats.comments += 1;
            } else if FUNCTION_KINDS.contains(&kind) {
                stats.functions += 1;
            } else if TYPE_KINDS.contains(&kind) {
                stats.types += 1;
            }
            if node.is_error() || node.is_missing() {
                let line = node.start_position().row + 1;
                stats.first_error_line = Some(stats.first_error_line.map_or(line, |l| l.min(line)));
            }
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }
        stats
    }
}

fn lines_of_code(code: &str) -> usize {
    code.lines().filter(|l| !l.trim().is_empty()).count()
}

fn with_issues(mut reasoning: String, issues: &[String]) -> String {
    if !issues.is_empty() {
        let shown: Vec<&str> = issues.iter().take(2).map(String::as_str).collect();
        reasoning.push_str(&format!(", Issues: {}", shown.join(", ")));
    }
    reasoning
}

/// Quality thresholds predicted for a category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityRequirements {
    pub min_score: f64,
    pub relevancy_priority: f64,
    pub coherence_priority: f64,
}

/// Stateless output validator
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityValidator;

impl QualityValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate generated code in the named language
    pub fn validate_code(&self, code: &str, language: &str) -> QualityResult {
        if code.trim().is_empty() {
            return QualityResult::empty("code");
        }
        let language = CodeLanguage::from_name(language);
        match language.grammar() {
            Some(grammar) => self.validate_parsed(code, language, grammar),
            None => self.validate_balanced(code, language),
        }
    }

    fn validate_parsed(&self, code: &str, language: CodeLanguage, grammar: Language) -> QualityResult {
        let mut parser = Parser::new();
        if parser.set_language(&grammar).is_err() {
            return self.validate_balanced(code, language);
        }
        let Some(tree) = parser.parse(code, None) else {
            return self.validate_balanced(code, language);
        };

        let root = tree.root_node();
        let stats = SyntaxStats::collect(root);
        let loc = lines_of_code(code);
        let has_docs = language.has_docs(code);
        let has_comments = stats.comments > 0;
        let syntax_valid = !root.has_error();

        let mut metrics = BTreeMap::new();
        metrics.insert("lines_of_code".into(), json!(loc));
        metrics.insert("has_docs".into(), json!(has_docs));
        metrics.insert("has_comments".into(), json!(has_comments));
        metrics.insert("function_count".into(), json!(stats.functions));
        metrics.insert("type_count".into(), json!(stats.types));

        let mut issues = Vec::new();
        let (score, confidence, needs_fallback) = if !syntax_valid {
            issues.push(format!(
                "Syntax error near line {}",
                stats.first_error_line.unwrap_or(1)
            ));
            (QualityScore::Failed, 0.95, true)
        } else {
            let mut raw = 3.0;
            if has_docs {
                raw += 0.5;
            }
            if has_comments {
                raw += 0.3;
            }
            if loc > 0 {
                raw += 0.2;
            }
            if loc < 3 {
                issues.push("Very short code output".to_string());
                raw -= 0.5;
            }
            let score = QualityScore::from_raw(raw);
            (score, 0.8, score < QualityScore::Acceptable)
        };

        let reasoning = format!(
            "{language} code validation: syntax {}, {loc} LOC",
            if syntax_valid { "valid" } else { "invalid" }
        );
        QualityResult {
            score,
            confidence,
            reasoning: with_issues(reasoning, &issues),
            issues,
            metrics,
            needs_fallback,
        }
    }

    /// Balance heuristic for languages without a parser
    fn validate_balanced(&self, code: &str, language: CodeLanguage) -> QualityResult {
        let count = |c: char| code.matches(c).count() as i64;
        let loc = lines_of_code(code);
        let has_functions = JS_FUNCTION.is_match(code);
        let has_comments = code.contains("//") || code.contains("/*") || code.contains('#');

        let mut issues = Vec::new();
        if count('{') != count('}') {
            issues.push("Unbalanced braces".to_string());
        }
        if count('(') != count(')') {
            issues.push("Unbalanced parentheses".to_string());
        }

        let mut raw = 3.0;
        if issues.is_empty() {
            raw += 1.0;
        }
        if has_functions {
            raw += 0.5;
        }
        if has_comments {
            raw += 0.3;
        }
        let score = QualityScore::from_raw(raw);

        let mut metrics = BTreeMap::new();
        metrics.insert("lines_of_code".into(), json!(loc));
        metrics.insert("has_functions".into(), json!(has_functions));
        metrics.insert("has_comments".into(), json!(has_comments));

        QualityResult {
            score,
            confidence: 0.7,
            reasoning: format!(
                "{language} validation: {loc} LOC, {}",
                if issues.is_empty() { "basic checks passed" } else { "issues found" }
            ),
            needs_fallback: score < QualityScore::Acceptable || !issues.is_empty(),
            issues,
            metrics,
        }
    }

    /// Validate prose
    pub fn validate_text(&self, text: &str, expected: TextKind) -> QualityResult {
        if text.trim().is_empty() {
            return QualityResult::empty("text");
        }

        let lowered = text.to_lowercase();
        let word_count = text.split_whitespace().count();
        let sentence_count = text.split('.').filter(|s| !s.trim().is_empty()).count();
        let paragraph_count = text.split("\n\n").filter(|p| !p.trim().is_empty()).count();
        let has_structure = TEXT_STRUCTURE.is_match(text);
        let coherence = coherence_score(&lowered);
        let completeness = completeness_score(&lowered);

        let mut issues = Vec::new();
        let mut raw = 3.0;
        if word_count < 10 {
            issues.push("Very short text output".to_string());
            raw -= 1.0;
        } else if word_count > 50 {
            raw += 0.5;
        }
        if has_structure {
            raw += 0.3;
        }
        if paragraph_count > 1 {
            raw += 0.2;
        }
        raw += coherence * 0.8;
        raw += completeness * 0.8;

        match expected {
            TextKind::Documentation if !DOCUMENTATION_VOCABULARY.is_match(&lowered) => {
                issues.push("Missing documentation elements".to_string());
                raw -= 0.5;
            }
            TextKind::Explanation if !EXPLANATION_VOCABULARY.is_match(&lowered) => {
                issues.push("Missing explanatory elements".to_string());
                raw -= 0.3;
            }
            _ => {}
        }

        let score = QualityScore::from_raw(raw);
        let mut metrics = BTreeMap::new();
        metrics.insert("word_count".into(), json!(word_count));
        metrics.insert("sentence_count".into(), json!(sentence_count));
        metrics.insert("paragraph_count".into(), json!(paragraph_count));
        metrics.insert("has_structure".into(), json!(has_structure));
        metrics.insert("coherence_score".into(), json!(coherence));
        metrics.insert("completeness_score".into(), json!(completeness));

        let reasoning = format!(
            "Text validation: {word_count} words, coherence={coherence:.2}, completeness={completeness:.2}"
        );
        QualityResult {
            score,
            confidence: f64::min(0.9, 0.6 + (coherence + completeness) / 2.0),
            reasoning: with_issues(reasoning, &issues),
            issues,
            metrics,
            needs_fallback: score < QualityScore::Acceptable,
        }
    }

    /// Whether the next attempt should go to a different backend
    pub fn should_fallback(&self, result: &QualityResult, category: TaskCategory) -> bool {
        result.needs_fallback || result.score.normalized() < category.min_quality()
    }

    pub fn predict_requirements(&self, category: TaskCategory) -> QualityRequirements {
        let (relevancy_priority, coherence_priority) = match category {
            TaskCategory::ArchitecturePlanning | TaskCategory::ComplexReasoning => (0.9, 0.9),
            TaskCategory::CodeGeneration | TaskCategory::Debugging | TaskCategory::Refactoring => {
                (0.7, 0.6)
            }
            _ => (0.0, 0.0),
        };
        QualityRequirements {
            min_score: category.min_quality(),
            relevancy_priority,
            coherence_priority,
        }
    }

    /// How well a backend's baseline meets predicted requirements, in [0, 1]
    pub fn assess_capability(
        &self,
        backend: &BackendDescriptor,
        requirements: &QualityRequirements,
    ) -> f64 {
        capability_score(backend, requirements.min_score)
    }

    /// Flattened view for monitoring
    pub fn quality_metrics(&self, result: &QualityResult) -> Value {
        json!({
            "quality_score": result.score.value(),
            "confidence": result.confidence,
            "issue_count": result.issues.len(),
            "needs_fallback": result.needs_fallback,
            "metrics": result.metrics,
        })
    }
}

fn coherence_score(lowered: &str) -> f64 {
    let families = COHERENCE_FAMILIES.iter().filter(|p| p.is_match(lowered)).count();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let unique_ratio = if words.is_empty() {
        0.0
    } else {
        words.iter().collect::<HashSet<_>>().len() as f64 / words.len() as f64
    };
    f64::min(1.0, families as f64 * 0.25 + f64::min(0.5, unique_ratio))
}

fn completeness_score(lowered: &str) -> f64 {
    let mut score = COMPLETENESS_FAMILIES.iter().filter(|p| p.is_match(lowered)).count() as f64 * 0.3;
    let trimmed = lowered.trim_end();
    if [".", "!", "?", ":", "```"].iter().any(|end| trimmed.ends_with(end)) {
        score += 0.2;
    }
    if COMPLETENESS_STRUCTURE.is_match(lowered) {
        score += 0.2;
    }
    f64::min(1.0, score)
}

/// Lightweight [0, 1] score of a response against the query that produced it:
/// length in range, keyword overlap, visible structure, clean ending.
pub fn response_quality(content: &str, query: &str) -> f64 {
    if content.is_empty() {
        return 0.0;
    }
    let mut score = 0.0;

    let length = content.chars().count();
    if (50..=5000).contains(&length) {
        score += 0.3;
    } else if length > 20 {
        score += 0.1;
    }

    let significant = |text: &str| -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .filter(|w| w.chars().count() > 3)
            .map(str::to_string)
            .collect()
    };
    let query_words = significant(query);
    if !query_words.is_empty() {
        let content_words = significant(content);
        let overlap = query_words.intersection(&content_words).count();
        score += overlap as f64 / query_words.len() as f64 * 0.4;
    }

    if ['\n', '.', ':', '-', '*'].iter().any(|m| content.contains(*m)) {
        score += 0.2;
    }
    if [".", "!", "?", "```", ")"].iter().any(|end| content.trim_end().ends_with(end)) {
        score += 0.1;
    }
    f64::min(score, 1.0)
}
