//! Execution reports
//!
//! The uniform result shape every strategy produces and the orchestrator
//! returns. Reports are built once and not mutated after being handed back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall outcome of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Partial,
    Failed,
}

impl ExecutionStatus {
    /// `completed` iff everything succeeded, `partial` if anything did
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        if total > 0 && succeeded == total {
            Self::Completed
        } else if succeeded > 0 {
            Self::Partial
        } else {
            Self::Failed
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Completed,
    Failed,
}

/// Routing summary attached to each dispatched subtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSummary {
    pub selected_backend: String,
    pub reasoning: String,
    pub confidence: f64,
}

/// Result of one subtask, step or collaborative attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskOutcome {
    pub status: SubtaskStatus,
    /// Agent slot that ran it
    pub agent: String,
    /// Query as planned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtask: Option<String>,
    /// Query as actually sent, when handoff context was added
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_decision: Option<RoutingSummary>,
    /// Context keys visible to the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubtaskOutcome {
    pub fn failed(agent: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: SubtaskStatus::Failed,
            agent: agent.into(),
            subtask: None,
            enhanced_query: None,
            backend: None,
            result: None,
            execution_time: None,
            routing_decision: None,
            context_used: Vec::new(),
            quality_score: None,
            error: Some(error.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SubtaskStatus::Completed
    }

    /// Output text, only for completed outcomes
    pub fn output(&self) -> Option<&str> {
        if self.is_completed() {
            self.result.as_deref()
        } else {
            None
        }
    }
}

/// Degree of lexical agreement between collaborative results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusLevel {
    InsufficientData,
    Low,
    Medium,
    High,
}

impl ConsensusLevel {
    pub fn from_agreement(agreement: f64) -> Self {
        if agreement >= 0.7 {
            Self::High
        } else if agreement >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusAnalysis {
    pub consensus: ConsensusLevel,
    /// |intersection| / |union| of the successful results' word sets
    pub agreement_level: f64,
    pub agents_agreeing: usize,
    /// Size of the shared vocabulary
    pub common_themes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    pub agent: String,
    pub quality_score: f64,
    pub result: SubtaskOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborativeResults {
    pub best_result: BestResult,
    pub all_results: BTreeMap<String, SubtaskOutcome>,
    pub quality_comparison: BTreeMap<String, f64>,
    pub consensus_analysis: ConsensusAnalysis,
}

/// Subtask results, keyed by subtask or step name, or the collaborative summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportResults {
    Collaborative(Box<CollaborativeResults>),
    Subtasks(BTreeMap<String, SubtaskOutcome>),
}

impl ReportResults {
    pub fn empty() -> Self {
        Self::Subtasks(BTreeMap::new())
    }

    /// Every individual outcome, regardless of strategy
    pub fn outcomes(&self) -> Vec<&SubtaskOutcome> {
        match self {
            Self::Subtasks(map) => map.values().collect(),
            Self::Collaborative(c) => c.all_results.values().collect(),
        }
    }

    pub fn subtask(&self, name: &str) -> Option<&SubtaskOutcome> {
        match self {
            Self::Subtasks(map) => map.get(name),
            Self::Collaborative(c) => c.all_results.get(name),
        }
    }

    pub fn collaborative(&self) -> Option<&CollaborativeResults> {
        match self {
            Self::Collaborative(c) => Some(c),
            Self::Subtasks(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Subtasks(map) => map.len(),
            Self::Collaborative(c) => c.all_results.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Uniform orchestration result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub task_id: String,
    pub status: ExecutionStatus,
    pub results: ReportResults,
    /// Seconds spent in the strategy
    pub execution_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordination_efficiency: Option<f64>,
    pub agents_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionReport {
    /// Terminal failure with no subtask results and zero efficiency
    pub fn failed(task_id: impl Into<String>, error: impl Into<String>, execution_time: f64) -> Self {
        Self {
            task_id: task_id.into(),
            status: ExecutionStatus::Failed,
            results: ReportResults::empty(),
            execution_time,
            quality_score: None,
            coordination_efficiency: Some(0.0),
            agents_used: Vec::new(),
            error: Some(error.into()),
            metadata: BTreeMap::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.status, ExecutionStatus::Completed | ExecutionStatus::Partial)
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Task {}: {} in {:.2}s using {} agent(s)",
            self.task_id,
            self.status,
            self.execution_time,
            self.agents_used.len()
        );
        if let Some(quality) = self.quality_score {
            summary.push_str(&format!(", quality {quality:.2}"));
        }
        if let Some(error) = &self.error {
            summary.push_str(&format!(", error: {error}"));
        }
        summary
    }

    pub fn performance_metrics(&self) -> BTreeMap<String, serde_json::Value> {
        use serde_json::json;
        let mut metrics = BTreeMap::new();
        metrics.insert("execution_time".into(), json!(self.execution_time));
        metrics.insert("agents_count".into(), json!(self.agents_used.len()));
        metrics.insert("results_count".into(), json!(self.results.len()));
        metrics.insert("quality_score".into(), json!(self.quality_score));
        metrics.insert(
            "coordination_efficiency".into(),
            json!(self.coordination_efficiency),
        );
        metrics.insert("success".into(), json!(self.is_successful()));
        metrics
    }
}
