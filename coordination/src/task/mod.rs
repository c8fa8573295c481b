//! Task model shared by strategies and the orchestrator
//!
//! Execution modes, coordination styles and their compatibility matrix are
//! defined once here alongside the [`Task`] they configure.
//!
//! ```text
//! Mode          | independent | synchronized | hierarchical
//! --------------|-------------|--------------|-------------
//! parallel      | yes         | yes          | no
//! sequential    | no          | yes          | yes
//! collaborative | yes         | yes          | yes
//! ```

pub mod report;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use report::{
    BestResult, CollaborativeResults, ConsensusAnalysis, ConsensusLevel, ExecutionReport,
    ExecutionStatus, ReportResults, RoutingSummary, SubtaskOutcome, SubtaskStatus,
};

/// Free-form key/value context passed to classifiers, routers and backends
pub type TaskContext = BTreeMap<String, serde_json::Value>;

/// Default task priority
pub const DEFAULT_PRIORITY: u8 = 1;

/// Default bound on each backend call, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Errors raised while constructing a task
#[derive(Debug, Error, PartialEq)]
pub enum TaskError {
    #[error("coordination {coordination} is not compatible with {mode} execution")]
    IncompatibleCoordination {
        mode: ExecutionMode,
        coordination: Coordination,
    },

    #[error("task timeout must be greater than zero")]
    ZeroTimeout,
}

pub type TaskResult<T> = Result<T, TaskError>;

/// How subtasks are composed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Decompose and fan out concurrently
    Parallel,
    /// Ordered steps with context handoff
    Sequential,
    /// Every agent answers the full query, best result wins
    Collaborative,
}

impl ExecutionMode {
    pub const ALL: [ExecutionMode; 3] = [Self::Parallel, Self::Sequential, Self::Collaborative];

    /// Coordination used when the caller does not pick one
    pub fn default_coordination(&self) -> Coordination {
        match self {
            Self::Parallel => Coordination::Independent,
            Self::Sequential => Coordination::Synchronized,
            Self::Collaborative => Coordination::Hierarchical,
        }
    }

    pub fn supports(&self, coordination: Coordination) -> bool {
        match self {
            Self::Parallel => matches!(
                coordination,
                Coordination::Independent | Coordination::Synchronized
            ),
            Self::Sequential => matches!(
                coordination,
                Coordination::Synchronized | Coordination::Hierarchical
            ),
            Self::Collaborative => true,
        }
    }

    /// Keyword heuristic used when no classifier is available
    pub fn suggest_for_query(query: &str) -> Self {
        const SEQUENTIAL: [&str; 5] = ["design", "implement", "review", "step", "workflow"];
        const COLLABORATIVE: [&str; 5] = ["complex", "critical", "important", "best", "optimal"];

        let lowered = query.to_lowercase();
        if SEQUENTIAL.iter().any(|w| lowered.contains(w)) {
            Self::Sequential
        } else if COLLABORATIVE.iter().any(|w| lowered.contains(w)) {
            Self::Collaborative
        } else {
            Self::Parallel
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Parallel => "Multiple agents work simultaneously on independent subtasks",
            Self::Sequential => "Agents work in order, each building on the previous step",
            Self::Collaborative => "Agents answer the same task and the best result is selected",
        }
    }

    pub fn use_cases(&self) -> &'static [&'static str] {
        match self {
            Self::Parallel => &[
                "Code + documentation + tests generation",
                "Multi-file processing",
                "Independent analysis tasks",
            ],
            Self::Sequential => &[
                "Design -> implementation -> review workflows",
                "Step-by-step problem solving",
                "Pipelines with dependencies",
            ],
            Self::Collaborative => &[
                "Complex problem solving",
                "Quality-critical tasks",
                "Getting multiple perspectives",
            ],
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parallel => write!(f, "parallel"),
            Self::Sequential => write!(f, "sequential"),
            Self::Collaborative => write!(f, "collaborative"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            "collaborative" => Ok(Self::Collaborative),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}

/// How agents synchronize while a mode runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coordination {
    Independent,
    Synchronized,
    Hierarchical,
}

impl Coordination {
    pub const ALL: [Coordination; 3] = [Self::Independent, Self::Synchronized, Self::Hierarchical];

    pub fn description(&self) -> &'static str {
        match self {
            Self::Independent => "Agents work without coordination",
            Self::Synchronized => "Agents share progress at synchronization points",
            Self::Hierarchical => "A lead agent arbitrates between the others",
        }
    }

    pub fn overhead(&self) -> &'static str {
        match self {
            Self::Independent => "minimal",
            Self::Synchronized => "moderate",
            Self::Hierarchical => "high",
        }
    }
}

impl std::fmt::Display for Coordination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Independent => write!(f, "independent"),
            Self::Synchronized => write!(f, "synchronized"),
            Self::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

impl std::str::FromStr for Coordination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "independent" => Ok(Self::Independent),
            "synchronized" => Ok(Self::Synchronized),
            "hierarchical" => Ok(Self::Hierarchical),
            other => Err(format!("unknown coordination type: {other}")),
        }
    }
}

/// A unit of orchestrated work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub query: String,
    pub context: TaskContext,
    pub execution_mode: ExecutionMode,
    pub coordination: Coordination,
    /// Explicit subtasks; empty means the strategy decomposes the query
    pub subtasks: Vec<String>,
    pub priority: u8,
    /// Bound on each backend call
    pub timeout_secs: u64,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn builder(task_id: impl Into<String>, query: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(task_id, query)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rough agent count this task will occupy
    pub fn estimated_agents_needed(&self) -> usize {
        match self.execution_mode {
            ExecutionMode::Parallel => self.subtasks.len().clamp(2, 5),
            ExecutionMode::Sequential => self.subtasks.len().max(1),
            ExecutionMode::Collaborative => 3,
        }
    }

    /// Rough wall-clock estimate
    pub fn estimated_duration(&self) -> Duration {
        let base = 60;
        let secs = match self.execution_mode {
            ExecutionMode::Parallel => base,
            ExecutionMode::Sequential => base * self.subtasks.len().max(1) as u64,
            ExecutionMode::Collaborative => base * 2,
        };
        Duration::from_secs(secs)
    }
}

/// Builder that enforces the mode/coordination matrix
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task_id: String,
    query: String,
    context: TaskContext,
    execution_mode: ExecutionMode,
    coordination: Option<Coordination>,
    subtasks: Vec<String>,
    priority: u8,
    timeout_secs: u64,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl TaskBuilder {
    pub fn new(task_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            query: query.into(),
            context: TaskContext::new(),
            execution_mode: ExecutionMode::Parallel,
            coordination: None,
            subtasks: Vec::new(),
            priority: DEFAULT_PRIORITY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_coordination(mut self, coordination: Coordination) -> Self {
        self.coordination = Some(coordination);
        self
    }

    pub fn with_context(mut self, context: TaskContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_subtasks(mut self, subtasks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.subtasks = subtasks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> TaskResult<Task> {
        let coordination = self
            .coordination
            .unwrap_or_else(|| self.execution_mode.default_coordination());
        if !self.execution_mode.supports(coordination) {
            return Err(TaskError::IncompatibleCoordination {
                mode: self.execution_mode,
                coordination,
            });
        }
        if self.timeout_secs == 0 {
            return Err(TaskError::ZeroTimeout);
        }

        Ok(Task {
            task_id: self.task_id,
            query: self.query,
            context: self.context,
            execution_mode: self.execution_mode,
            coordination,
            subtasks: self.subtasks,
            priority: self.priority,
            timeout_secs: self.timeout_secs,
            metadata: self.metadata,
            created_at: Utc::now(),
        })
    }
}
