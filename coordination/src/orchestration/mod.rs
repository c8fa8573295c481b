//! Multi-agent orchestration
//!
//! Three execution strategies share the [`ExecutionStrategy`] seam and a
//! common [`AgentPool`] that routes and dispatches individual backend calls.
//! The [`Orchestrator`] picks a strategy and converts every failure into a
//! well-formed `failed` report.
//!
//! ```text
//! Strategy      | Work split              | Efficiency
//! --------------|-------------------------|-----------------------------
//! parallel      | subtasks, round-robin   | successes / subtasks
//! sequential    | ordered steps, handoff  | completed steps / planned
//! collaborative | same query, every agent | successful agents / agents
//! ```

pub mod agents;
pub mod collaborative;
pub mod orchestrator;
pub mod parallel;
pub mod sequential;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::{ExecutionMode, ExecutionReport, Task, TaskError};

pub use agents::{Agent, AgentPool, SharedAgentPool};
pub use collaborative::CollaborativeStrategy;
pub use orchestrator::{OrchestrationRequest, OrchestrationStats, Orchestrator};
pub use parallel::ParallelStrategy;
pub use sequential::SequentialStrategy;

/// Errors raised while setting up or running an orchestration
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("no agents configured")]
    NoAgents,

    #[error("duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("strategy failed: {0}")]
    Strategy(String),

    #[error("strategy panicked: {0}")]
    Panicked(String),
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

/// One way of composing agents over a task
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    async fn execute(&self, task: &Task) -> OrchestrationResult<ExecutionReport>;
}

pub(crate) fn contains_any(haystack: &str, words: &[&str]) -> bool {
    words.iter().any(|w| haystack.contains(w))
}

/// Agent names in first-seen order, without repeats
pub(crate) fn dedup_agents<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for name in names {
        if !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}
