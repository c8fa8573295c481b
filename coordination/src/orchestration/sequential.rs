//! Sequential strategy: ordered steps with context handoff
//!
//! Each step sees a private copy of the task context extended with the
//! outputs of the steps before it. The chain stops at the first failure.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::task::{
    ExecutionMode, ExecutionReport, ExecutionStatus, ReportResults, SubtaskOutcome, Task,
};

use super::{contains_any, dedup_agents, ExecutionStrategy, OrchestrationResult, SharedAgentPool};

/// Characters of a step's output carried forward as its summary
const SUMMARY_CHARS: usize = 200;

/// Previous-step summaries prepended to a query
const HANDOFF_SUMMARIES: usize = 2;

pub struct SequentialStrategy {
    pool: SharedAgentPool,
}

impl SequentialStrategy {
    pub fn new(pool: SharedAgentPool) -> Self {
        Self { pool }
    }

    /// Explicit subtasks, or a three-step workflow chosen by query keywords
    pub fn plan(task: &Task) -> Vec<String> {
        if !task.subtasks.is_empty() {
            return task.subtasks.clone();
        }
        let query = &task.query;
        let lowered = query.to_lowercase();

        if contains_any(&lowered, &["develop", "create", "build", "implement"]) {
            vec![
                format!("Design and plan approach for: {query}"),
                format!("Implement solution for: {query}"),
                format!("Review and validate implementation: {query}"),
            ]
        } else if contains_any(&lowered, &["analyze", "investigate", "research"]) {
            vec![
                format!("Initial investigation: {query}"),
                format!("Detailed analysis: {query}"),
                format!("Summary and recommendations: {query}"),
            ]
        } else if contains_any(&lowered, &["solve", "fix", "debug", "troubleshoot"]) {
            vec![
                format!("Identify problem: {query}"),
                format!("Develop solution: {query}"),
                format!("Test and verify solution: {query}"),
            ]
        } else {
            vec![
                format!("Planning phase: {query}"),
                format!("Execution phase: {query}"),
                format!("Validation phase: {query}"),
            ]
        }
    }
}

/// First [`SUMMARY_CHARS`] characters, with an ellipsis when cut
fn summarize(output: &str) -> String {
    if output.chars().count() > SUMMARY_CHARS {
        let head: String = output.chars().take(SUMMARY_CHARS).collect();
        format!("{head}...")
    } else {
        output.to_string()
    }
}

fn enhance_query(subtask: &str, summaries: &[String]) -> String {
    let previous: Vec<String> = summaries
        .iter()
        .filter(|s| !s.is_empty())
        .take(HANDOFF_SUMMARIES)
        .map(|s| format!("Previous: {s}"))
        .collect();
    if previous.is_empty() {
        subtask.to_string()
    } else {
        format!(
            "{subtask}\n\nContext from previous steps: {}",
            previous.join(" | ")
        )
    }
}

#[async_trait]
impl ExecutionStrategy for SequentialStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Sequential
    }

    async fn execute(&self, task: &Task) -> OrchestrationResult<ExecutionReport> {
        let start = Instant::now();
        let steps = Self::plan(task);
        info!(task_id = %task.task_id, steps = steps.len(), "Running sequential steps");

        let mut context = task.context.clone();
        let mut summaries: Vec<String> = Vec::new();
        let mut results: BTreeMap<String, SubtaskOutcome> = BTreeMap::new();
        let mut agents: Vec<String> = Vec::new();
        let mut completed = 0usize;

        for (i, subtask) in steps.iter().enumerate() {
            let step_name = format!("step_{}", i + 1);
            let agent = self.pool.agent_for(i);
            let query = if i == 0 {
                subtask.clone()
            } else {
                enhance_query(subtask, &summaries)
            };

            let mut outcome = self
                .pool
                .dispatch(agent, &query, &context, task.timeout())
                .await;
            outcome.subtask = Some(subtask.clone());
            outcome.context_used = context.keys().cloned().collect();
            if query != *subtask {
                outcome.enhanced_query = Some(query);
            }
            agents.push(agent.name.clone());

            let output = match outcome.output() {
                Some(output) => output.to_string(),
                None => {
                    warn!(
                        task_id = %task.task_id,
                        step = %step_name,
                        "Step failed, stopping chain"
                    );
                    results.insert(step_name, outcome);
                    break;
                }
            };

            completed += 1;
            let summary = summarize(&output);
            let key_outputs = vec![
                format!("backend: {}", outcome.backend.as_deref().unwrap_or_default()),
                format!("execution_time: {}", outcome.execution_time.unwrap_or_default()),
            ];
            context.insert(format!("previous_{step_name}"), json!(output));
            context.insert(
                format!("handoff_from_{step_name}"),
                json!({ "summary": summary, "key_outputs": key_outputs }),
            );
            summaries.push(summary);
            results.insert(step_name, outcome);
        }

        let total = steps.len();
        let status = ExecutionStatus::from_counts(completed, total);
        let error = results
            .values()
            .find_map(|o| o.error.as_ref())
            .filter(|_| status == ExecutionStatus::Failed)
            .map(|e| format!("first step failed: {e}"));

        let mut metadata = BTreeMap::new();
        metadata.insert("sequential_steps".into(), json!(total));
        metadata.insert("completed_steps".into(), json!(completed));
        metadata.insert(
            "context_handoffs".into(),
            json!(completed.saturating_sub(1)),
        );

        Ok(ExecutionReport {
            task_id: task.task_id.clone(),
            status,
            results: ReportResults::Subtasks(results),
            execution_time: start.elapsed().as_secs_f64(),
            quality_score: None,
            coordination_efficiency: Some(if total == 0 {
                0.0
            } else {
                completed as f64 / total as f64
            }),
            agents_used: dedup_agents(agents.iter().map(String::as_str)),
            error,
            metadata,
            completed_at: Utc::now(),
        })
    }
}
