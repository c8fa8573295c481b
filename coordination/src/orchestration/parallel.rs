//! Parallel strategy: decompose, fan out, wait for all

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use tracing::info;

use crate::task::{ExecutionMode, ExecutionReport, ExecutionStatus, ReportResults, Task};

use super::{contains_any, dedup_agents, ExecutionStrategy, OrchestrationResult, SharedAgentPool};

/// Runs independent subtasks concurrently, one agent each in round-robin order
pub struct ParallelStrategy {
    pool: SharedAgentPool,
}

impl ParallelStrategy {
    pub fn new(pool: SharedAgentPool) -> Self {
        Self { pool }
    }

    /// Explicit subtasks when at least two are given, otherwise a fixed
    /// three-way split chosen by query keywords
    pub fn plan(task: &Task) -> Vec<String> {
        if task.subtasks.len() >= 2 {
            return task.subtasks.clone();
        }
        let query = &task.query;
        let lowered = query.to_lowercase();

        if contains_any(&lowered, &["code", "function", "class", "implement"]) {
            vec![
                format!("Generate code for: {query}"),
                format!("Create documentation for: {query}"),
                format!("Write tests for: {query}"),
            ]
        } else if contains_any(&lowered, &["analyze", "review", "evaluate"]) {
            vec![
                format!("Technical analysis: {query}"),
                format!("Quality assessment: {query}"),
                format!("Recommendations for: {query}"),
            ]
        } else {
            vec![
                format!("Primary analysis: {query}"),
                format!("Secondary validation: {query}"),
                format!("Summary and conclusions: {query}"),
            ]
        }
    }
}

#[async_trait]
impl ExecutionStrategy for ParallelStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Parallel
    }

    async fn execute(&self, task: &Task) -> OrchestrationResult<ExecutionReport> {
        let start = Instant::now();
        let subtasks = Self::plan(task);
        info!(task_id = %task.task_id, subtasks = subtasks.len(), "Running parallel subtasks");

        let calls = subtasks.iter().enumerate().map(|(i, subtask)| {
            let agent = self.pool.agent_for(i);
            async move {
                let mut outcome = self
                    .pool
                    .dispatch(agent, subtask, &task.context, task.timeout())
                    .await;
                outcome.subtask = Some(subtask.clone());
                outcome
            }
        });
        let outcomes = join_all(calls).await;

        let total = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.is_completed()).count();
        let status = ExecutionStatus::from_counts(succeeded, total);
        let agents_used = dedup_agents(outcomes.iter().map(|o| o.agent.as_str()));
        let error = (status == ExecutionStatus::Failed)
            .then(|| format!("all {total} parallel subtasks failed"));

        let results: BTreeMap<String, _> = outcomes
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| (format!("subtask_{}", i + 1), outcome))
            .collect();

        let mut metadata = BTreeMap::new();
        metadata.insert("parallel_subtasks".into(), json!(total));
        metadata.insert("successful_subtasks".into(), json!(succeeded));

        Ok(ExecutionReport {
            task_id: task.task_id.clone(),
            status,
            results: ReportResults::Subtasks(results),
            execution_time: start.elapsed().as_secs_f64(),
            quality_score: None,
            coordination_efficiency: Some(if total == 0 {
                0.0
            } else {
                succeeded as f64 / total as f64
            }),
            agents_used,
            error,
            metadata,
            completed_at: Utc::now(),
        })
    }
}
