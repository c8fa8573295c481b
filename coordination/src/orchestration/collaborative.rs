//! Collaborative strategy: every registered backend answers, the best answer
//! wins

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use tracing::info;

use crate::quality::{response_quality, QualityValidator};
use crate::task::{
    BestResult, CollaborativeResults, ConsensusAnalysis, ConsensusLevel, ExecutionMode,
    ExecutionReport, ExecutionStatus, ReportResults, SubtaskOutcome, Task,
};

use super::{dedup_agents, ExecutionStrategy, OrchestrationResult, SharedAgentPool};

pub struct CollaborativeStrategy {
    pool: SharedAgentPool,
    validator: QualityValidator,
}

impl CollaborativeStrategy {
    pub fn new(pool: SharedAgentPool) -> Self {
        Self {
            pool,
            validator: QualityValidator::new(),
        }
    }

    /// Score in [0, 1]. Code tasks (a `language` in context) go through the
    /// validator; everything else uses the response heuristic.
    fn score(&self, outcome: &SubtaskOutcome, task: &Task) -> f64 {
        let Some(output) = outcome.output() else {
            return 0.0;
        };
        match task.context.get("language").and_then(|v| v.as_str()) {
            Some(language) => self.validator.validate_code(output, language).score.normalized(),
            None => response_quality(output, &task.query),
        }
    }
}

/// Word-set overlap across successful outputs
pub fn analyze_consensus(outputs: &[&str]) -> ConsensusAnalysis {
    if outputs.len() < 2 {
        return ConsensusAnalysis {
            consensus: ConsensusLevel::InsufficientData,
            agreement_level: 0.0,
            agents_agreeing: outputs.len(),
            common_themes: 0,
        };
    }

    let word_sets: Vec<HashSet<String>> = outputs
        .iter()
        .map(|o| o.to_lowercase().split_whitespace().map(str::to_string).collect())
        .collect();
    let common: HashSet<&String> = word_sets[0]
        .iter()
        .filter(|w| word_sets[1..].iter().all(|set| set.contains(*w)))
        .collect();
    let union: HashSet<&String> = word_sets.iter().flatten().collect();
    let agreement_level = if union.is_empty() {
        0.0
    } else {
        common.len() as f64 / union.len() as f64
    };

    ConsensusAnalysis {
        consensus: ConsensusLevel::from_agreement(agreement_level),
        agreement_level,
        agents_agreeing: outputs.len(),
        common_themes: common.len(),
    }
}

/// Population variance
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

#[async_trait]
impl ExecutionStrategy for CollaborativeStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Collaborative
    }

    async fn execute(&self, task: &Task) -> OrchestrationResult<ExecutionReport> {
        let start = Instant::now();
        let agents = self.pool.backend_roster();
        info!(task_id = %task.task_id, backends = agents.len(), "Running collaborative attempts");

        let calls = agents.iter().map(|agent| {
            self.pool
                .dispatch(agent, &task.query, &task.context, task.timeout())
        });
        let mut outcomes = join_all(calls).await;

        let scores: Vec<f64> = outcomes.iter().map(|o| self.score(o, task)).collect();
        for (outcome, score) in outcomes.iter_mut().zip(&scores) {
            outcome.quality_score = Some(*score);
        }

        // Ties go to the earliest agent in the roster
        let best_index = scores
            .iter()
            .enumerate()
            .fold(0, |best, (i, s)| if *s > scores[best] { i } else { best });

        let total = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.is_completed()).count();
        let status = if outcomes[best_index].is_completed() {
            ExecutionStatus::Completed
        } else if succeeded > 0 {
            ExecutionStatus::Partial
        } else {
            ExecutionStatus::Failed
        };

        let outputs: Vec<&str> = outcomes.iter().filter_map(|o| o.output()).collect();
        let consensus_analysis = analyze_consensus(&outputs);
        let agents_used = dedup_agents(outcomes.iter().map(|o| o.agent.as_str()));
        let best_agent = outcomes[best_index].agent.clone();
        let best_score = scores[best_index];

        let mut metadata = BTreeMap::new();
        metadata.insert("collaboration_type".into(), json!("competitive"));
        metadata.insert("agents_count".into(), json!(total));
        metadata.insert("successful_agents".into(), json!(succeeded));
        metadata.insert("quality_variance".into(), json!(variance(&scores)));
        metadata.insert("best_agent".into(), json!(best_agent));

        let error = (status == ExecutionStatus::Failed)
            .then(|| format!("all {total} collaborating backends failed"));

        let best_result = BestResult {
            agent: best_agent,
            quality_score: best_score,
            result: outcomes[best_index].clone(),
        };
        let quality_comparison: BTreeMap<String, f64> = outcomes
            .iter()
            .zip(&scores)
            .map(|(o, s)| (o.agent.clone(), *s))
            .collect();
        let all_results: BTreeMap<String, SubtaskOutcome> = outcomes
            .into_iter()
            .map(|o| (o.agent.clone(), o))
            .collect();

        Ok(ExecutionReport {
            task_id: task.task_id.clone(),
            status,
            results: ReportResults::Collaborative(Box::new(CollaborativeResults {
                best_result,
                all_results,
                quality_comparison,
                consensus_analysis,
            })),
            execution_time: start.elapsed().as_secs_f64(),
            quality_score: Some(best_score),
            coordination_efficiency: Some(succeeded as f64 / total as f64),
            agents_used,
            error,
            metadata,
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consensus_needs_two_results() {
        let analysis = analyze_consensus(&["only one"]);
        assert_eq!(analysis.consensus, ConsensusLevel::InsufficientData);
        assert_eq!(analysis.agreement_level, 0.0);
    }

    #[test]
    fn test_consensus_word_overlap() {
        let analysis = analyze_consensus(&["use a btree map", "use a hash map"]);
        // common {use, a, map} over union {use, a, btree, hash, map}
        assert_eq!(analysis.common_themes, 3);
        assert!((analysis.agreement_level - 0.6).abs() < 1e-9);
        assert_eq!(analysis.consensus, ConsensusLevel::Medium);

        let identical = analyze_consensus(&["Same Answer", "same answer"]);
        assert_eq!(identical.consensus, ConsensusLevel::High);
    }

    #[test]
    fn test_population_variance() {
        assert_eq!(variance(&[0.5]), 0.0);
        assert!((variance(&[0.0, 1.0]) - 0.25).abs() < 1e-9);
    }
}
