//! Orchestrator: mode selection, strategy dispatch and result hygiene
//!
//! `orchestrate` never fails. Construction errors, strategy errors and
//! panics inside a strategy all come back as a terminal `failed` report.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::SharedBackendAdapter;
use crate::events::{CoordinationRecord, SharedCoordinationSink};
use crate::quality::{ExecutionSample, QualityValidator, SharedQualityIntelligence, TextKind};
use crate::router::{ClassificationResult, Classifier, ModelRouter, TaskCategory};
use crate::task::{
    Coordination, ExecutionMode, ExecutionReport, ExecutionStatus, ReportResults, SubtaskOutcome,
    Task, TaskContext, DEFAULT_TIMEOUT_SECS,
};

use super::{
    Agent, AgentPool, CollaborativeStrategy, ExecutionStrategy, OrchestrationError,
    OrchestrationResult, ParallelStrategy, SequentialStrategy, SharedAgentPool,
};

/// Parameters of one `orchestrate` call; everything but the query is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationRequest {
    pub query: String,
    pub execution_mode: Option<ExecutionMode>,
    pub coordination_type: Option<Coordination>,
    pub context: TaskContext,
    pub subtasks: Vec<String>,
    pub task_id: Option<String>,
    /// Per-call timeout for this request; the orchestrator default when unset
    pub timeout_secs: Option<u64>,
}

impl OrchestrationRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = Some(mode);
        self
    }

    pub fn with_coordination(mut self, coordination: Coordination) -> Self {
        self.coordination_type = Some(coordination);
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

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// What the orchestrator can do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationStats {
    pub available_agents: Vec<String>,
    pub agent_count: usize,
    pub execution_modes: Vec<ExecutionMode>,
    pub coordination_types: Vec<Coordination>,
    pub has_classifier: bool,
    pub default_timeout_secs: u64,
}

/// Mode suggested for a classified query
pub fn suggest_mode(category: TaskCategory) -> ExecutionMode {
    match category {
        TaskCategory::CodeGeneration => ExecutionMode::Collaborative,
        TaskCategory::ComplexReasoning | TaskCategory::ArchitecturePlanning => {
            ExecutionMode::Sequential
        }
        _ => ExecutionMode::Parallel,
    }
}

pub struct Orchestrator {
    pool: SharedAgentPool,
    parallel: Arc<dyn ExecutionStrategy>,
    sequential: Arc<dyn ExecutionStrategy>,
    collaborative: Arc<dyn ExecutionStrategy>,
    classifier: Option<Arc<dyn Classifier>>,
    validator: QualityValidator,
    sink: Option<SharedCoordinationSink>,
    intelligence: Option<SharedQualityIntelligence>,
    default_timeout_secs: u64,
}

impl Orchestrator {
    /// Build an orchestrator over `agents`. The router's classifier is also
    /// used for mode selection unless replaced or removed.
    pub fn new(
        router: Arc<ModelRouter>,
        adapter: SharedBackendAdapter,
        agents: Vec<Agent>,
    ) -> OrchestrationResult<Self> {
        let classifier = Arc::clone(router.classifier());
        let pool = AgentPool::new(router, adapter, agents)?.shared();
        info!(agents = pool.len(), "Orchestrator initialized");
        Ok(Self {
            parallel: Arc::new(ParallelStrategy::new(Arc::clone(&pool))),
            sequential: Arc::new(SequentialStrategy::new(Arc::clone(&pool))),
            collaborative: Arc::new(CollaborativeStrategy::new(Arc::clone(&pool))),
            pool,
            classifier: Some(classifier),
            validator: QualityValidator::new(),
            sink: None,
            intelligence: None,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Fall back to keyword-based mode selection
    pub fn without_classifier(mut self) -> Self {
        self.classifier = None;
        self
    }

    pub fn with_sink(mut self, sink: SharedCoordinationSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_intelligence(mut self, intelligence: SharedQualityIntelligence) -> Self {
        self.intelligence = Some(intelligence);
        self
    }

    /// Bound on each backend call; zero is ignored
    pub fn with_default_timeout_secs(mut self, secs: u64) -> Self {
        if secs > 0 {
            self.default_timeout_secs = secs;
        }
        self
    }

    pub fn pool(&self) -> &SharedAgentPool {
        &self.pool
    }

    fn strategy(&self, mode: ExecutionMode) -> Arc<dyn ExecutionStrategy> {
        match mode {
            ExecutionMode::Parallel => Arc::clone(&self.parallel),
            ExecutionMode::Sequential => Arc::clone(&self.sequential),
            ExecutionMode::Collaborative => Arc::clone(&self.collaborative),
        }
    }

    /// Run one request to completion
    pub async fn orchestrate(&self, request: OrchestrationRequest) -> ExecutionReport {
        let start = Instant::now();
        let task_id = request
            .task_id
            .clone()
            .unwrap_or_else(|| format!("orchestration_{}", Uuid::new_v4()));
        info!(task_id = %task_id, "Starting orchestration");

        let classification = self
            .classifier
            .as_ref()
            .map(|c| c.classify(&request.query, &request.context));

        let mode = match request.execution_mode {
            Some(mode) => mode,
            None => {
                let mode = classification
                    .as_ref()
                    .map(|c| suggest_mode(c.category))
                    .unwrap_or_else(|| ExecutionMode::suggest_for_query(&request.query));
                info!(task_id = %task_id, mode = %mode, "Auto-selected execution mode");
                mode
            }
        };

        let requested = request
            .coordination_type
            .unwrap_or_else(|| mode.default_coordination());
        let compatible = mode.supports(requested);
        let coordination = if compatible {
            requested
        } else {
            let fallback = mode.default_coordination();
            warn!(
                task_id = %task_id,
                mode = %mode,
                requested = %requested,
                using = %fallback,
                "Coordination type not compatible with execution mode"
            );
            fallback
        };

        let built = Task::builder(task_id.clone(), request.query)
            .with_mode(mode)
            .with_coordination(coordination)
            .with_context(request.context)
            .with_subtasks(request.subtasks)
            .with_timeout_secs(
                request
                    .timeout_secs
                    .filter(|secs| *secs > 0)
                    .unwrap_or(self.default_timeout_secs),
            )
            .build();

        let mut report = match built {
            Ok(task) => self.run(task).await,
            Err(e) => ExecutionReport::failed(&task_id, e.to_string(), start.elapsed().as_secs_f64()),
        };

        if let Some(error) = report.error.as_deref().filter(|_| !report.is_successful()) {
            error!(task_id = %task_id, error = %error, "Orchestration failed");
        }

        let category = classification.as_ref().map(|c| c.category);
        self.score_report(&mut report, mode, category);

        let metadata = &mut report.metadata;
        metadata.insert(
            "orchestration_time".into(),
            json!(start.elapsed().as_secs_f64()),
        );
        metadata.insert("execution_mode".into(), json!(mode));
        metadata.insert("coordination_type".into(), json!(coordination));
        metadata.insert("agent_count".into(), json!(self.pool.len()));
        metadata.insert(
            "auto_mode_selection".into(),
            json!(request.execution_mode.is_none()),
        );
        if let Some(c) = &classification {
            metadata.insert("task_category".into(), json!(c.category));
        }
        if !compatible {
            metadata.insert("coordination_requested".into(), json!(requested));
            metadata.insert("coordination_compatible".into(), json!(false));
        }

        if let Some(sink) = &self.sink {
            sink.record(CoordinationRecord::from_report(&report, mode, coordination));
        }
        if let Some(intelligence) = &self.intelligence {
            self.feed_intelligence(intelligence, &report, classification.as_ref());
        }

        info!(
            task_id = %report.task_id,
            status = %report.status,
            execution_time = report.execution_time,
            "Orchestration completed"
        );
        report
    }

    /// Run several independent requests concurrently
    pub async fn manage_parallel_execution(
        &self,
        requests: Vec<OrchestrationRequest>,
    ) -> Vec<ExecutionReport> {
        join_all(requests.into_iter().map(|r| self.orchestrate(r))).await
    }

    pub fn stats(&self) -> OrchestrationStats {
        OrchestrationStats {
            available_agents: self.pool.agents().iter().map(|a| a.name.clone()).collect(),
            agent_count: self.pool.len(),
            execution_modes: ExecutionMode::ALL.to_vec(),
            coordination_types: Coordination::ALL.to_vec(),
            has_classifier: self.classifier.is_some(),
            default_timeout_secs: self.default_timeout_secs,
        }
    }

    /// Run the strategy on its own tokio task so a panic is contained
    async fn run(&self, task: Task) -> ExecutionReport {
        let start = Instant::now();
        let task_id = task.task_id.clone();
        let strategy = self.strategy(task.execution_mode);
        let joined = tokio::spawn(async move { strategy.execute(&task).await }).await;

        let outcome = match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(OrchestrationError::Panicked(format!(
                "task {task_id} aborted by a panic"
            ))),
            Err(e) => Err(OrchestrationError::Strategy(e.to_string())),
        };
        outcome.unwrap_or_else(|e| {
            ExecutionReport::failed(task_id, e.to_string(), start.elapsed().as_secs_f64())
        })
    }

    /// Fill in a text quality score when the strategy left it unset
    fn score_report(
        &self,
        report: &mut ExecutionReport,
        mode: ExecutionMode,
        category: Option<TaskCategory>,
    ) {
        if report.quality_score.is_some() || report.status == ExecutionStatus::Failed {
            return;
        }
        let ReportResults::Subtasks(results) = &report.results else {
            return;
        };

        let outputs = ordered_outputs(results);
        let text = match mode {
            ExecutionMode::Sequential => outputs.last().map(|s| s.to_string()),
            _ => (!outputs.is_empty()).then(|| outputs.join("\n\n")),
        };
        let Some(text) = text else {
            return;
        };

        let category = category.unwrap_or(TaskCategory::SimpleQuery);
        let kind = match category {
            TaskCategory::Documentation => TextKind::Documentation,
            _ => TextKind::General,
        };
        let validation = self.validator.validate_text(&text, kind);
        report.quality_score = Some(validation.score.normalized());
        report.metadata.insert(
            "quality_needs_fallback".into(),
            json!(self.validator.should_fallback(&validation, category)),
        );
    }

    fn feed_intelligence(
        &self,
        intelligence: &SharedQualityIntelligence,
        report: &ExecutionReport,
        classification: Option<&ClassificationResult>,
    ) {
        let category = classification
            .map(|c| c.category)
            .unwrap_or(TaskCategory::SimpleQuery);
        for outcome in report.results.outcomes() {
            let Some(backend) = &outcome.backend else {
                continue;
            };
            let quality = outcome
                .output()
                .map(|text| {
                    self.validator
                        .validate_text(text, TextKind::General)
                        .score
                        .normalized()
                })
                .unwrap_or(0.0);
            intelligence.record(ExecutionSample {
                task_id: report.task_id.clone(),
                timestamp: Utc::now(),
                backend: backend.clone(),
                category,
                quality,
                execution_time: outcome.execution_time.unwrap_or_default(),
                success: outcome.is_completed(),
                user_feedback: None,
            });
        }
    }
}

/// Completed outputs ordered by the numeric suffix of their key
/// (`subtask_2` before `subtask_10`)
fn ordered_outputs(results: &BTreeMap<String, SubtaskOutcome>) -> Vec<&str> {
    let mut keyed: Vec<(u64, &str)> = results
        .iter()
        .filter_map(|(key, outcome)| {
            let index = key
                .rsplit('_')
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(u64::MAX);
            outcome.output().map(|text| (index, text))
        })
        .collect();
    keyed.sort_by_key(|(index, _)| *index);
    keyed.into_iter().map(|(_, text)| text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EchoBackend;
    use crate::registry::CapabilityRegistry;
    use crate::task::SubtaskStatus;

    fn orchestrator() -> Orchestrator {
        let registry = CapabilityRegistry::default().shared();
        let agents = Agent::roster(&registry);
        Orchestrator::new(
            Arc::new(ModelRouter::new(registry)),
            Arc::new(EchoBackend),
            agents,
        )
        .unwrap()
    }

    #[test]
    fn test_category_mode_suggestion() {
        assert_eq!(
            suggest_mode(TaskCategory::CodeGeneration),
            ExecutionMode::Collaborative
        );
        assert_eq!(
            suggest_mode(TaskCategory::ArchitecturePlanning),
            ExecutionMode::Sequential
        );
        assert_eq!(suggest_mode(TaskCategory::Documentation), ExecutionMode::Parallel);
    }

    #[test]
    fn test_ordered_outputs_sort_numerically() {
        let mut results = BTreeMap::new();
        for i in [1, 2, 10] {
            let mut outcome = SubtaskOutcome::failed("a", "");
            outcome.status = SubtaskStatus::Completed;
            outcome.error = None;
            outcome.result = Some(format!("out {i}"));
            results.insert(format!("step_{i}"), outcome);
        }
        assert_eq!(ordered_outputs(&results), vec!["out 1", "out 2", "out 10"]);
    }

    #[test]
    fn test_stats() {
        let stats = orchestrator().without_classifier().stats();
        assert_eq!(stats.agent_count, 4);
        assert_eq!(stats.execution_modes.len(), 3);
        assert!(!stats.has_classifier);
        assert_eq!(stats.default_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn test_request_metadata_is_stamped() {
        let report = orchestrator()
            .orchestrate(
                OrchestrationRequest::new("summarize the meeting notes")
                    .with_mode(ExecutionMode::Parallel)
                    .with_task_id("meta-1"),
            )
            .await;
        assert_eq!(report.task_id, "meta-1");
        assert_eq!(report.status, ExecutionStatus::Completed);
        assert_eq!(report.metadata["execution_mode"], "parallel");
        assert_eq!(report.metadata["coordination_type"], "independent");
        assert_eq!(report.metadata["agent_count"], 4);
        assert_eq!(report.metadata["auto_mode_selection"], false);
        assert!(report.metadata.contains_key("orchestration_time"));
        assert!(report.quality_score.is_some());
    }

    #[tokio::test]
    async fn test_generated_task_id() {
        let report = orchestrator()
            .orchestrate(OrchestrationRequest::new("hello"))
            .await;
        assert!(report.task_id.starts_with("orchestration_"));
    }

    #[tokio::test]
    async fn test_incompatible_coordination_is_advisory() {
        let report = orchestrator()
            .orchestrate(
                OrchestrationRequest::new("plan the rollout")
                    .with_mode(ExecutionMode::Sequential)
                    .with_coordination(Coordination::Independent),
            )
            .await;
        assert_eq!(report.status, ExecutionStatus::Completed);
        assert_eq!(report.metadata["coordination_type"], "synchronized");
        assert_eq!(report.metadata["coordination_requested"], "independent");
        assert_eq!(report.metadata["coordination_compatible"], false);
    }
}
