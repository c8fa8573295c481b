//! Agent roster and single-call dispatch
//!
//! An agent is a named slot that strategies assign work to. Pinned agents
//! always route to their backend; unpinned agents use quality-aware routing.
//! Every backend call runs in its own tokio task so that a panicking adapter
//! surfaces as a `JoinError` and is recorded as a failed subtask.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::SharedBackendAdapter;
use crate::registry::CapabilityRegistry;
use crate::router::ModelRouter;
use crate::task::{RoutingSummary, SubtaskOutcome, SubtaskStatus, TaskContext};

use super::{OrchestrationError, OrchestrationResult};

/// Shared reference to AgentPool
pub type SharedAgentPool = Arc<AgentPool>;

/// A named slot in the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    /// Backend this agent always uses; `None` routes per query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: None,
        }
    }

    pub fn pinned(name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: Some(backend.into()),
        }
    }

    /// One pinned agent per registered backend, named after it
    pub fn roster(registry: &CapabilityRegistry) -> Vec<Agent> {
        registry
            .ids()
            .into_iter()
            .map(|id| Agent::pinned(id, id))
            .collect()
    }
}

/// Agents plus the router and adapter they dispatch through
pub struct AgentPool {
    router: Arc<ModelRouter>,
    adapter: SharedBackendAdapter,
    agents: Vec<Agent>,
}

impl AgentPool {
    pub fn new(
        router: Arc<ModelRouter>,
        adapter: SharedBackendAdapter,
        agents: Vec<Agent>,
    ) -> OrchestrationResult<Self> {
        if agents.is_empty() {
            return Err(OrchestrationError::NoAgents);
        }
        for (i, agent) in agents.iter().enumerate() {
            if agents[..i].iter().any(|a| a.name == agent.name) {
                return Err(OrchestrationError::DuplicateAgent(agent.name.clone()));
            }
        }
        Ok(Self {
            router,
            adapter,
            agents,
        })
    }

    pub fn shared(self) -> SharedAgentPool {
        Arc::new(self)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn router(&self) -> &Arc<ModelRouter> {
        &self.router
    }

    /// Round-robin assignment
    pub fn agent_for(&self, index: usize) -> &Agent {
        &self.agents[index % self.agents.len()]
    }

    /// One agent per registered backend, in registry order.
    ///
    /// A backend is represented by the first roster agent pinned to it. A
    /// backend no agent is pinned to gets a stand-in pinned agent named after
    /// it. Unpinned agents take no part.
    pub fn backend_roster(&self) -> Vec<Agent> {
        self.router
            .registry()
            .ids()
            .into_iter()
            .map(|id| {
                self.agents
                    .iter()
                    .find(|a| a.backend.as_deref() == Some(id))
                    .cloned()
                    .unwrap_or_else(|| {
                        let name = if self.agents.iter().any(|a| a.name == id) {
                            format!("backend:{id}")
                        } else {
                            id.to_string()
                        };
                        Agent::pinned(name, id)
                    })
            })
            .collect()
    }

    /// Route `query` for `agent` and run it, bounded by `timeout`.
    ///
    /// Never fails: adapter errors, error responses, timeouts and panics all
    /// come back as a failed [`SubtaskOutcome`].
    pub async fn dispatch(
        &self,
        agent: &Agent,
        query: &str,
        context: &TaskContext,
        timeout: Duration,
    ) -> SubtaskOutcome {
        let decision = self
            .router
            .route_task(query, context, agent.backend.as_deref());
        let backend = decision.selected_backend.clone();
        let routing = RoutingSummary {
            selected_backend: decision.selected_backend,
            reasoning: decision.reasoning,
            confidence: decision.confidence,
        };
        debug!(agent = %agent.name, backend = %backend, "Dispatching subtask");

        let adapter = Arc::clone(&self.adapter);
        let (call_query, call_backend, call_context) =
            (query.to_string(), backend.clone(), context.clone());
        let start = Instant::now();
        let handle = tokio::spawn(async move {
            tokio::time::timeout(
                timeout,
                adapter.execute(&call_query, &call_backend, &call_context),
            )
            .await
        });

        let outcome = match handle.await {
            Ok(Ok(Ok(response))) if response.is_success() => Ok(response),
            Ok(Ok(Ok(response))) => Err(response
                .error
                .unwrap_or_else(|| format!("backend {backend} returned an error status"))),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(_)) => Err(format!(
                "backend {backend} timed out after {}s",
                timeout.as_secs()
            )),
            Err(e) if e.is_panic() => Err(format!("backend {backend} call panicked")),
            Err(e) => Err(format!("backend {backend} call aborted: {e}")),
        };

        match outcome {
            Ok(response) => SubtaskOutcome {
                status: SubtaskStatus::Completed,
                agent: agent.name.clone(),
                subtask: None,
                enhanced_query: None,
                backend: Some(backend),
                result: Some(response.result),
                execution_time: Some(response.execution_time),
                routing_decision: Some(routing),
                context_used: Vec::new(),
                quality_score: None,
                error: None,
            },
            Err(error) => {
                warn!(agent = %agent.name, backend = %backend, error = %error, "Subtask failed");
                SubtaskOutcome {
                    backend: Some(backend),
                    execution_time: Some(start.elapsed().as_secs_f64()),
                    routing_decision: Some(routing),
                    ..SubtaskOutcome::failed(agent.name.clone(), error)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EchoBackend;

    fn pool(agents: Vec<Agent>) -> OrchestrationResult<AgentPool> {
        let registry = CapabilityRegistry::default().shared();
        AgentPool::new(
            Arc::new(ModelRouter::new(registry)),
            Arc::new(EchoBackend),
            agents,
        )
    }

    #[test]
    fn test_pool_rejects_empty_and_duplicate_rosters() {
        assert!(matches!(pool(Vec::new()), Err(OrchestrationError::NoAgents)));
        assert!(matches!(
            pool(vec![Agent::new("a"), Agent::new("a")]),
            Err(OrchestrationError::DuplicateAgent(name)) if name == "a"
        ));
    }

    #[test]
    fn test_default_roster_covers_every_backend() {
        let registry = CapabilityRegistry::default();
        let roster = Agent::roster(&registry);
        assert_eq!(roster.len(), registry.len());
        for agent in &roster {
            assert_eq!(agent.backend.as_deref(), Some(agent.name.as_str()));
        }
    }

    #[test]
    fn test_round_robin() {
        let pool = pool(vec![Agent::new("a"), Agent::new("b")]).unwrap();
        assert_eq!(pool.agent_for(0).name, "a");
        assert_eq!(pool.agent_for(1).name, "b");
        assert_eq!(pool.agent_for(2).name, "a");
    }

    #[test]
    fn test_backend_roster_fills_uncovered_backends() {
        let pool = pool(vec![
            Agent::pinned("writer", "claude-3-5-sonnet-20241022"),
            Agent::pinned("second-writer", "claude-3-5-sonnet-20241022"),
            Agent::new("codellama:7b"),
        ])
        .unwrap();
        let roster = pool.backend_roster();
        let names: Vec<&str> = roster.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "mistral:7b-instruct",
                "backend:codellama:7b",
                "llama3.1:70b-instruct",
                "writer",
            ]
        );
        for (agent, id) in roster.iter().zip(pool.router().registry().ids()) {
            assert_eq!(agent.backend.as_deref(), Some(id));
        }
    }

    #[tokio::test]
    async fn test_pinned_agent_dispatch() {
        let pool = pool(vec![Agent::pinned("writer", "claude-3-5-sonnet-20241022")]).unwrap();
        let outcome = pool
            .dispatch(
                pool.agent_for(0),
                "hello",
                &TaskContext::new(),
                Duration::from_secs(5),
            )
            .await;
        assert!(outcome.is_completed());
        assert_eq!(outcome.backend.as_deref(), Some("claude-3-5-sonnet-20241022"));
        assert_eq!(
            outcome.result.as_deref(),
            Some("[claude-3-5-sonnet-20241022] hello")
        );
        assert_eq!(outcome.routing_decision.unwrap().confidence, 1.0);
    }
}
