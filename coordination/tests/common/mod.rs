//! Shared fixtures for integration tests: a scripted backend adapter that
//! records every call, and helpers to build orchestrators over it.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use agent_coordination::backend::BackendResult;
use agent_coordination::{
    Agent, BackendAdapter, BackendDescriptor, BackendError, BackendResponse, BackendTier,
    CapabilityRegistry, ModelRouter, Orchestrator, TaskContext,
};
use async_trait::async_trait;

/// What the scripted backend does for a matching call
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Success with a fixed reply
    Reply(String),
    /// Success echoing the query
    Echo,
    /// `Err` from the adapter
    Fail(String),
    /// `Ok` response carrying an error status
    ErrorStatus(String),
    Panic,
    /// Sleep, then behave as the inner behavior
    Delay(Duration, Box<Behavior>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub backend: String,
    pub query: String,
    pub context_keys: Vec<String>,
}

enum Matcher {
    Backend(String),
    QueryContains(String),
}

/// Rule-driven mock adapter; the first matching rule wins, otherwise echo
pub struct ScriptedBackend {
    rules: Vec<(Matcher, Behavior)>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_backend(mut self, backend: &str, behavior: Behavior) -> Self {
        self.rules.push((Matcher::Backend(backend.to_string()), behavior));
        self
    }

    pub fn on_query(mut self, needle: &str, behavior: Behavior) -> Self {
        self.rules.push((Matcher::QueryContains(needle.to_string()), behavior));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, backend: &str) -> usize {
        self.calls().iter().filter(|c| c.backend == backend).count()
    }

    fn behavior_for(&self, backend: &str, query: &str) -> Behavior {
        self.rules
            .iter()
            .find(|(matcher, _)| match matcher {
                Matcher::Backend(id) => id == backend,
                Matcher::QueryContains(needle) => query.contains(needle.as_str()),
            })
            .map(|(_, behavior)| behavior.clone())
            .unwrap_or(Behavior::Echo)
    }
}

async fn perform(behavior: Behavior, query: &str, backend: &str) -> BackendResult<BackendResponse> {
    let start = Instant::now();
    let mut behavior = behavior;
    while let Behavior::Delay(duration, inner) = behavior {
        tokio::time::sleep(duration).await;
        behavior = *inner;
    }
    let elapsed = start.elapsed().as_secs_f64();
    match behavior {
        Behavior::Reply(text) => Ok(BackendResponse::success(backend, text, elapsed)),
        Behavior::Echo => Ok(BackendResponse::success(backend, format!("{backend}: {query}."), elapsed)),
        Behavior::Fail(message) => Err(BackendError::Http(message)),
        Behavior::ErrorStatus(message) => Ok(BackendResponse::failure(backend, message, elapsed)),
        Behavior::Panic => panic!("scripted backend {backend} panicked"),
        Behavior::Delay(..) => unreachable!(),
    }
}

#[async_trait]
impl BackendAdapter for ScriptedBackend {
    async fn execute(
        &self,
        query: &str,
        backend_id: &str,
        context: &TaskContext,
    ) -> BackendResult<BackendResponse> {
        self.calls.lock().unwrap().push(Call {
            backend: backend_id.to_string(),
            query: query.to_string(),
            context_keys: context.keys().cloned().collect(),
        });
        let behavior = self.behavior_for(backend_id, query);
        perform(behavior, query, backend_id).await
    }
}

/// Registry of lower-case backends `a`, `b`, `c`, ...
pub fn letter_registry(count: usize) -> CapabilityRegistry {
    let backends = (0..count)
        .map(|i| {
            let id = ((b'a' + i as u8) as char).to_string();
            let tier = if i % 2 == 0 {
                BackendTier::Fast
            } else {
                BackendTier::HighCapability
            };
            BackendDescriptor::new(id, tier, 1.0 + i as f64, 0.7 + 0.05 * i as f64)
        })
        .collect();
    CapabilityRegistry::from_backends(backends).unwrap()
}

/// Agents `A`, `B`, `C`, ... pinned to backends `a`, `b`, `c`, ...
pub fn letter_agents(count: usize) -> Vec<Agent> {
    (0..count)
        .map(|i| {
            let letter = (b'a' + i as u8) as char;
            Agent::pinned(letter.to_ascii_uppercase().to_string(), letter.to_string())
        })
        .collect()
}

/// Orchestrator over `count` pinned letter agents and the given backend
pub fn letter_orchestrator(count: usize, backend: Arc<ScriptedBackend>) -> Orchestrator {
    let registry = letter_registry(count).shared();
    Orchestrator::new(
        Arc::new(ModelRouter::new(registry)),
        backend,
        letter_agents(count),
    )
    .unwrap()
}
