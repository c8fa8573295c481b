//! Agent Coordination Library
//!
//! This library provides:
//! - Heuristic task classification (category, complexity, confidence)
//! - Quality-aware routing of queries to interchangeable backends
//! - Output quality validation for code and prose
//! - Multi-agent orchestration with parallel, sequential and collaborative strategies
//!
//! # Pipeline
//!
//! ```text
//! query ──▶ Classifier ──▶ ModelRouter ──▶ BackendAdapter ──▶ QualityValidator
//!              │                                                   │
//!              └──────────── Orchestrator (strategy) ◀─────────────┘
//!                                 │
//!                                 ▼
//!                   ExecutionReport + CoordinationRecord
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use agent_coordination::{
//!     Agent, CapabilityRegistry, EchoBackend, ModelRouter, OrchestrationRequest, Orchestrator,
//! };
//!
//! let registry = CapabilityRegistry::default().shared();
//! let agents = Agent::roster(&registry);
//! let orchestrator = Orchestrator::new(
//!     Arc::new(ModelRouter::new(registry)),
//!     Arc::new(EchoBackend),
//!     agents,
//! )?;
//!
//! let report = orchestrator
//!     .orchestrate(OrchestrationRequest::new("Write a function that parses dates"))
//!     .await;
//! println!("{}", report.summary());
//! ```

pub mod backend;
pub mod config;
pub mod events;
pub mod orchestration;
pub mod quality;
pub mod registry;
pub mod router;
pub mod task;

// Re-export backend types
pub use backend::{
    BackendAdapter, BackendError, BackendResponse, EchoBackend, HttpBackend, HttpBackendConfig,
    ResponseStatus, SharedBackendAdapter,
};

// Re-export configuration
pub use config::{ConfigError, OrchestratorConfig};

// Re-export coordination records
pub use events::{
    CoordinationLog, CoordinationMetrics, CoordinationRecord, CoordinationSink,
    SharedCoordinationSink, TracingSink,
};

// Re-export orchestration types
pub use orchestration::{
    Agent, AgentPool, ExecutionStrategy, OrchestrationError, OrchestrationRequest,
    OrchestrationStats, Orchestrator,
};

// Re-export quality types
pub use quality::{
    QualityIntelligence, QualityResult, QualityScore, QualityValidator, SharedQualityIntelligence,
    TextKind,
};

// Re-export registry and routing types
pub use registry::{BackendDescriptor, BackendTier, CapabilityRegistry, RoutingTable};
pub use router::{
    ClassificationResult, Classifier, ComplexityLevel, HeuristicClassifier, ModelRouter,
    RoutingDecision, TaskCategory,
};

// Re-export task model
pub use task::{
    Coordination, ExecutionMode, ExecutionReport, ExecutionStatus, ReportResults, SubtaskOutcome,
    Task, TaskContext,
};
