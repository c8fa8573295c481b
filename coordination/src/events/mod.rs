//! Coordination records and the sinks that receive them
//!
//! One flat [`CoordinationRecord`] is emitted per finished orchestration.
//!
//! ```text
//! ┌──────────────┐  record  ┌─────────────────┐  publish  ┌─────────────┐
//! │ Orchestrator │─────────▶│ CoordinationLog │──────────▶│ subscribers │
//! └──────────────┘          └────────┬────────┘           └─────────────┘
//!                                    │ metrics()
//!                                    ▼
//!                           last 100 records
//! ```

pub mod log;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::task::{Coordination, ExecutionMode, ExecutionReport, ExecutionStatus};

pub use log::{CoordinationLog, CoordinationMetrics, SharedCoordinationLog, DEFAULT_LOG_CAPACITY};

/// Shared reference to a sink
pub type SharedCoordinationSink = Arc<dyn CoordinationSink>;

/// Summary of one completed orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationRecord {
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub execution_mode: ExecutionMode,
    pub coordination: Coordination,
    pub status: ExecutionStatus,
    pub execution_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordination_efficiency: Option<f64>,
}

impl CoordinationRecord {
    pub fn from_report(
        report: &ExecutionReport,
        execution_mode: ExecutionMode,
        coordination: Coordination,
    ) -> Self {
        Self {
            timestamp: report.completed_at,
            task_id: report.task_id.clone(),
            execution_mode,
            coordination,
            status: report.status,
            execution_time: report.execution_time,
            quality_score: report.quality_score,
            coordination_efficiency: report.coordination_efficiency,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status != ExecutionStatus::Failed
    }
}

/// Append-only receiver of coordination records
pub trait CoordinationSink: Send + Sync {
    fn record(&self, record: CoordinationRecord);
}

/// Emits each record as a structured tracing event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl CoordinationSink for TracingSink {
    fn record(&self, record: CoordinationRecord) {
        info!(
            target: "coordination",
            task_id = %record.task_id,
            mode = %record.execution_mode,
            coordination = %record.coordination,
            status = %record.status,
            execution_time = record.execution_time,
            quality_score = record.quality_score,
            coordination_efficiency = record.coordination_efficiency,
            "Orchestration recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_report() {
        let report = ExecutionReport::failed("t-9", "boom", 1.5);
        let record =
            CoordinationRecord::from_report(&report, ExecutionMode::Parallel, Coordination::Independent);
        assert_eq!(record.task_id, "t-9");
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.coordination_efficiency, Some(0.0));
        assert!(!record.is_successful());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["execution_mode"], "parallel");
        assert!(json.get("quality_score").is_none());
    }

    #[test]
    fn test_tracing_sink_accepts_records() {
        let report = ExecutionReport::failed("t-10", "boom", 0.1);
        TracingSink.record(CoordinationRecord::from_report(
            &report,
            ExecutionMode::Sequential,
            Coordination::Synchronized,
        ));
    }
}
