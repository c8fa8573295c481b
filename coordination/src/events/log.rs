//! Bounded in-memory coordination log with broadcast fan-out

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::{CoordinationRecord, CoordinationSink};

/// Records kept before trimming
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Records considered by [`CoordinationLog::metrics`]
const METRICS_WINDOW: usize = 100;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to CoordinationLog
pub type SharedCoordinationLog = Arc<CoordinationLog>;

/// Aggregates over the most recent records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationMetrics {
    pub total_tasks: usize,
    pub avg_execution_time: f64,
    /// Over records that carry a quality score
    pub avg_quality: Option<f64>,
    pub success_rate: f64,
    pub mode_usage: BTreeMap<String, usize>,
}

/// Append-only log; keeps the newest half once `capacity` is reached
pub struct CoordinationLog {
    records: Mutex<Vec<CoordinationRecord>>,
    capacity: usize,
    sender: broadcast::Sender<CoordinationRecord>,
}

impl CoordinationLog {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            records: Mutex::new(Vec::new()),
            capacity: capacity.max(2),
            sender,
        }
    }

    pub fn shared(self) -> SharedCoordinationLog {
        Arc::new(self)
    }

    /// Receive every record appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationRecord> {
        self.sender.subscribe()
    }

    pub fn records(&self) -> Vec<CoordinationRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CoordinationMetrics {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let recent = &records[records.len().saturating_sub(METRICS_WINDOW)..];
        if recent.is_empty() {
            return CoordinationMetrics {
                total_tasks: 0,
                avg_execution_time: 0.0,
                avg_quality: None,
                success_rate: 0.0,
                mode_usage: BTreeMap::new(),
            };
        }

        let n = recent.len() as f64;
        let qualities: Vec<f64> = recent.iter().filter_map(|r| r.quality_score).collect();
        let mut mode_usage = BTreeMap::new();
        for record in recent {
            *mode_usage
                .entry(record.execution_mode.to_string())
                .or_insert(0) += 1;
        }

        CoordinationMetrics {
            total_tasks: recent.len(),
            avg_execution_time: recent.iter().map(|r| r.execution_time).sum::<f64>() / n,
            avg_quality: (!qualities.is_empty())
                .then(|| qualities.iter().sum::<f64>() / qualities.len() as f64),
            success_rate: recent.iter().filter(|r| r.is_successful()).count() as f64 / n,
            mode_usage,
        }
    }
}

impl Default for CoordinationLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl CoordinationSink for CoordinationLog {
    fn record(&self, record: CoordinationRecord) {
        {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            records.push(record.clone());
            if records.len() >= self.capacity {
                let keep_from = records.len() - self.capacity / 2;
                records.drain(..keep_from);
                debug!(kept = records.len(), "Coordination log trimmed");
            }
        }
        // No receivers is fine
        let _ = self.sender.send(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Coordination, ExecutionMode, ExecutionStatus};
    use chrono::Utc;

    fn record(id: usize, status: ExecutionStatus, quality: Option<f64>) -> CoordinationRecord {
        CoordinationRecord {
            timestamp: Utc::now(),
            task_id: format!("t-{id}"),
            execution_mode: if id % 2 == 0 {
                ExecutionMode::Parallel
            } else {
                ExecutionMode::Sequential
            },
            coordination: Coordination::Synchronized,
            status,
            execution_time: 2.0,
            quality_score: quality,
            coordination_efficiency: Some(1.0),
        }
    }

    #[test]
    fn test_log_trims_to_newest_half() {
        let log = CoordinationLog::new(10);
        for i in 0..10 {
            log.record(record(i, ExecutionStatus::Completed, None));
        }
        let records = log.records();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].task_id, "t-5");
        assert_eq!(records[4].task_id, "t-9");
    }

    #[test]
    fn test_metrics() {
        let log = CoordinationLog::default();
        assert_eq!(log.metrics().total_tasks, 0);

        log.record(record(0, ExecutionStatus::Completed, Some(0.8)));
        log.record(record(1, ExecutionStatus::Failed, None));
        log.record(record(2, ExecutionStatus::Partial, Some(0.4)));

        let metrics = log.metrics();
        assert_eq!(metrics.total_tasks, 3);
        assert!((metrics.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics.avg_quality.unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(metrics.avg_execution_time, 2.0);
        assert_eq!(metrics.mode_usage["parallel"], 2);
        assert_eq!(metrics.mode_usage["sequential"], 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_records() {
        let log = CoordinationLog::default();
        let mut receiver = log.subscribe();
        log.record(record(7, ExecutionStatus::Completed, None));
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.task_id, "t-7");
    }
}
