//! Quality intelligence: a feedback loop over executed subtasks
//!
//! Keeps a bounded window of execution samples and derives per-backend
//! performance reports, routing recommendations and adaptive quality
//! thresholds from it. Quality values are normalized to [0, 1].

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::router::TaskCategory;

/// Samples retained
pub const DEFAULT_SAMPLE_CAPACITY: usize = 1000;

/// Minimum samples for a performance report
const MIN_REPORT_SAMPLES: usize = 5;

/// Minimum successful samples for threshold adjustment
const MIN_THRESHOLD_SAMPLES: usize = 10;

/// Samples at which report confidence saturates
const CONFIDENCE_SATURATION: f64 = 50.0;

const TREND_SLOPE: f64 = 0.05;

const SIGNIFICANT_GAP: f64 = 0.1;

/// Shared reference to QualityIntelligence
pub type SharedQualityIntelligence = Arc<QualityIntelligence>;

/// One executed subtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSample {
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub backend: String,
    pub category: TaskCategory,
    /// Normalized quality in [0, 1]
    pub quality: f64,
    pub execution_time: f64,
    pub success: bool,
    /// Optional user satisfaction in [0, 1]
    pub user_feedback: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    /// Least-squares slope over the series, in sample order
    pub fn of(values: &[f64]) -> Self {
        if values.len() < 3 {
            return Self::Stable;
        }
        let n = values.len() as f64;
        let x_sum: f64 = (0..values.len()).map(|i| i as f64).sum();
        let y_sum: f64 = values.iter().sum();
        let xy_sum: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
        let x2_sum: f64 = (0..values.len()).map(|i| (i * i) as f64).sum();
        let slope = (n * xy_sum - x_sum * y_sum) / (n * x2_sum - x_sum * x_sum);

        if slope > TREND_SLOPE {
            Self::Improving
        } else if slope < -TREND_SLOPE {
            Self::Declining
        } else {
            Self::Stable
        }
    }
}

/// Aggregated performance of one backend on one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub backend: String,
    pub category: TaskCategory,
    pub avg_quality: f64,
    pub avg_execution_time: f64,
    pub success_rate: f64,
    pub sample_size: usize,
    pub trend: Trend,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRecommendation {
    pub category: TaskCategory,
    pub current_backend: String,
    pub recommended_backend: String,
    pub reason: String,
    pub confidence: f64,
    pub expected_improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAdjustment {
    pub conservative: f64,
    pub aggressive: f64,
    pub user_adjusted: f64,
    pub current_average: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceSummary {
    pub total_executions: usize,
    pub success_rate: f64,
    pub avg_quality: f64,
    pub avg_execution_time: f64,
    pub backend_usage: BTreeMap<String, usize>,
}

/// Bounded in-memory sample store
#[derive(Debug)]
pub struct QualityIntelligence {
    samples: Mutex<VecDeque<ExecutionSample>>,
    capacity: usize,
}

impl Default for QualityIntelligence {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_CAPACITY)
    }
}

impl QualityIntelligence {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_SAMPLE_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub fn shared(self) -> SharedQualityIntelligence {
        Arc::new(self)
    }

    fn snapshot(&self) -> Vec<ExecutionSample> {
        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.iter().cloned().collect()
    }

    pub fn record(&self, sample: ExecutionSample) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reports per (backend, category) over the last `window`, most
    /// confident first. Pairs with fewer than five samples are skipped.
    pub fn performance_reports(
        &self,
        backend: Option<&str>,
        category: Option<TaskCategory>,
        window: Duration,
    ) -> Vec<PerformanceReport> {
        let cutoff = Utc::now() - window;
        let mut groups: BTreeMap<(String, TaskCategory), Vec<ExecutionSample>> = BTreeMap::new();
        for sample in self.snapshot() {
            if sample.timestamp < cutoff
                || backend.is_some_and(|b| b != sample.backend)
                || category.is_some_and(|c| c != sample.category)
            {
                continue;
            }
            groups
                .entry((sample.backend.clone(), sample.category))
                .or_default()
                .push(sample);
        }

        let mut reports: Vec<PerformanceReport> = groups
            .into_iter()
            .filter(|(_, samples)| samples.len() >= MIN_REPORT_SAMPLES)
            .map(|((backend, category), samples)| {
                let n = samples.len() as f64;
                let qualities: Vec<f64> = samples.iter().map(|s| s.quality).collect();
                PerformanceReport {
                    backend,
                    category,
                    avg_quality: qualities.iter().sum::<f64>() / n,
                    avg_execution_time: samples.iter().map(|s| s.execution_time).sum::<f64>() / n,
                    success_rate: samples.iter().filter(|s| s.success).count() as f64 / n,
                    sample_size: samples.len(),
                    trend: Trend::of(&qualities),
                    confidence: f64::min(1.0, n / CONFIDENCE_SATURATION),
                }
            })
            .collect();
        reports.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        reports
    }

    /// Suggest switching backends where another one does clearly better on
    /// the same category. Largest expected improvement first.
    pub fn suggest_routing_improvements(&self, min_confidence: f64) -> Vec<RoutingRecommendation> {
        let mut by_category: BTreeMap<TaskCategory, Vec<PerformanceReport>> = BTreeMap::new();
        for report in self.performance_reports(None, None, Duration::days(30)) {
            if report.confidence >= min_confidence {
                by_category.entry(report.category).or_default().push(report);
            }
        }

        let mut recommendations = Vec::new();
        for (category, mut reports) in by_category {
            if reports.len() < 2 {
                continue;
            }
            reports.sort_by(|a, b| b.avg_quality.total_cmp(&a.avg_quality));
            let best = &reports[0];
            for report in &reports[1..] {
                let gap = best.avg_quality - report.avg_quality;
                if gap > SIGNIFICANT_GAP {
                    recommendations.push(RoutingRecommendation {
                        category,
                        current_backend: report.backend.clone(),
                        recommended_backend: best.backend.clone(),
                        reason: format!(
                            "Quality improvement: {:.2} -> {:.2}",
                            report.avg_quality, best.avg_quality
                        ),
                        confidence: f64::min(best.confidence, report.confidence),
                        expected_improvement: gap,
                    });
                }
            }
        }
        recommendations.sort_by(|a, b| b.expected_improvement.total_cmp(&a.expected_improvement));
        recommendations
    }

    /// Threshold suggestions from successful samples of a category.
    /// `None` until at least ten are available.
    pub fn adaptive_thresholds(&self, category: TaskCategory) -> Option<ThresholdAdjustment> {
        let samples: Vec<ExecutionSample> = self
            .snapshot()
            .into_iter()
            .filter(|s| s.category == category && s.success)
            .collect();
        if samples.len() < MIN_THRESHOLD_SAMPLES {
            return None;
        }

        let n = samples.len() as f64;
        let mean = samples.iter().map(|s| s.quality).sum::<f64>() / n;
        let std_dev = (samples.iter().map(|s| (s.quality - mean).powi(2)).sum::<f64>() / n).sqrt();
        let conservative = f64::max(0.5, mean - std_dev);
        let aggressive = f64::min(0.95, mean);

        let feedback: Vec<f64> = samples.iter().filter_map(|s| s.user_feedback).collect();
        let user_adjusted = if feedback.is_empty() {
            aggressive
        } else {
            let avg_feedback = feedback.iter().sum::<f64>() / feedback.len() as f64;
            f64::min(aggressive, mean * avg_feedback)
        };

        Some(ThresholdAdjustment {
            conservative,
            aggressive,
            user_adjusted,
            current_average: mean,
            sample_size: samples.len(),
        })
    }

    pub fn summary(&self) -> IntelligenceSummary {
        let samples = self.snapshot();
        let total = samples.len();
        let mut backend_usage = BTreeMap::new();
        for sample in &samples {
            *backend_usage.entry(sample.backend.clone()).or_insert(0) += 1;
        }
        let mean = |f: fn(&ExecutionSample) -> f64| {
            if total == 0 {
                0.0
            } else {
                samples.iter().map(f).sum::<f64>() / total as f64
            }
        };

        IntelligenceSummary {
            total_executions: total,
            success_rate: mean(|s| if s.success { 1.0 } else { 0.0 }),
            avg_quality: mean(|s| s.quality),
            avg_execution_time: mean(|s| s.execution_time),
            backend_usage,
        }
    }
}
