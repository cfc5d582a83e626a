//! Threshold evaluation over finalized source metrics

use crate::analysis::metrics::SourceMetrics;
use crate::analysis::percentile::{mean, percentile};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Limits the aggregated metrics of one source are compared against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Errors tolerated per source and analysis window
    pub max_errors: usize,
    /// Length of the window log-group sources are polled for
    pub error_window_minutes: u64,
    pub max_avg_response_time_ms: f64,
    pub max_p95_response_time_ms: f64,
    pub max_memory_percent: f64,
    pub max_disk_percent: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_errors: 10,
            error_window_minutes: 5,
            max_avg_response_time_ms: 5000.0,
            max_p95_response_time_ms: 10000.0,
            max_memory_percent: 85.0,
            max_disk_percent: 90.0,
        }
    }
}

/// Metric a violation was raised for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ViolationMetric {
    #[serde(rename = "Error Count")]
    ErrorCount,
    #[serde(rename = "Average Response Time")]
    AverageResponseTime,
    #[serde(rename = "P95 Response Time")]
    P95ResponseTime,
    #[serde(rename = "Memory Usage")]
    MemoryUsage,
    #[serde(rename = "Disk Usage")]
    DiskUsage,
}

impl ViolationMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationMetric::ErrorCount => "Error Count",
            ViolationMetric::AverageResponseTime => "Average Response Time",
            ViolationMetric::P95ResponseTime => "P95 Response Time",
            ViolationMetric::MemoryUsage => "Memory Usage",
            ViolationMetric::DiskUsage => "Disk Usage",
        }
    }
}

impl fmt::Display for ViolationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a value relates to its threshold; every check fires on `Exceeds`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Exceeds,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("exceeds")
    }
}

/// A single metric-versus-threshold breach for one source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub metric: ViolationMetric,
    pub value: f64,
    pub threshold: f64,
    pub comparison: Comparison,
    pub unit: Option<String>,
    pub source_id: String,
}

impl Violation {
    fn exceeds(
        metric: ViolationMetric,
        value: f64,
        threshold: f64,
        unit: Option<&str>,
        source_id: &str,
    ) -> Self {
        Self {
            metric,
            value,
            threshold,
            comparison: Comparison::Exceeds,
            unit: unit.map(str::to_string),
            source_id: source_id.to_string(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.unit.as_deref().unwrap_or("");
        write!(
            f,
            "{} ({}): {:.2}{} {} threshold of {:.2}{}",
            self.metric, self.source_id, self.value, unit, self.comparison, self.threshold, unit
        )
    }
}

/// Compare finalized metrics against `config`
///
/// Checks run in a fixed order (error count, average response time, p95
/// response time, memory, disk) and any subset may fire. A check without
/// applicable data is skipped: the error count needs at least one event and
/// the sample-based checks need at least one sample. Only percent-tagged
/// memory samples take part in the memory check.
pub fn check_thresholds(
    metrics: &SourceMetrics,
    source_id: &str,
    config: &ThresholdConfig,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if metrics.total_events > 0 && metrics.error_count > config.max_errors {
        violations.push(Violation::exceeds(
            ViolationMetric::ErrorCount,
            metrics.error_count as f64,
            config.max_errors as f64,
            None,
            source_id,
        ));
    }

    if let Some(avg) = mean(&metrics.response_times) {
        if avg > config.max_avg_response_time_ms {
            violations.push(Violation::exceeds(
                ViolationMetric::AverageResponseTime,
                avg,
                config.max_avg_response_time_ms,
                Some("ms"),
                source_id,
            ));
        }

        let p95 = percentile(&metrics.response_times, 95.0);
        if p95 > config.max_p95_response_time_ms {
            violations.push(Violation::exceeds(
                ViolationMetric::P95ResponseTime,
                p95,
                config.max_p95_response_time_ms,
                Some("ms"),
                source_id,
            ));
        }
    }

    if let Some(avg) = mean(&metrics.memory_percent_samples()) {
        if avg > config.max_memory_percent {
            violations.push(Violation::exceeds(
                ViolationMetric::MemoryUsage,
                avg,
                config.max_memory_percent,
                Some("%"),
                source_id,
            ));
        }
    }

    if let Some(avg) = mean(&metrics.disk_samples) {
        if avg > config.max_disk_percent {
            violations.push(Violation::exceeds(
                ViolationMetric::DiskUsage,
                avg,
                config.max_disk_percent,
                Some("%"),
                source_id,
            ));
        }
    }

    violations
}
