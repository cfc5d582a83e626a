/// Error classification and batch analysis
pub mod batch;
pub mod classifier;
pub mod metrics;
pub mod percentile;
pub mod report;
pub mod thresholds;
pub mod timestamp;

pub use batch::{BatchAnalyzer, SourceAnalysis};
pub use classifier::{classify, ErrorClassifier, DEFAULT_ERROR_PATTERNS};
pub use metrics::{extract_metrics, MemorySample, MemoryUnit, MetricAccumulator, SourceMetrics};
pub use percentile::{mean, percentile};
pub use report::{merge_reports, merge_reports_at, AnalysisReport, ReportSummary, SourceReport};
pub use thresholds::{check_thresholds, Comparison, ThresholdConfig, Violation, ViolationMetric};
pub use timestamp::extract_timestamp;
