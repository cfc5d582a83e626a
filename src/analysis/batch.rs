use crate::analysis::classifier::ErrorClassifier;
use crate::analysis::metrics::{extract_metrics, MetricAccumulator, SourceMetrics};
use crate::analysis::thresholds::{check_thresholds, ThresholdConfig, Violation};
use crate::clock::{Clock, SystemClock};
use crate::events::{ClassifiedError, LogRecord, SourceKind, DEFAULT_MAX_MESSAGE_LENGTH};
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of analyzing one source
///
/// `metrics` is `None` when the source could not be fetched at all; its
/// `errors` then hold the synthetic failure entry instead.
#[derive(Debug, Clone, Serialize)]
pub struct SourceAnalysis {
    pub source_id: String,
    pub kind: SourceKind,
    pub errors: Vec<ClassifiedError>,
    pub metrics: Option<SourceMetrics>,
    pub violations: Vec<Violation>,
}

impl SourceAnalysis {
    /// Analysis result for a source whose records could not be retrieved
    pub fn failed(source_id: &str, kind: SourceKind, failure: ClassifiedError) -> Self {
        Self {
            source_id: source_id.to_string(),
            kind,
            errors: vec![failure],
            metrics: None,
            violations: Vec::new(),
        }
    }
}

/// Runs classification, metric extraction and threshold evaluation over one batch
///
/// Every invocation owns a fresh [`MetricAccumulator`], so one analyzer can
/// be shared by tasks analyzing different sources concurrently.
pub struct BatchAnalyzer {
    classifier: ErrorClassifier,
    thresholds: ThresholdConfig,
    max_message_length: usize,
    clock: Arc<dyn Clock>,
}

impl BatchAnalyzer {
    pub fn new(classifier: ErrorClassifier, thresholds: ThresholdConfig) -> Self {
        Self {
            classifier,
            thresholds,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            clock: Arc::new(SystemClock),
        }
    }

    /// Bound classified error messages to `max_message_length` characters
    pub fn with_max_message_length(mut self, max_message_length: usize) -> Self {
        self.max_message_length = max_message_length;
        self
    }

    /// Use `clock` for errors whose record carries no timestamp
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Analyze `records` from one source, in input order
    ///
    /// Each record is classified and, independently, scanned for metrics. An
    /// error without a timestamp is stamped with the current time rather than
    /// dropped. Thresholds are checked once, after the last record.
    pub fn analyze_batch(
        &self,
        records: &[LogRecord],
        source_id: &str,
        kind: SourceKind,
    ) -> SourceAnalysis {
        let mut accumulator = MetricAccumulator::new();
        let mut errors = Vec::new();

        for record in records {
            accumulator.record_event();

            if self.classifier.classify(&record.raw_message) {
                let timestamp = record.timestamp.unwrap_or_else(|| self.clock.now());
                errors.push(ClassifiedError::new(
                    timestamp,
                    source_id,
                    &record.raw_message,
                    kind.into(),
                    self.max_message_length,
                ));
                accumulator.record_error();
            }

            extract_metrics(&record.raw_message, &mut accumulator);
        }

        let metrics = accumulator.finish();
        let violations = check_thresholds(&metrics, source_id, &self.thresholds);

        debug!(
            "Analyzed {} records from {}: {} errors, {} violations",
            metrics.total_events,
            source_id,
            errors.len(),
            violations.len()
        );

        SourceAnalysis {
            source_id: source_id.to_string(),
            kind,
            errors,
            metrics: Some(metrics),
            violations,
        }
    }
}
