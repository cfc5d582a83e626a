use crate::analysis::batch::SourceAnalysis;
use crate::analysis::metrics::SourceMetrics;
use crate::analysis::thresholds::Violation;
use crate::events::{ClassifiedError, SourceKind, Timestamp};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Counts summarising one analysis run
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReportSummary {
    pub total_errors: usize,
    pub total_violations: usize,
    /// Distinct sources that produced metrics, per source kind
    pub source_counts: BTreeMap<SourceKind, usize>,
    /// Occurrences per HTTP status code over every source
    pub status_codes: BTreeMap<String, usize>,
}

impl ReportSummary {
    /// Distinct sources that produced metrics, over all kinds
    pub fn sources_analyzed(&self) -> usize {
        self.source_counts.values().sum()
    }
}

/// Finalized metrics of one source that was read successfully
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceReport {
    pub source_id: String,
    pub kind: SourceKind,
    pub metrics: SourceMetrics,
}

/// Combined result of one run over every monitored source
///
/// Errors, violations and per-source metrics keep source order, then record
/// order; nothing is re-sorted by time.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub errors: Vec<ClassifiedError>,
    pub violations: Vec<Violation>,
    pub sources: Vec<SourceReport>,
    pub summary: ReportSummary,
    pub generated_at: Timestamp,
}

impl AnalysisReport {
    /// Whether the run found anything worth alerting on
    pub fn has_findings(&self) -> bool {
        !self.errors.is_empty() || !self.violations.is_empty()
    }
}

/// Merge per-source results into one report stamped with the current time
pub fn merge_reports(results: Vec<SourceAnalysis>) -> AnalysisReport {
    merge_reports_at(results, Utc::now())
}

/// Merge per-source results into one report stamped with `generated_at`
pub fn merge_reports_at(results: Vec<SourceAnalysis>, generated_at: Timestamp) -> AnalysisReport {
    let mut errors = Vec::new();
    let mut violations = Vec::new();
    let mut sources = Vec::new();
    let mut contributing: BTreeSet<(SourceKind, String)> = BTreeSet::new();
    let mut status_codes = BTreeMap::new();

    for result in results {
        if let Some(metrics) = result.metrics {
            for (code, count) in &metrics.status_codes {
                *status_codes.entry(code.clone()).or_insert(0) += count;
            }
            contributing.insert((result.kind, result.source_id.clone()));
            sources.push(SourceReport {
                source_id: result.source_id,
                kind: result.kind,
                metrics,
            });
        }
        errors.extend(result.errors);
        violations.extend(result.violations);
    }

    let mut source_counts = BTreeMap::new();
    for (kind, _) in &contributing {
        *source_counts.entry(*kind).or_insert(0) += 1;
    }

    let summary = ReportSummary {
        total_errors: errors.len(),
        total_violations: violations.len(),
        source_counts,
        status_codes,
    };

    AnalysisReport {
        errors,
        violations,
        sources,
        summary,
        generated_at,
    }
}
