//! Rendering of analysis reports into alert messages

use crate::analysis::AnalysisReport;
use crate::events::{Severity, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Maximum subject length in bytes
pub const MAX_SUBJECT_LENGTH: usize = 256;

/// An alert ready to hand to notification channels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertMessage {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub severity: Severity,
}

/// Severity implied by a report: any violation is critical, errors alone a warning
pub fn report_severity(report: &AnalysisReport) -> Severity {
    if !report.violations.is_empty() {
        Severity::Critical
    } else if !report.errors.is_empty() {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Build the alert for a report, or `None` when it has nothing to report
///
/// # Arguments
///
/// * `report` - The merged analysis report
/// * `max_listed_errors` - How many classified errors to list in the bodies
pub fn format_report(report: &AnalysisReport, max_listed_errors: usize) -> Option<AlertMessage> {
    if !report.has_findings() {
        return None;
    }

    let severity = report_severity(report);
    let subject = truncate_text(
        &format!(
            "[{}] Log analysis: {} errors, {} threshold violations",
            severity, report.summary.total_errors, report.summary.total_violations
        ),
        MAX_SUBJECT_LENGTH,
    );

    Some(AlertMessage {
        subject,
        text_body: format_text_body(report, max_listed_errors),
        html_body: format_html_body(report, max_listed_errors),
        severity,
    })
}

/// Build a critical alert about the analyzer itself failing
pub fn format_failure(reason: &str, at: Timestamp) -> AlertMessage {
    let subject = truncate_text(
        &format!("[{}] Log analyzer failed: {}", Severity::Critical, reason),
        MAX_SUBJECT_LENGTH,
    );
    let text_body = format!(
        "The log analyzer failed at {}.\n\nReason: {}\n",
        at.to_rfc3339(),
        reason
    );
    let html_body = format!(
        "<html><body><h2>Log analyzer failed</h2><p>At {}</p><pre>{}</pre></body></html>",
        at.to_rfc3339(),
        escape_html(reason)
    );

    AlertMessage {
        subject,
        text_body,
        html_body,
        severity: Severity::Critical,
    }
}

fn format_text_body(report: &AnalysisReport, max_listed_errors: usize) -> String {
    let mut body = String::new();
    let summary = &report.summary;

    let _ = writeln!(body, "Log analysis report ({})", report.generated_at.to_rfc3339());
    let _ = writeln!(body, "Sources analyzed: {}", summary.sources_analyzed());
    for (kind, count) in &summary.source_counts {
        let _ = writeln!(body, "  {}: {}", kind, count);
    }
    let _ = writeln!(body, "Errors: {}", summary.total_errors);
    let _ = writeln!(body, "Threshold violations: {}", summary.total_violations);

    if !report.sources.is_empty() {
        body.push_str("\nSources:\n");
        for source in &report.sources {
            let metrics = &source.metrics;
            let _ = writeln!(
                body,
                "- {} ({}): {} records, {} errors",
                source.source_id, source.kind, metrics.total_events, metrics.error_count
            );
        }
    }

    if !summary.status_codes.is_empty() {
        body.push_str("\nStatus codes:\n");
        for (code, count) in &summary.status_codes {
            let _ = writeln!(body, "  {}: {}", code, count);
        }
    }

    if !report.violations.is_empty() {
        body.push_str("\nViolations:\n");
        for violation in &report.violations {
            let _ = writeln!(body, "- {}", violation);
        }
    }

    if !report.errors.is_empty() {
        body.push_str("\nErrors:\n");
        for error in report.errors.iter().take(max_listed_errors) {
            let _ = writeln!(
                body,
                "- [{}] {} ({}): {}",
                error.timestamp.to_rfc3339(),
                error.source_id,
                error.origin,
                error.message
            );
        }

        if report.errors.len() > max_listed_errors {
            let _ = writeln!(
                body,
                "... and {} more errors",
                report.errors.len() - max_listed_errors
            );
        }
    }

    body.trim_end().to_string()
}

fn format_html_body(report: &AnalysisReport, max_listed_errors: usize) -> String {
    let mut html = String::from("<html><body>");
    let summary = &report.summary;

    let _ = write!(
        html,
        "<h2>Log analysis report</h2><p>Generated at {}</p><ul>\
         <li>Sources analyzed: {}</li><li>Errors: {}</li><li>Threshold violations: {}</li></ul>",
        report.generated_at.to_rfc3339(),
        summary.sources_analyzed(),
        summary.total_errors,
        summary.total_violations
    );

    if !summary.status_codes.is_empty() {
        html.push_str("<h3>Status codes</h3><table><tr><th>Code</th><th>Count</th></tr>");
        for (code, count) in &summary.status_codes {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(code),
                count
            );
        }
        html.push_str("</table>");
    }

    if !report.violations.is_empty() {
        html.push_str(
            "<h3>Violations</h3><table><tr><th>Source</th><th>Metric</th>\
             <th>Value</th><th>Threshold</th></tr>",
        );
        for violation in &report.violations {
            let unit = violation.unit.as_deref().unwrap_or("");
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{:.2}{}</td><td>{:.2}{}</td></tr>",
                escape_html(&violation.source_id),
                violation.metric,
                violation.value,
                escape_html(unit),
                violation.threshold,
                escape_html(unit)
            );
        }
        html.push_str("</table>");
    }

    if !report.errors.is_empty() {
        html.push_str("<h3>Errors</h3><ul>");
        for error in report.errors.iter().take(max_listed_errors) {
            let _ = write!(
                html,
                "<li><code>{}</code> <b>{}</b>: {}</li>",
                error.timestamp.to_rfc3339(),
                escape_html(&error.source_id),
                escape_html(&error.message)
            );
        }
        html.push_str("</ul>");

        if report.errors.len() > max_listed_errors {
            let _ = write!(
                html,
                "<p>... and {} more errors</p>",
                report.errors.len() - max_listed_errors
            );
        }
    }

    html.push_str("</body></html>");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Truncate text to at most `max_length` bytes, ending with "..."
///
/// Cuts on a UTF-8 character boundary so multi-byte text never panics.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }

    let mut truncate_at = max_length.saturating_sub(3);
    while truncate_at > 0 && !text.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }

    format!("{}...", &text[..truncate_at])
}
