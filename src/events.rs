//! Core record types shared by sources, analysis and alerting
//!
//! This module defines the data structures that flow through one analysis
//! cycle: raw log records handed over by sources, the errors classified out
//! of them, and the small enums used to tag where things came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Source id used for errors the analyzer reports about itself
pub const ANALYZER_SOURCE_ID: &str = "log-analyzer";

/// Default bound on the length of a classified error message, in characters
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 500;

/// Kind of monitored source a record was fetched from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// A streaming log group polled for events in a time window
    LogGroup,
    /// An object-storage bucket whose recent objects are read line by line
    ObjectStorage,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::LogGroup => "log-group",
            SourceKind::ObjectStorage => "object-storage",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw log line as handed over by a source
///
/// Immutable once created. The timestamp is `None` when the source did not
/// provide one and none could be extracted from the text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub timestamp: Option<Timestamp>,
    pub raw_message: String,
    pub source_id: String,
}

impl LogRecord {
    pub fn new(
        timestamp: Option<Timestamp>,
        raw_message: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            raw_message: raw_message.into(),
            source_id: source_id.into(),
        }
    }
}

/// Where a classified error originated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorOrigin {
    /// Classified from a log-group event
    LogGroup,
    /// Classified from a line of an object-storage file
    ObjectStorage,
    /// Synthesized by the analyzer itself, e.g. for a source that could not be fetched
    Analyzer,
}

impl From<SourceKind> for ErrorOrigin {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::LogGroup => ErrorOrigin::LogGroup,
            SourceKind::ObjectStorage => ErrorOrigin::ObjectStorage,
        }
    }
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ErrorOrigin::LogGroup => "log-group",
            ErrorOrigin::ObjectStorage => "object-storage",
            ErrorOrigin::Analyzer => "analyzer",
        };
        f.write_str(tag)
    }
}

/// A log record that matched at least one error pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedError {
    pub timestamp: Timestamp,
    pub source_id: String,
    /// Message text, never longer than the bound it was created with
    pub message: String,
    pub origin: ErrorOrigin,
}

impl ClassifiedError {
    /// Create a classified error, truncating the message to `max_message_length` characters
    pub fn new(
        timestamp: Timestamp,
        source_id: impl Into<String>,
        message: &str,
        origin: ErrorOrigin,
        max_message_length: usize,
    ) -> Self {
        Self {
            timestamp,
            source_id: source_id.into(),
            message: truncate_chars(message, max_message_length),
            origin,
        }
    }

    /// Synthetic error entry for a source that failed to produce records
    pub fn source_failure(timestamp: Timestamp, failed_source: &str, reason: &str) -> Self {
        let message = format!("Failed to analyze source '{}': {}", failed_source, reason);
        Self::new(
            timestamp,
            ANALYZER_SOURCE_ID,
            &message,
            ErrorOrigin::Analyzer,
            DEFAULT_MAX_MESSAGE_LENGTH,
        )
    }
}

/// Severity level for outgoing alerts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational, no action required
    Info,
    /// May require attention
    Warning,
    /// Requires immediate attention
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Keep at most `max_chars` characters of `text`
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
