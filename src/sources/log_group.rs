use crate::error::SourceError;
use crate::events::{LogRecord, SourceKind};
use crate::sources::{FetchWindow, RecordSource};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// One event as exported from a log group
#[derive(Debug, Deserialize)]
struct LogGroupEvent {
    /// Milliseconds since the Unix epoch
    timestamp: i64,
    message: String,
}

/// Log-group source reading an exported event stream
///
/// The file holds one JSON object per line with an epoch-millisecond
/// `timestamp` and a `message`. Only events inside the fetch window are
/// returned, oldest first, capped at the window's record limit. Malformed
/// lines are skipped.
#[derive(Debug, Clone)]
pub struct LogGroupSource {
    id: String,
    path: PathBuf,
}

impl LogGroupSource {
    /// Create a log-group source
    ///
    /// # Example
    ///
    /// ```
    /// use logwarden::sources::{LogGroupSource, RecordSource};
    ///
    /// let source = LogGroupSource::new("api", "/var/log/api/events.jsonl");
    /// assert_eq!(source.id(), "api");
    /// ```
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// Parse an exported event stream into records within `window`
    fn parse_events(&self, content: &str, window: &FetchWindow) -> Vec<LogRecord> {
        let mut records: Vec<LogRecord> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<LogGroupEvent>(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!("Skipping malformed event in {}: {}", self.id, e);
                    None
                }
            })
            .filter_map(|event| {
                let timestamp = DateTime::<Utc>::from_timestamp_millis(event.timestamp)?;
                window
                    .contains(timestamp)
                    .then(|| LogRecord::new(Some(timestamp), event.message, self.id.clone()))
            })
            .collect();

        records.sort_by_key(|record| record.timestamp);
        records.truncate(window.max_records);
        records
    }
}

impl RecordSource for LogGroupSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::LogGroup
    }

    fn fetch<'a>(
        &'a self,
        window: &'a FetchWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if !tokio::fs::try_exists(&self.path).await? {
                return Err(SourceError::NotFound(self.path.display().to_string()));
            }

            let content = tokio::fs::read_to_string(&self.path).await?;
            let records = self.parse_events(&content, window);

            info!(
                "Fetched {} events from log group {}",
                records.len(),
                self.id
            );
            Ok(records)
        })
    }
}
