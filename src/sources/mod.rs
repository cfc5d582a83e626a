//! Record sources feeding the analyzer
//!
//! A source turns one monitored origin into a batch of [`LogRecord`]s for a
//! time window. Retrieval failures stay scoped to the source that raised them.

/// Log-group source backed by a JSON-lines event file
pub mod log_group;

/// Object-storage source backed by a directory of log files
pub mod object_store;

pub use log_group::LogGroupSource;
pub use object_store::ObjectStoreSource;

use crate::error::SourceError;
use crate::events::{LogRecord, SourceKind, Timestamp};
use chrono::Duration;
use std::future::Future;
use std::pin::Pin;

/// Time window and size cap for one fetch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchWindow {
    pub start: Timestamp,
    pub end: Timestamp,
    /// Maximum number of records returned
    pub max_records: usize,
}

impl FetchWindow {
    /// Window of `length` ending at `end`, clamped to the earliest timestamp
    pub fn ending_at(end: Timestamp, length: Duration, max_records: usize) -> Self {
        Self {
            start: end
                .checked_sub_signed(length)
                .unwrap_or(Timestamp::MIN_UTC),
            end,
            max_records,
        }
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Trait for collaborators that supply log records
pub trait RecordSource: Send + Sync {
    /// Identifier of the monitored origin
    fn id(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Fetch the records that fall into `window`
    fn fetch<'a>(
        &'a self,
        window: &'a FetchWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>, SourceError>> + Send + 'a>>;
}
