use crate::analysis::extract_timestamp;
use crate::error::SourceError;
use crate::events::{LogRecord, SourceKind};
use crate::sources::{FetchWindow, RecordSource};
use log::{debug, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::SystemTime;

/// Object-storage source reading the most recent objects of a bucket
///
/// The bucket is a directory; each regular file in it is one object. The
/// `max_objects` most recently modified objects are read, split into lines
/// with blank lines dropped, and each line becomes a record whose timestamp
/// is extracted from its text. Records keep object order (newest object
/// first) and line order, capped at the window's record limit.
#[derive(Debug, Clone)]
pub struct ObjectStoreSource {
    id: String,
    bucket: PathBuf,
    max_objects: usize,
}

impl ObjectStoreSource {
    pub fn new(id: impl Into<String>, bucket: impl Into<PathBuf>, max_objects: usize) -> Self {
        Self {
            id: id.into(),
            bucket: bucket.into(),
            max_objects,
        }
    }

    /// List objects newest first, keeping at most `max_objects`
    async fn recent_objects(&self) -> Result<Vec<PathBuf>, SourceError> {
        let mut entries = tokio::fs::read_dir(&self.bucket).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(self.bucket.display().to_string())
            } else {
                SourceError::IoError(e)
            }
        })?;

        let mut objects: Vec<(SystemTime, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            objects.push((modified, entry.path()));
        }

        objects.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        objects.truncate(self.max_objects);
        Ok(objects.into_iter().map(|(_, path)| path).collect())
    }

    async fn read_object(&self, path: &Path) -> Result<String, SourceError> {
        let bytes = tokio::fs::read(path).await?;
        String::from_utf8(bytes).map_err(|e| {
            SourceError::Unreadable(format!("{} is not valid UTF-8: {}", path.display(), e))
        })
    }

    fn lines_to_records(&self, content: &str) -> Vec<LogRecord> {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| LogRecord::new(extract_timestamp(line), line, self.id.clone()))
            .collect()
    }
}

impl RecordSource for ObjectStoreSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ObjectStorage
    }

    fn fetch<'a>(
        &'a self,
        window: &'a FetchWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let objects = self.recent_objects().await?;
            debug!("Reading {} objects from {}", objects.len(), self.id);

            let mut records = Vec::new();
            for object in &objects {
                match self.read_object(object).await {
                    Ok(content) => records.extend(self.lines_to_records(&content)),
                    Err(e) => warn!("Skipping object {}: {}", object.display(), e),
                }
                if records.len() >= window.max_records {
                    break;
                }
            }
            records.truncate(window.max_records);

            info!(
                "Fetched {} lines from {} objects in {}",
                records.len(),
                objects.len(),
                self.id
            );
            Ok(records)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn window(max_records: usize) -> FetchWindow {
        FetchWindow::ending_at(Utc::now(), Duration::minutes(5), max_records)
    }

    fn set_modified(path: &Path, seconds_ago: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        let when = SystemTime::now() - std::time::Duration::from_secs(seconds_ago);
        file.set_modified(when).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_splits_lines_and_drops_blanks() {
        let bucket = TempDir::new().unwrap();
        let object = bucket.path().join("app.log");
        fs::write(
            &object,
            "2023/12/01 10:30:00 [INFO] ready\n\n   \n12/01/2023 10:31:00 ERROR boom\nno stamp\n",
        )
        .unwrap();

        let source = ObjectStoreSource::new("bucket", bucket.path(), 5);
        let records = source.fetch(&window(100)).await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0].timestamp,
            Some(Utc.with_ymd_and_hms(2023, 12, 1, 10, 30, 0).unwrap())
        );
        assert_eq!(
            records[1].timestamp,
            Some(Utc.with_ymd_and_hms(2023, 12, 1, 10, 31, 0).unwrap())
        );
        assert_eq!(records[2].timestamp, None);
        assert!(records.iter().all(|r| r.source_id == "bucket"));
    }

    #[tokio::test]
    async fn test_only_most_recent_objects_are_read() {
        let bucket = TempDir::new().unwrap();
        for (name, age) in [("old.log", 300), ("newer.log", 60), ("newest.log", 1)] {
            let path = bucket.path().join(name);
            fs::write(&path, format!("line from {}\n", name)).unwrap();
            set_modified(&path, age);
        }
        fs::create_dir(bucket.path().join("nested")).unwrap();

        let source = ObjectStoreSource::new("bucket", bucket.path(), 2);
        let records = source.fetch(&window(100)).await.unwrap();

        let messages: Vec<&str> = records.iter().map(|r| r.raw_message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["line from newest.log", "line from newer.log"]
        );
    }

    #[tokio::test]
    async fn test_record_cap() {
        let bucket = TempDir::new().unwrap();
        let lines: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        fs::write(bucket.path().join("big.log"), lines).unwrap();

        let source = ObjectStoreSource::new("bucket", bucket.path(), 5);
        let records = source.fetch(&window(10)).await.unwrap();

        assert_eq!(records.len(), 10);
        assert_eq!(records[9].raw_message, "line 9");
    }

    #[tokio::test]
    async fn test_unreadable_object_is_skipped() {
        let bucket = TempDir::new().unwrap();
        let binary = bucket.path().join("binary.gz");
        fs::write(&binary, [0x1f, 0x8b, 0xff, 0xfe]).unwrap();
        set_modified(&binary, 1);
        let text = bucket.path().join("text.log");
        fs::write(&text, "ERROR: still read\n").unwrap();
        set_modified(&text, 10);

        let source = ObjectStoreSource::new("bucket", bucket.path(), 5);
        let records = source.fetch(&window(100)).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_message, "ERROR: still read");
    }

    #[tokio::test]
    async fn test_empty_bucket() {
        let bucket = TempDir::new().unwrap();
        let source = ObjectStoreSource::new("bucket", bucket.path(), 5);
        assert!(source.fetch(&window(100)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_bucket_is_an_error() {
        let source = ObjectStoreSource::new("bucket", "/nonexistent/bucket", 5);
        let result = source.fetch(&window(100)).await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }
}
