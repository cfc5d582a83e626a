//! Analysis cycle runtime
//!
//! A cycle fetches every configured source concurrently, analyzes each batch
//! on its own task, merges the results in configured source order and hands
//! the report to the alert dispatcher. A source that fails, or whose task
//! panics, contributes a synthetic analyzer error instead of aborting the
//! cycle.

use crate::alerts::{AlertCoordinator, AlertDispatcher, DispatchOutcome, LogChannel};
use crate::alerts::{NotificationChannel, WebhookChannel};
use crate::analysis::{merge_reports_at, AnalysisReport, BatchAnalyzer, SourceAnalysis};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{AlertError, ConfigError};
use crate::events::{ClassifiedError, SourceKind};
use crate::sources::{FetchWindow, RecordSource};
use chrono::Duration;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Result of one analysis cycle
#[derive(Debug)]
pub struct CycleOutcome {
    pub report: AnalysisReport,
    /// What the dispatcher did with the report
    pub alert: Result<DispatchOutcome, AlertError>,
}

/// Drives analysis cycles over a fixed set of sources
pub struct Monitor {
    sources: Vec<Arc<dyn RecordSource>>,
    analyzer: Arc<BatchAnalyzer>,
    dispatcher: AlertDispatcher,
    clock: Arc<dyn Clock>,
    max_batch_size: usize,
}

impl Monitor {
    /// Create a monitor
    ///
    /// # Arguments
    ///
    /// * `sources` - Sources analyzed each cycle; reports keep this order
    /// * `analyzer` - Shared by every per-source task
    /// * `dispatcher` - Owns the cooldown state for the monitor's lifetime
    pub fn new(
        sources: Vec<Arc<dyn RecordSource>>,
        analyzer: BatchAnalyzer,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            sources,
            analyzer: Arc::new(analyzer),
            dispatcher,
            clock: Arc::new(SystemClock),
            max_batch_size: 1000,
        }
    }

    /// Build a monitor with a log channel, plus a webhook channel when configured
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an error pattern does not compile or the
    /// webhook client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let analyzer = BatchAnalyzer::new(config.classifier()?, config.thresholds.clone())
            .with_max_message_length(config.analysis.max_message_length);

        let mut channels: Vec<Arc<dyn NotificationChannel>> = vec![Arc::new(LogChannel)];
        if let Some(url) = &config.alerts.webhook_url {
            let webhook = WebhookChannel::new(url.clone()).map_err(|e| {
                ConfigError::ValidationError(format!("cannot create webhook channel: {}", e))
            })?;
            channels.push(Arc::new(webhook));
        }

        let coordinator = AlertCoordinator::new(config.cooldown()?);
        let dispatcher = AlertDispatcher::new(coordinator, channels)
            .with_policy(config.alerts.record_policy)
            .with_max_listed_errors(config.alerts.max_listed_errors);

        Ok(Self::new(config.build_sources(), analyzer, dispatcher)
            .with_max_batch_size(config.analysis.max_batch_size))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cap the records fetched from each source per cycle
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Window ending now and spanning the configured error window
    ///
    /// A window too long to represent reaches back to the earliest timestamp.
    fn fetch_window(&self) -> FetchWindow {
        let length = i64::try_from(self.analyzer.thresholds().error_window_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .unwrap_or_else(Duration::max_value);
        FetchWindow::ending_at(self.clock.now(), length, self.max_batch_size)
    }

    fn spawn_source(
        &self,
        source: Arc<dyn RecordSource>,
        window: FetchWindow,
    ) -> JoinHandle<SourceAnalysis> {
        let analyzer = Arc::clone(&self.analyzer);
        let clock = Arc::clone(&self.clock);

        tokio::spawn(async move {
            match source.fetch(&window).await {
                Ok(records) => analyzer.analyze_batch(&records, source.id(), source.kind()),
                Err(e) => {
                    warn!("Failed to fetch records from {}: {}", source.id(), e);
                    source_failed(source.id(), source.kind(), &clock, &e.to_string())
                }
            }
        })
    }

    /// Analyze every source once and merge the results
    pub async fn analyze(&self) -> AnalysisReport {
        let window = self.fetch_window();
        info!(
            "Analyzing {} sources from {} to {}",
            self.sources.len(),
            window.start,
            window.end
        );

        let handles: Vec<(String, SourceKind, JoinHandle<SourceAnalysis>)> = self
            .sources
            .iter()
            .map(|source| {
                (
                    source.id().to_string(),
                    source.kind(),
                    self.spawn_source(Arc::clone(source), window),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (source_id, kind, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Analysis task for {} did not complete: {}", source_id, e);
                    source_failed(
                        &source_id,
                        kind,
                        &self.clock,
                        &format!("analysis task failed: {}", e),
                    )
                }
            };
            results.push(result);
        }

        let report = merge_reports_at(results, self.clock.now());
        info!(
            "Analysis complete: {} errors, {} threshold violations across {} sources",
            report.summary.total_errors,
            report.summary.total_violations,
            report.summary.sources_analyzed()
        );
        report
    }

    /// Run one full cycle: analyze, then alert on the findings
    ///
    /// A delivery failure is logged and returned in the outcome; it never
    /// discards the report.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let report = self.analyze().await;
        let alert = self.dispatcher.dispatch_report(&report).await;
        if let Err(e) = &alert {
            error!("Failed to deliver analysis alert: {}", e);
        }
        CycleOutcome { report, alert }
    }

    /// Run cycles every `interval` until `shutdown` flips to `true` or its
    /// sender is dropped
    ///
    /// # Returns
    ///
    /// The number of cycles that ran.
    pub async fn watch(
        &self,
        interval: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> usize {
        let mut cycles = 0;
        loop {
            self.run_cycle().await;
            cycles += 1;

            if *shutdown.borrow() {
                break;
            }
            let sender_gone = tokio::select! {
                _ = tokio::time::sleep(interval) => false,
                changed = shutdown.changed() => changed.is_err(),
            };
            if sender_gone || *shutdown.borrow() {
                break;
            }
        }
        info!("Monitor stopped after {} cycles", cycles);
        cycles
    }
}

fn source_failed(
    source_id: &str,
    kind: SourceKind,
    clock: &Arc<dyn Clock>,
    reason: &str,
) -> SourceAnalysis {
    let failure = ClassifiedError::source_failure(clock.now(), source_id, reason);
    SourceAnalysis::failed(source_id, kind, failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{MockChannel, REPORT_CATEGORY};
    use crate::analysis::{ErrorClassifier, ThresholdConfig};
    use crate::clock::ManualClock;
    use crate::error::SourceError;
    use crate::events::{ErrorOrigin, LogRecord, Timestamp, ANALYZER_SOURCE_ID};
    use chrono::{TimeZone, Utc};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    type FetchFuture<'a> =
        Pin<Box<dyn Future<Output = Result<Vec<LogRecord>, SourceError>> + Send + 'a>>;

    enum Behavior {
        Records(Vec<String>),
        Delayed(std::time::Duration, Vec<String>),
        Missing,
        Panics,
    }

    struct StubSource {
        id: String,
        kind: SourceKind,
        behavior: Behavior,
        windows: Mutex<Vec<FetchWindow>>,
    }

    impl StubSource {
        fn new(id: &str, kind: SourceKind, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                kind,
                behavior,
                windows: Mutex::new(Vec::new()),
            })
        }

        fn records(&self, lines: &[String]) -> Vec<LogRecord> {
            lines
                .iter()
                .map(|line| LogRecord::new(Some(start()), line.as_str(), self.id.as_str()))
                .collect()
        }
    }

    impl RecordSource for StubSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn fetch<'a>(&'a self, window: &'a FetchWindow) -> FetchFuture<'a> {
            self.windows.lock().unwrap().push(*window);
            Box::pin(async move {
                match &self.behavior {
                    Behavior::Records(lines) => Ok(self.records(lines)),
                    Behavior::Delayed(delay, lines) => {
                        tokio::time::sleep(*delay).await;
                        Ok(self.records(lines))
                    }
                    Behavior::Missing => Err(SourceError::NotFound(self.id.clone())),
                    Behavior::Panics => panic!("source exploded"),
                }
            })
        }
    }

    fn start() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn lines(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    fn monitor(
        sources: Vec<Arc<dyn RecordSource>>,
        channel: &MockChannel,
        clock: Arc<ManualClock>,
    ) -> Monitor {
        let analyzer =
            BatchAnalyzer::new(ErrorClassifier::with_defaults(), ThresholdConfig::default())
                .with_clock(clock.clone());
        let dispatcher = AlertDispatcher::new(
            AlertCoordinator::with_clock(Duration::minutes(30), clock.clone()),
            vec![Arc::new(channel.clone())],
        );
        Monitor::new(sources, analyzer, dispatcher).with_clock(clock)
    }

    #[tokio::test]
    async fn test_cycle_analyzes_sources_and_alerts() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let api = StubSource::new(
            "api",
            SourceKind::LogGroup,
            Behavior::Records(lines(&[
                "ERROR: Database connection failed",
                "INFO: Request processed in 250ms",
                "WARN: Memory usage at 90%",
            ])),
        );
        let monitor = monitor(vec![api], &channel, clock);

        let outcome = monitor.run_cycle().await;

        assert_eq!(outcome.report.errors.len(), 1);
        assert_eq!(outcome.report.errors[0].source_id, "api");
        assert_eq!(outcome.report.violations.len(), 1);
        assert_eq!(outcome.report.summary.sources_analyzed(), 1);
        assert_eq!(outcome.alert.unwrap(), DispatchOutcome::Sent);
        assert_eq!(channel.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_source_becomes_analyzer_error() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let healthy = StubSource::new(
            "api",
            SourceKind::LogGroup,
            Behavior::Records(lines(&["INFO: ok"])),
        );
        let missing = StubSource::new("archive", SourceKind::ObjectStorage, Behavior::Missing);
        let monitor = monitor(vec![healthy, missing], &channel, clock);

        let report = monitor.analyze().await;

        assert_eq!(report.errors.len(), 1);
        let failure = &report.errors[0];
        assert_eq!(failure.source_id, ANALYZER_SOURCE_ID);
        assert_eq!(failure.origin, ErrorOrigin::Analyzer);
        assert_eq!(failure.timestamp, start());
        assert!(failure.message.contains("archive"));
        assert_eq!(report.summary.sources_analyzed(), 1);
        assert_eq!(report.summary.source_counts.get(&SourceKind::ObjectStorage), None);
    }

    #[tokio::test]
    async fn test_panicking_source_is_isolated() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let exploding = StubSource::new("bad", SourceKind::LogGroup, Behavior::Panics);
        let healthy = StubSource::new(
            "good",
            SourceKind::LogGroup,
            Behavior::Records(lines(&["FATAL: disk gone"])),
        );
        let monitor = monitor(vec![exploding, healthy], &channel, clock);

        let report = monitor.analyze().await;

        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].source_id, ANALYZER_SOURCE_ID);
        assert!(report.errors[0].message.contains("bad"));
        assert_eq!(report.errors[1].source_id, "good");
    }

    #[tokio::test]
    async fn test_results_keep_configured_order() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let slow = StubSource::new(
            "slow",
            SourceKind::LogGroup,
            Behavior::Delayed(
                std::time::Duration::from_millis(50),
                lines(&["ERROR: slow one"]),
            ),
        );
        let fast = StubSource::new(
            "fast",
            SourceKind::LogGroup,
            Behavior::Records(lines(&["ERROR: fast one"])),
        );
        let monitor = monitor(vec![slow, fast], &channel, clock);

        let report = monitor.analyze().await;

        let ids: Vec<&str> = report.errors.iter().map(|e| e.source_id.as_str()).collect();
        assert_eq!(ids, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_sources_receive_configured_window() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let source = StubSource::new("api", SourceKind::LogGroup, Behavior::Records(Vec::new()));
        let monitor = monitor(vec![source.clone()], &channel, clock).with_max_batch_size(25);

        monitor.analyze().await;

        let windows = source.windows.lock().unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end, start());
        assert_eq!(windows[0].start, start() - Duration::minutes(5));
        assert_eq!(windows[0].max_records, 25);
    }

    #[tokio::test]
    async fn test_unbounded_window_does_not_panic() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let source = StubSource::new("api", SourceKind::LogGroup, Behavior::Records(Vec::new()));
        let thresholds = ThresholdConfig {
            error_window_minutes: 100_000_000_000_000,
            ..ThresholdConfig::default()
        };
        let analyzer = BatchAnalyzer::new(ErrorClassifier::with_defaults(), thresholds);
        let dispatcher = AlertDispatcher::new(
            AlertCoordinator::with_clock(Duration::minutes(30), clock.clone()),
            vec![Arc::new(channel.clone())],
        );
        let monitor = Monitor::new(vec![source.clone()], analyzer, dispatcher).with_clock(clock);

        monitor.analyze().await;

        let windows = source.windows.lock().unwrap();
        assert_eq!(windows[0].end, start());
        assert_eq!(windows[0].start, Timestamp::MIN_UTC);
    }

    #[test]
    fn test_from_config_rejects_huge_cooldown() {
        let mut config = Config::default();
        config.alerts.cooldown_minutes = 1_000_000_000_000_000;

        assert!(matches!(
            Monitor::from_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_quiet_cycle_sends_nothing() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let source = StubSource::new(
            "api",
            SourceKind::LogGroup,
            Behavior::Records(lines(&["INFO: all good"])),
        );
        let monitor = monitor(vec![source], &channel, clock);

        let outcome = monitor.run_cycle().await;

        assert_eq!(outcome.alert.unwrap(), DispatchOutcome::NothingToSend);
        assert_eq!(channel.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cooldown_spans_cycles() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let source = StubSource::new(
            "api",
            SourceKind::LogGroup,
            Behavior::Records(lines(&["ERROR: again"])),
        );
        let monitor = monitor(vec![source], &channel, clock.clone());

        let first = monitor.run_cycle().await;
        clock.advance(Duration::minutes(10));
        let second = monitor.run_cycle().await;
        clock.advance(Duration::minutes(25));
        let third = monitor.run_cycle().await;

        assert_eq!(first.alert.unwrap(), DispatchOutcome::Sent);
        assert_eq!(second.alert.unwrap(), DispatchOutcome::Suppressed);
        assert_eq!(third.alert.unwrap(), DispatchOutcome::Sent);
        assert_eq!(channel.call_count(), 2);
        assert!(channel.sent().iter().all(|(category, _)| category == REPORT_CATEGORY));
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_report() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::failing("broken");
        let source = StubSource::new(
            "api",
            SourceKind::LogGroup,
            Behavior::Records(lines(&["ERROR: boom"])),
        );
        let monitor = monitor(vec![source], &channel, clock);

        let outcome = monitor.run_cycle().await;

        assert!(matches!(outcome.alert, Err(AlertError::PartialDelivery { .. })));
        assert_eq!(outcome.report.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_no_sources_yields_empty_report() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let monitor = monitor(Vec::new(), &channel, clock);

        let report = monitor.analyze().await;

        assert!(!report.has_findings());
        assert_eq!(report.summary.sources_analyzed(), 0);
        assert_eq!(report.generated_at, start());
    }

    #[tokio::test]
    async fn test_watch_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let source = StubSource::new("api", SourceKind::LogGroup, Behavior::Records(Vec::new()));
        let monitor = monitor(vec![source], &channel, clock);

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let cycles = monitor
            .watch(std::time::Duration::from_secs(3600), rx)
            .await;

        assert_eq!(cycles, 1);
    }

    #[tokio::test]
    async fn test_watch_stops_when_sender_dropped() {
        let clock = Arc::new(ManualClock::new(start()));
        let channel = MockChannel::success("primary");
        let monitor = monitor(Vec::new(), &channel, clock);

        let (tx, rx) = watch::channel(false);
        drop(tx);
        let cycles = monitor
            .watch(std::time::Duration::from_secs(3600), rx)
            .await;

        assert_eq!(cycles, 1);
    }

    #[test]
    fn test_from_config_builds_sources_in_order() {
        let config = Config::from_toml_str(
            r#"
            [[sources]]
            id = "archive"
            kind = "object-storage"
            path = "/srv/archive"

            [[sources]]
            id = "api"
            kind = "log-group"
            path = "/var/log/api.jsonl"

            [alerts]
            webhook_url = "http://127.0.0.1:9/hook"
            "#,
        )
        .unwrap();

        let monitor = Monitor::from_config(&config).unwrap();
        assert_eq!(monitor.source_count(), 2);
        assert_eq!(monitor.max_batch_size, 1000);
    }
}
