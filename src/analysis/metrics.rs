//! Metric extraction from free-text log messages
//!
//! Logs rarely carry structured fields, so numeric signals are pulled out of
//! the message text with a handful of regular expressions. Extraction is best
//! effort: a message that matches nothing simply contributes nothing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static RESPONSE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:duration|time|elapsed)[\s:=]*(\d+(?:\.\d+)?)\s*(?:milliseconds|ms)\b")
        .expect("response time regex is valid")
});

static MEMORY_USAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)memory\D{0,40}?(\d+(?:\.\d+)?)\s*(%|mb\b|gb\b)")
        .expect("memory usage regex is valid")
});

static DISK_USAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)disk\D{0,40}?(\d+(?:\.\d+)?)\s*%").expect("disk usage regex is valid")
});

static STATUS_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([1-5]\d{2})\b").expect("status code regex is valid"));

/// Unit a memory figure was reported in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MemoryUnit {
    Megabytes,
    Gigabytes,
    Percent,
}

impl MemoryUnit {
    fn parse(unit: &str) -> Option<Self> {
        match unit.to_ascii_lowercase().as_str() {
            "mb" => Some(MemoryUnit::Megabytes),
            "gb" => Some(MemoryUnit::Gigabytes),
            "%" => Some(MemoryUnit::Percent),
            _ => None,
        }
    }
}

/// One memory figure together with the unit it was logged in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MemorySample {
    pub value: f64,
    pub unit: MemoryUnit,
}

impl MemorySample {
    pub fn percent(value: f64) -> Self {
        Self {
            value,
            unit: MemoryUnit::Percent,
        }
    }
}

/// Finalized metrics for one source
///
/// Produced by [`MetricAccumulator::finish`] once every record of the source
/// has been seen; nothing mutates it afterwards. Threshold evaluation only
/// ever reads this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceMetrics {
    pub total_events: usize,
    pub error_count: usize,
    /// Response times in milliseconds, in record order
    pub response_times: Vec<f64>,
    pub memory_samples: Vec<MemorySample>,
    /// Disk usage percentages, in record order
    pub disk_samples: Vec<f64>,
    /// Occurrences per HTTP status code
    pub status_codes: BTreeMap<String, usize>,
}

impl SourceMetrics {
    /// Memory samples that were logged as a percentage
    pub fn memory_percent_samples(&self) -> Vec<f64> {
        self.memory_samples
            .iter()
            .filter(|sample| sample.unit == MemoryUnit::Percent)
            .map(|sample| sample.value)
            .collect()
    }
}

/// Per-source mutable metric state, fed one record at a time
///
/// Sample sequences only ever grow. Call [`finish`](Self::finish) to obtain
/// the read-only [`SourceMetrics`] once the source is exhausted.
#[derive(Debug, Default)]
pub struct MetricAccumulator {
    metrics: SourceMetrics,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one processed record
    pub fn record_event(&mut self) {
        self.metrics.total_events += 1;
    }

    /// Count one classified error
    pub fn record_error(&mut self) {
        self.metrics.error_count += 1;
    }

    pub fn push_response_time(&mut self, millis: f64) {
        self.metrics.response_times.push(millis);
    }

    pub fn push_memory(&mut self, sample: MemorySample) {
        self.metrics.memory_samples.push(sample);
    }

    pub fn push_disk(&mut self, percent: f64) {
        self.metrics.disk_samples.push(percent);
    }

    pub fn count_status(&mut self, code: &str) {
        *self
            .metrics
            .status_codes
            .entry(code.to_string())
            .or_insert(0) += 1;
    }

    /// Read-only view of what has been accumulated so far
    pub fn snapshot(&self) -> &SourceMetrics {
        &self.metrics
    }

    /// Finalize the accumulator; no further samples can be added
    pub fn finish(self) -> SourceMetrics {
        self.metrics
    }
}

/// Scan `message` for embedded metrics and add whatever is found to `accumulator`
///
/// The extractions are independent: one message may contribute a response
/// time, a memory sample, a disk sample and a status code at once.
pub fn extract_metrics(message: &str, accumulator: &mut MetricAccumulator) {
    if let Some(millis) = RESPONSE_TIME
        .captures(message)
        .and_then(|caps| caps[1].parse::<f64>().ok())
    {
        accumulator.push_response_time(millis);
    }

    if let Some(caps) = MEMORY_USAGE.captures(message) {
        if let (Ok(value), Some(unit)) = (caps[1].parse::<f64>(), MemoryUnit::parse(&caps[2])) {
            accumulator.push_memory(MemorySample { value, unit });
        }
    }

    if let Some(percent) = DISK_USAGE
        .captures(message)
        .and_then(|caps| caps[1].parse::<f64>().ok())
    {
        accumulator.push_disk(percent);
    }

    if let Some(caps) = STATUS_CODE.captures(message) {
        accumulator.count_status(&caps[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(message: &str) -> SourceMetrics {
        let mut accumulator = MetricAccumulator::new();
        extract_metrics(message, &mut accumulator);
        accumulator.finish()
    }

    #[test]
    fn test_response_time_with_colon() {
        let metrics = extract("Request completed with duration: 1234.5ms");
        assert_eq!(metrics.response_times, vec![1234.5]);
    }

    #[test]
    fn test_response_time_variants() {
        assert_eq!(extract("elapsed=250 ms").response_times, vec![250.0]);
        assert_eq!(
            extract("Response TIME 42 milliseconds").response_times,
            vec![42.0]
        );
        assert_eq!(extract("response_time=17ms").response_times, vec![17.0]);
    }

    #[test]
    fn test_timeout_is_not_a_response_time() {
        let metrics = extract("ERROR: Database connection failed after 30s timeout");
        assert!(metrics.response_times.is_empty());
    }

    #[test]
    fn test_memory_keeps_unit() {
        let percent = extract("WARN: Memory usage at 90% of heap");
        assert_eq!(percent.memory_samples, vec![MemorySample::percent(90.0)]);

        let megabytes = extract("memory: 512MB resident");
        assert_eq!(
            megabytes.memory_samples,
            vec![MemorySample {
                value: 512.0,
                unit: MemoryUnit::Megabytes
            }]
        );

        let gigabytes = extract("Memory 1.5 GB in use");
        assert_eq!(gigabytes.memory_samples[0].unit, MemoryUnit::Gigabytes);
    }

    #[test]
    fn test_memory_percent_samples_filters_units() {
        let mut accumulator = MetricAccumulator::new();
        extract_metrics("memory at 80%", &mut accumulator);
        extract_metrics("memory at 2048 MB", &mut accumulator);
        extract_metrics("memory at 70 %", &mut accumulator);

        let metrics = accumulator.finish();
        assert_eq!(metrics.memory_samples.len(), 3);
        assert_eq!(metrics.memory_percent_samples(), vec![80.0, 70.0]);
    }

    #[test]
    fn test_disk_usage() {
        let metrics = extract("Disk usage on /var reached 93.5%");
        assert_eq!(metrics.disk_samples, vec![93.5]);
    }

    #[test]
    fn test_status_code_first_token_only() {
        let metrics = extract("GET /orders 404 then retried 200");
        assert_eq!(metrics.status_codes.get("404"), Some(&1));
        assert_eq!(metrics.status_codes.get("200"), None);
    }

    #[test]
    fn test_status_code_leading_digit_range() {
        assert!(extract("code 600 is not http").status_codes.is_empty());
        assert!(extract("took 1234 cycles").status_codes.is_empty());
        assert_eq!(extract("HTTP 503").status_codes.get("503"), Some(&1));
    }

    #[test]
    fn test_one_message_feeds_several_metrics() {
        let metrics = extract("POST /pay 500 duration: 820ms memory at 91%");
        assert_eq!(metrics.response_times, vec![820.0]);
        assert_eq!(metrics.memory_percent_samples(), vec![91.0]);
        assert_eq!(metrics.status_codes.get("500"), Some(&1));
    }

    #[test]
    fn test_plain_message_contributes_nothing() {
        let metrics = extract("INFO: Application started successfully");
        assert_eq!(metrics, SourceMetrics::default());
    }

    #[test]
    fn test_samples_accumulate_in_order() {
        let mut accumulator = MetricAccumulator::new();
        for line in ["time: 3ms", "time: 1ms", "time: 2ms"] {
            accumulator.record_event();
            extract_metrics(line, &mut accumulator);
        }
        assert_eq!(accumulator.snapshot().total_events, 3);

        let metrics = accumulator.finish();
        assert_eq!(metrics.response_times, vec![3.0, 1.0, 2.0]);
    }
}
