/// Error types for sources, alerting and configuration
pub mod error;

/// Record and error types shared across the pipeline
pub mod events;

/// Injectable time source
pub mod clock;

/// Classification, metric extraction, thresholds and report merging
pub mod analysis;

/// Alert cooldown, formatting and delivery
pub mod alerts;

/// Log-group and object-storage record sources
pub mod sources;

/// Configuration management
pub mod config;

/// Per-cycle fan-out over sources and alert dispatch
pub mod monitor;

// Re-export commonly used types
pub use error::{AlertError, ConfigError, SourceError};
pub use monitor::{CycleOutcome, Monitor};
