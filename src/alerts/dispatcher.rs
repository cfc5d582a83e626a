use crate::alerts::channels::NotificationChannel;
use crate::alerts::cooldown::AlertCoordinator;
use crate::alerts::formatter::{format_failure, format_report, AlertMessage};
use crate::analysis::AnalysisReport;
use crate::error::AlertError;
use crate::events::Timestamp;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cooldown category for alerts about analysis findings
pub const REPORT_CATEGORY: &str = "log-analysis";

/// Cooldown category for alerts about the analyzer failing
pub const FAILURE_CATEGORY: &str = "analyzer-failure";

/// When a firing is recorded against the cooldown
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RecordPolicy {
    /// Record before any channel is tried. A failed delivery still suppresses
    /// the category for the full window, and concurrent dispatchers cannot
    /// double-fire.
    #[default]
    OnAttempt,
    /// Record only after at least one channel accepted the alert. A failed
    /// delivery is retried on the next cycle.
    OnSuccess,
}

/// What happened to one dispatch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every channel accepted the alert
    Sent,
    /// The category is cooling or another dispatch holds it; nothing was sent
    Suppressed,
    /// The report had no errors and no violations
    NothingToSend,
}

/// Gates alerts through an [`AlertCoordinator`] and fans them out to channels
///
/// Every channel is attempted even when an earlier one fails; the failure is
/// reported to the caller afterwards. Cooldown state is never rolled back on
/// failure.
pub struct AlertDispatcher {
    coordinator: AlertCoordinator,
    channels: Vec<Arc<dyn NotificationChannel>>,
    policy: RecordPolicy,
    max_listed_errors: usize,
}

impl AlertDispatcher {
    /// Create a dispatcher
    ///
    /// # Arguments
    ///
    /// * `coordinator` - Cooldown state shared for the lifetime of the process
    /// * `channels` - Transports every alert is delivered through
    pub fn new(coordinator: AlertCoordinator, channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            coordinator,
            channels,
            policy: RecordPolicy::default(),
            max_listed_errors: 10,
        }
    }

    pub fn with_policy(mut self, policy: RecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_listed_errors(mut self, max_listed_errors: usize) -> Self {
        self.max_listed_errors = max_listed_errors;
        self
    }

    pub fn coordinator(&self) -> &AlertCoordinator {
        &self.coordinator
    }

    /// Alert on a report's findings under [`REPORT_CATEGORY`]
    ///
    /// # Errors
    ///
    /// Returns `AlertError` if no channel is configured or any channel fails.
    pub async fn dispatch_report(
        &self,
        report: &AnalysisReport,
    ) -> Result<DispatchOutcome, AlertError> {
        match format_report(report, self.max_listed_errors) {
            Some(message) => self.dispatch(REPORT_CATEGORY, &message).await,
            None => {
                info!("No errors or violations found, no alert needed");
                Ok(DispatchOutcome::NothingToSend)
            }
        }
    }

    /// Alert that the analyzer itself failed, under [`FAILURE_CATEGORY`]
    ///
    /// # Errors
    ///
    /// Returns `AlertError` if no channel is configured or any channel fails.
    pub async fn dispatch_failure(
        &self,
        reason: &str,
        at: Timestamp,
    ) -> Result<DispatchOutcome, AlertError> {
        let message = format_failure(reason, at);
        self.dispatch(FAILURE_CATEGORY, &message).await
    }

    /// Deliver `message` under `category` unless the category is cooling
    ///
    /// # Errors
    ///
    /// Returns `AlertError::NoChannels` if there is nowhere to send, or
    /// `AlertError::PartialDelivery` naming each channel that failed.
    pub async fn dispatch(
        &self,
        category: &str,
        message: &AlertMessage,
    ) -> Result<DispatchOutcome, AlertError> {
        if self.channels.is_empty() {
            return Err(AlertError::NoChannels);
        }

        let failed_channels = match self.policy {
            RecordPolicy::OnAttempt => {
                if !self.coordinator.try_acquire(category) {
                    return Ok(self.suppressed(category, message));
                }
                self.deliver(category, message).await
            }
            RecordPolicy::OnSuccess => {
                let Some(reservation) = self.coordinator.try_reserve(category) else {
                    return Ok(self.suppressed(category, message));
                };
                let failed_channels = self.deliver(category, message).await;
                if failed_channels.len() < self.channels.len() {
                    reservation.commit();
                }
                failed_channels
            }
        };

        if failed_channels.is_empty() {
            info!("Sent alert '{}': {}", category, message.subject);
            Ok(DispatchOutcome::Sent)
        } else {
            Err(AlertError::PartialDelivery { failed_channels })
        }
    }

    /// Send through every channel, returning the names of those that failed
    async fn deliver(&self, category: &str, message: &AlertMessage) -> Vec<String> {
        let mut failed_channels = Vec::new();
        for channel in &self.channels {
            if let Err(e) = channel.send(category, message).await {
                error!("Failed to send alert via {}: {}", channel.name(), e);
                failed_channels.push(channel.name().to_string());
            }
        }
        failed_channels
    }

    fn suppressed(&self, category: &str, message: &AlertMessage) -> DispatchOutcome {
        info!(
            "Alert '{}' suppressed, category is cooling or already being sent: {}",
            category, message.subject
        );
        DispatchOutcome::Suppressed
    }
}
