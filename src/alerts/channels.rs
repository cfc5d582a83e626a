use crate::alerts::formatter::AlertMessage;
use crate::error::AlertError;
use crate::events::Severity;
use log::{error, info, warn};
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Trait for alert transports
pub trait NotificationChannel: Send + Sync {
    /// Short name used in logs and delivery errors
    fn name(&self) -> &str;

    /// Deliver `message` for alert `category`
    fn send<'a>(
        &'a self,
        category: &'a str,
        message: &'a AlertMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>>;
}

/// Channel that writes alerts through the application logger
///
/// Always available; useful on its own for local runs and as a record of
/// what was sent alongside other channels.
#[derive(Debug, Default)]
pub struct LogChannel;

impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn send<'a>(
        &'a self,
        category: &'a str,
        message: &'a AlertMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>> {
        Box::pin(async move {
            match message.severity {
                Severity::Critical => error!("ALERT [{}] {}", category, message.subject),
                Severity::Warning => warn!("ALERT [{}] {}", category, message.subject),
                Severity::Info => info!("ALERT [{}] {}", category, message.subject),
            }
            info!("{}", message.text_body);
            Ok(())
        })
    }
}

/// JSON body posted by [`WebhookChannel`]
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    category: &'a str,
    severity: Severity,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Channel that POSTs alerts as JSON to an HTTP endpoint
pub struct WebhookChannel {
    client: Client,
    url: String,
}

impl WebhookChannel {
    /// Create a webhook channel
    ///
    /// # Arguments
    /// * `url` - Endpoint receiving the JSON alert payload
    ///
    /// # Errors
    ///
    /// Returns `AlertError::HttpError` if the HTTP client cannot be built.
    pub fn new(url: String) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn send<'a>(
        &'a self,
        category: &'a str,
        message: &'a AlertMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = WebhookPayload {
                category,
                severity: message.severity,
                subject: &message.subject,
                text: &message.text_body,
                html: &message.html_body,
            };

            let response = self.client.post(&self.url).json(&payload).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AlertError::DeliveryFailed(format!(
                    "webhook returned {}: {}",
                    status, body
                )));
            }

            Ok(())
        })
    }
}

/// Channel for tests that records what it was asked to send
#[derive(Clone, Default)]
pub struct MockChannel {
    name: String,
    fail: bool,
    delay: Option<Duration>,
    sent: Arc<Mutex<Vec<(String, AlertMessage)>>>,
}

impl MockChannel {
    /// A channel that accepts every alert
    pub fn success(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            delay: None,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A channel that rejects every alert
    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::success(name)
        }
    }

    /// Wait `delay` before accepting or rejecting each alert
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Alerts received so far, as (category, message) pairs
    pub fn sent(&self) -> Vec<(String, AlertMessage)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl NotificationChannel for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(
        &'a self,
        category: &'a str,
        message: &'a AlertMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((category.to_string(), message.clone()));

            if self.fail {
                Err(AlertError::DeliveryFailed(format!(
                    "mock channel '{}' configured to fail",
                    self.name
                )))
            } else {
                Ok(())
            }
        })
    }
}
