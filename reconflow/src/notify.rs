//! Completion notifications.
//!
//! Delivery is best-effort: failures are logged at `warn` and never change
//! the outcome of the run.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::errors::NotifyError;
use crate::summary::RunSummary;

/// Client timeout for webhook delivery.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can announce a finished run.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers the summary.
    async fn notify(&self, summary: &RunSummary) -> Result<(), NotifyError>;
}

/// Posts the summary as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    endpoint: String,
    client: Client,
}

impl WebhookNotifier {
    /// Creates a notifier for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error for a blank endpoint or if the HTTP client cannot be
    /// built.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, NotifyError> {
        let endpoint = endpoint.into().trim().to_string();
        if endpoint.is_empty() {
            return Err(NotifyError::EmptyEndpoint);
        }

        let client = Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self { endpoint, client })
    }

    /// The endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        debug!(endpoint = %self.endpoint, "Posting run summary");
        self.client
            .post(&self.endpoint)
            .json(&summary.notification_payload())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// What happened to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// No endpoint was configured.
    Skipped,
    /// The endpoint accepted the notification.
    Delivered,
    /// Delivery failed; the error was logged.
    Failed(String),
}

/// Sends the summary through `notifier`, logging instead of failing.
pub async fn deliver(notifier: &dyn Notifier, summary: &RunSummary) -> NotifyOutcome {
    match notifier.notify(summary).await {
        Ok(()) => {
            info!(target_domain = %summary.target, "Notification delivered");
            NotifyOutcome::Delivered
        }
        Err(e) => {
            warn!(error = %e, "Notification failed");
            NotifyOutcome::Failed(e.to_string())
        }
    }
}

/// Notifies `endpoint` if one was supplied and is not blank.
pub async fn dispatch(endpoint: Option<&str>, summary: &RunSummary) -> NotifyOutcome {
    let Some(endpoint) = endpoint.map(str::trim).filter(|e| !e.is_empty()) else {
        return NotifyOutcome::Skipped;
    };

    match WebhookNotifier::new(endpoint) {
        Ok(notifier) => deliver(&notifier, summary).await,
        Err(e) => {
            warn!(error = %e, "Notification failed");
            NotifyOutcome::Failed(e.to_string())
        }
    }
}
