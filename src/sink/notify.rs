//! "New upload" notifications.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use super::Sink;
use crate::error::{SinkError, SyncError};
use crate::feed::FeedEntry;

/// Default timeout for webhook delivery.
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// A user-facing notification about one new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Identifier of the entry, for in-app deep links.
    pub entry_id: String,
    /// Where tapping the notification should lead.
    pub deep_link: Option<String>,
    pub thumbnail: Option<String>,
}

impl Notification {
    pub fn for_entry(title: impl Into<String>, entry: &FeedEntry) -> Self {
        Self {
            title: title.into(),
            body: entry.title.clone(),
            entry_id: entry.id.clone(),
            deep_link: entry.link.clone(),
            thumbnail: entry.thumbnail.clone(),
        }
    }
}

/// Delivery channel for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), SinkError>;
}

/// Emits notifications as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        info!(
            target: "notify",
            title = %notification.title,
            body = %notification.body,
            entry_id = %notification.entry_id,
            deep_link = notification.deep_link.as_deref().unwrap_or(""),
            thumbnail = notification.thumbnail.as_deref().unwrap_or(""),
            "New entry"
        );
        Ok(())
    }
}

/// Posts notifications as JSON to a webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> crate::Result<Self> {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create webhook client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;

        response
            .error_for_status_ref()
            .map_err(|e| SinkError::Delivery(format!("webhook HTTP error: {e}")))?;
        Ok(())
    }
}

/// Sink that turns each new entry into a notification.
pub struct NotifySink {
    title: String,
    notifier: Arc<dyn Notifier>,
}

impl NotifySink {
    /// `title` is the notification headline, e.g. "New Meowbah video!".
    pub fn new(title: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            title: title.into(),
            notifier,
        }
    }
}

#[async_trait]
impl Sink for NotifySink {
    fn name(&self) -> &str {
        "notify"
    }

    async fn publish(&self, entry: &FeedEntry) -> Result<(), SinkError> {
        let notification = Notification::for_entry(self.title.clone(), entry);
        self.notifier.notify(&notification).await
    }
}
