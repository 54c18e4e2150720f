//! Destinations for newly discovered entries.

pub mod notify;
pub mod store;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::feed::FeedEntry;

pub use notify::{LogNotifier, Notification, Notifier, NotifySink, WebhookNotifier};
pub use store::{CachedEntry, EntryRepository, StoreSink};

/// Receives each new entry exactly once per successful pass.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn publish(&self, entry: &FeedEntry) -> Result<(), SinkError>;
}
