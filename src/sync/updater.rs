//! Background scheduler for feed pipelines.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::{interval, Duration, Instant};
use tracing::{debug, error, info, warn};

use super::pipeline::{FeedPipeline, PassReport};
use crate::config::{Config, FeedConfig, SinkKind, StateBackend};
use crate::db::Database;
use crate::error::Disposition;
use crate::feed::{Fetch, HttpFetcher};
use crate::sink::{LogNotifier, Notifier, NotifySink, Sink, StoreSink, WebhookNotifier};
use crate::watermark::{
    FileWatermarkStore, SqliteWatermarkStore, TrackerOptions, WatermarkStore,
};
use crate::Result;

/// Default update check interval in seconds.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// Default number of retryable failures in a row before a feed is disabled.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Result of running one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassReport),
    /// The pass failed and will be retried on the next occurrence.
    Retry { feed: String, error: String },
    /// The pass failed and the feed is now disabled.
    GaveUp { feed: String, error: String },
    /// The feed was already disabled and did not run.
    Disabled { feed: String },
}

impl PassOutcome {
    pub fn feed(&self) -> &str {
        match self {
            PassOutcome::Completed(report) => &report.feed,
            PassOutcome::Retry { feed, .. }
            | PassOutcome::GaveUp { feed, .. }
            | PassOutcome::Disabled { feed } => feed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PassOutcome::Completed(_))
    }
}

/// Scheduling state of one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedStatus {
    pub name: String,
    pub consecutive_errors: u32,
    pub disabled: bool,
    pub last_error: Option<String>,
}

struct ScheduledFeed {
    pipeline: FeedPipeline,
    interval: Duration,
    last_run: Option<Instant>,
    consecutive_errors: u32,
    disabled: bool,
    last_error: Option<String>,
}

impl ScheduledFeed {
    fn is_due(&self, now: Instant) -> bool {
        !self.disabled
            && self
                .last_run
                .map_or(true, |last| now.duration_since(last) >= self.interval)
    }
}

/// Runs every configured feed on its own interval, one pass at a time.
pub struct FeedUpdater {
    feeds: Vec<ScheduledFeed>,
    check_interval: Duration,
    max_consecutive_errors: u32,
}

impl FeedUpdater {
    pub fn new() -> Self {
        Self {
            feeds: Vec::new(),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }

    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.check_interval = Duration::from_secs(interval_secs);
        self
    }

    pub fn with_max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    /// Add a feed polled every `interval`.
    pub fn add_feed(&mut self, pipeline: FeedPipeline, interval: Duration) {
        self.feeds.push(ScheduledFeed {
            pipeline,
            interval,
            last_run: None,
            consecutive_errors: 0,
            disabled: false,
            last_error: None,
        });
    }

    /// Build the updater and one pipeline per configured feed.
    pub fn from_config(config: &Config, db: &Database) -> Result<Self> {
        let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(&config.fetch)?);

        let mut updater = Self::new()
            .with_interval(config.sync.check_interval_secs)
            .with_max_consecutive_errors(config.sync.max_consecutive_errors);

        for feed in &config.feeds {
            let pipeline = build_pipeline(config, feed, db, fetcher.clone())?;
            updater.add_feed(pipeline, Duration::from_secs(feed.interval_secs));
        }

        Ok(updater)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    pub fn status(&self) -> Vec<FeedStatus> {
        self.feeds
            .iter()
            .map(|feed| FeedStatus {
                name: feed.pipeline.name().to_string(),
                consecutive_errors: feed.consecutive_errors,
                disabled: feed.disabled,
                last_error: feed.last_error.clone(),
            })
            .collect()
    }

    /// Run the updater loop.
    ///
    /// Runs until every feed has been disabled.
    pub async fn run(&mut self) {
        info!(
            "Feed updater started ({} feed(s), check interval: {} seconds)",
            self.feeds.len(),
            self.check_interval.as_secs()
        );

        let mut timer = interval(self.check_interval);

        loop {
            timer.tick().await;
            self.update_due_feeds().await;

            if self.feeds.iter().all(|feed| feed.disabled) {
                warn!("All feeds are disabled, stopping updater");
                return;
            }
        }
    }

    /// Run every enabled feed once, regardless of its interval.
    pub async fn run_once(&mut self) -> Vec<PassOutcome> {
        let mut outcomes = Vec::with_capacity(self.feeds.len());
        for index in 0..self.feeds.len() {
            outcomes.push(self.run_feed(index).await);
        }
        outcomes
    }

    /// Run the feeds whose interval has elapsed.
    pub async fn update_due_feeds(&mut self) -> Vec<PassOutcome> {
        let now = Instant::now();
        let due: Vec<usize> = self
            .feeds
            .iter()
            .enumerate()
            .filter(|(_, feed)| feed.is_due(now))
            .map(|(index, _)| index)
            .collect();

        if due.is_empty() {
            debug!("No feeds due for update");
            return Vec::new();
        }

        debug!("Updating {} feed(s)", due.len());

        let mut outcomes = Vec::with_capacity(due.len());
        for index in due {
            outcomes.push(self.run_feed(index).await);
        }
        outcomes
    }

    async fn run_feed(&mut self, index: usize) -> PassOutcome {
        let max_errors = self.max_consecutive_errors;
        let feed = &mut self.feeds[index];
        let name = feed.pipeline.name().to_string();

        if feed.disabled {
            return PassOutcome::Disabled { feed: name };
        }

        feed.last_run = Some(Instant::now());

        match feed.pipeline.run_pass().await {
            Ok(report) => {
                feed.consecutive_errors = 0;
                feed.last_error = None;
                PassOutcome::Completed(report)
            }
            Err(e) => {
                let message = e.to_string();
                feed.consecutive_errors += 1;
                feed.last_error = Some(message.clone());

                match e.disposition() {
                    Disposition::GiveUp => {
                        error!(
                            "Feed {} ({}) disabled: {}",
                            name,
                            feed.pipeline.url(),
                            message
                        );
                        feed.disabled = true;
                        PassOutcome::GaveUp {
                            feed: name,
                            error: message,
                        }
                    }
                    Disposition::Retry if feed.consecutive_errors >= max_errors => {
                        warn!(
                            "Feed {} disabled after {} consecutive errors: {}",
                            name, feed.consecutive_errors, message
                        );
                        feed.disabled = true;
                        PassOutcome::GaveUp {
                            feed: name,
                            error: message,
                        }
                    }
                    Disposition::Retry => {
                        warn!("Failed to update feed {}: {}", name, message);
                        PassOutcome::Retry {
                            feed: name,
                            error: message,
                        }
                    }
                }
            }
        }
    }
}

impl Default for FeedUpdater {
    fn default() -> Self {
        Self::new()
    }
}

fn build_pipeline(
    config: &Config,
    feed: &FeedConfig,
    db: &Database,
    fetcher: Arc<dyn Fetch>,
) -> Result<FeedPipeline> {
    let store: Box<dyn WatermarkStore> = match config.state.backend {
        StateBackend::Sqlite => Box::new(SqliteWatermarkStore::new(db.pool().clone(), &feed.name)),
        StateBackend::Files => Box::new(FileWatermarkStore::new(
            PathBuf::from(&config.state.dir),
            &feed.name,
        )),
    };

    let sink: Box<dyn Sink> = match feed.sink {
        SinkKind::Store => Box::new(StoreSink::new(db.pool().clone(), &feed.name)),
        SinkKind::Notify => {
            let notifier: Arc<dyn Notifier> = match &feed.webhook_url {
                Some(url) => Arc::new(WebhookNotifier::new(url)?),
                None => Arc::new(LogNotifier),
            };
            Box::new(NotifySink::new(&feed.notify_title, notifier))
        }
    };

    let options = TrackerOptions::new(feed.effective_date_format())
        .with_scan_mode(feed.scan_mode)
        .with_seen_capacity(config.sync.seen_capacity);

    Ok(
        FeedPipeline::new(&feed.name, &feed.url, feed.format, fetcher, store, sink)
            .with_tracker_options(options)
            .with_first_run(feed.effective_first_run()),
    )
}
