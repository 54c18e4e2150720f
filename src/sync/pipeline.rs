//! One feed's fetch → parse → select → publish → commit pass.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::feed::{parse, Fetch, FeedFormat, TagMapping};
use crate::sink::Sink;
use crate::watermark::{select_new, TrackerOptions, WatermarkStore};
use crate::Result;

/// What to do with the entries found on a feed's very first pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstRunPolicy {
    /// Record everything as seen without publishing.
    Baseline,
    /// Publish everything, as on any other pass.
    PublishAll,
}

/// Summary of a completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub feed: String,
    /// Entries that survived parsing.
    pub parsed: usize,
    /// Entries the tracker considered new.
    pub selected: usize,
    /// Entries handed to the sink.
    pub published: usize,
    /// True when new entries were recorded without publishing.
    pub baselined: bool,
    /// True when the watermark was written.
    pub committed: bool,
}

/// A single feed source wired to its store and sink.
pub struct FeedPipeline {
    name: String,
    url: String,
    mapping: TagMapping,
    options: TrackerOptions,
    first_run: FirstRunPolicy,
    fetcher: Arc<dyn Fetch>,
    store: Box<dyn WatermarkStore>,
    sink: Box<dyn Sink>,
}

impl FeedPipeline {
    /// Create a pipeline using the format's default mapping and date format.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        format: FeedFormat,
        fetcher: Arc<dyn Fetch>,
        store: Box<dyn WatermarkStore>,
        sink: Box<dyn Sink>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            mapping: TagMapping::from(format),
            options: TrackerOptions::new(format.date_format()),
            first_run: FirstRunPolicy::PublishAll,
            fetcher,
            store,
            sink,
        }
    }

    pub fn with_mapping(mut self, mapping: TagMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_tracker_options(mut self, options: TrackerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_first_run(mut self, first_run: FirstRunPolicy) -> Self {
        self.first_run = first_run;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run one pass.
    ///
    /// The watermark is committed only when something new was found and
    /// every publish succeeded.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let state = self.store.load().await?;
        let first_run = state.is_fresh();

        let raw = self.fetcher.fetch(&self.url).await?;
        debug!(feed = %self.name, bytes = raw.as_bytes().len(), "Fetched feed");
        let entries = parse(raw.as_bytes(), &self.mapping)?;
        let parsed = entries.len();

        let selection = select_new(entries, &state, &self.options);
        let mut report = PassReport {
            feed: self.name.clone(),
            parsed,
            selected: selection.new.len(),
            published: 0,
            baselined: false,
            committed: false,
        };

        if selection.is_empty() {
            debug!(feed = %self.name, parsed, "No new entries");
            return Ok(report);
        }

        if first_run && self.first_run == FirstRunPolicy::Baseline {
            info!(
                feed = %self.name,
                count = report.selected,
                "First run, recording entries without publishing"
            );
            report.baselined = true;
        } else {
            for entry in &selection.new {
                self.sink.publish(entry).await?;
                report.published += 1;
            }
        }

        self.store.commit(&selection.state).await?;
        report.committed = true;

        info!(
            feed = %self.name,
            sink = self.sink.name(),
            new = report.selected,
            published = report.published,
            "Feed updated"
        );
        Ok(report)
    }
}
