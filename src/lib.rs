//! meowbah-sync - background feed sync for the Meowbah fan app
//!
//! Polls the creator's video and post feeds, picks out entries that have not
//! been seen before and hands them to a local cache or a notifier.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;
pub mod sink;
pub mod sync;
pub mod watermark;

pub use config::Config;
pub use db::Database;
pub use error::{
    Disposition, FetchError, ParseError, Result, SinkError, StoreError, SyncError,
};
pub use feed::{parse, DateFormat, FeedEntry, FeedFormat, Fetch, HttpFetcher, TagMapping};
pub use sink::{NotifySink, Sink, StoreSink};
pub use sync::{FeedPipeline, FeedUpdater, FirstRunPolicy, PassOutcome, PassReport};
pub use watermark::{select_new, ScanMode, Selection, TrackerOptions, WatermarkState, WatermarkStore};
