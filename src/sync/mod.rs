//! Feed sync passes and their scheduler.

pub mod pipeline;
pub mod updater;

pub use pipeline::{FeedPipeline, FirstRunPolicy, PassReport};
pub use updater::{
    FeedStatus, FeedUpdater, PassOutcome, DEFAULT_CHECK_INTERVAL_SECS,
    DEFAULT_MAX_CONSECUTIVE_ERRORS,
};
