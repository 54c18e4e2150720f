//! Feed entry and format types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Atom namespace.
pub const NS_ATOM: &str = "http://www.w3.org/2005/Atom";

/// YouTube feed extension namespace (`yt:`).
pub const NS_YOUTUBE: &str = "http://www.youtube.com/xml/schemas/2015";

/// Media RSS namespace (`media:`).
pub const NS_MEDIA: &str = "http://search.yahoo.com/mrss/";

/// One item (video or post) extracted from a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Stable identifier (video ID or GUID).
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub thumbnail: Option<String>,
    /// Publish timestamp exactly as it appeared in the feed.
    pub published: String,
}

impl FeedEntry {
    /// Create an entry with only the required fields.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        published: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            link: None,
            thumbnail: None,
            published: published.into(),
        }
    }

    /// Set the link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the thumbnail URL.
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// Timestamp format used by a feed's publish dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// RFC 2822 / RFC 1123, as in RSS `pubDate`.
    Rfc2822,
    /// RFC 3339 / ISO 8601, as in Atom `published`.
    Rfc3339,
}

impl DateFormat {
    /// Parse a raw feed timestamp into UTC.
    pub fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        let parsed = match self {
            DateFormat::Rfc2822 => DateTime::parse_from_rfc2822(raw),
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(raw),
        };
        parsed.ok().map(|dt| dt.with_timezone(&Utc))
    }
}

/// Kind of syndication document a source publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedFormat {
    /// YouTube channel Atom feed with `yt:` and `media:` extensions.
    YoutubeAtom,
    /// Plain Atom 1.0.
    Atom,
    /// RSS 2.0.
    Rss,
}

impl FeedFormat {
    /// Default date format for this kind of feed.
    pub fn date_format(&self) -> DateFormat {
        match self {
            FeedFormat::YoutubeAtom | FeedFormat::Atom => DateFormat::Rfc3339,
            FeedFormat::Rss => DateFormat::Rfc2822,
        }
    }
}
