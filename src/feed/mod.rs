//! Feed retrieval and parsing.
//!
//! Fetches YouTube/Atom/RSS documents over HTTP and turns them into a flat
//! list of [`FeedEntry`] values.

pub mod fetcher;
pub mod mapping;
pub mod parser;
pub mod types;

pub use fetcher::{validate_url, Fetch, HttpFetcher, RawContent};
pub use mapping::{Capture, Field, FieldRule, TagMapping, XmlName};
pub use parser::parse;
pub use types::{DateFormat, FeedEntry, FeedFormat, NS_ATOM, NS_MEDIA, NS_YOUTUBE};
