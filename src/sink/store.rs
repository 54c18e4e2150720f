//! Relational cache of feed entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::Sink;
use crate::error::SinkError;
use crate::feed::FeedEntry;

/// A cached entry as stored in `feed_entries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub id: i64,
    pub feed: String,
    pub identifier: String,
    pub title: String,
    pub link: Option<String>,
    pub published_at: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct CachedEntryRow {
    id: i64,
    feed: String,
    identifier: String,
    title: String,
    link: Option<String>,
    published_at: String,
    description: Option<String>,
    image_url: Option<String>,
    fetched_at: String,
}

impl From<CachedEntryRow> for CachedEntry {
    fn from(row: CachedEntryRow) -> Self {
        CachedEntry {
            id: row.id,
            feed: row.feed,
            identifier: row.identifier,
            title: row.title,
            link: row.link,
            published_at: row.published_at,
            description: row.description,
            image_url: row.image_url,
            fetched_at: parse_datetime(&row.fetched_at).unwrap_or_else(Utc::now),
        }
    }
}

impl From<CachedEntry> for FeedEntry {
    fn from(cached: CachedEntry) -> Self {
        FeedEntry {
            id: cached.identifier,
            title: cached.title,
            description: cached.description,
            link: cached.link,
            thumbnail: cached.image_url,
            published: cached.published_at,
        }
    }
}

/// Repository for the `feed_entries` table.
pub struct EntryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EntryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an entry unless `(feed, identifier)` is already cached.
    ///
    /// Returns the new row id, or `None` when the entry already existed.
    pub async fn insert_or_ignore(
        &self,
        feed: &str,
        entry: &FeedEntry,
    ) -> Result<Option<i64>, SinkError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO feed_entries
                (feed, identifier, title, link, published_at, description, image_url)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(feed)
        .bind(&entry.id)
        .bind(&entry.title)
        .bind(&entry.link)
        .bind(&entry.published)
        .bind(&entry.description)
        .bind(&entry.thumbnail)
        .execute(self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(Some(result.last_insert_rowid()))
        } else {
            Ok(None)
        }
    }

    /// Most recently cached entries of a feed, newest pass first.
    pub async fn list_recent(&self, feed: &str, limit: i64) -> Result<Vec<CachedEntry>, SinkError> {
        let rows = sqlx::query_as::<_, CachedEntryRow>(
            r#"
            SELECT id, feed, identifier, title, link, published_at, description, image_url, fetched_at
            FROM feed_entries
            WHERE feed = ?
            ORDER BY fetched_at DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(feed)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CachedEntry::from).collect())
    }

    pub async fn count(&self, feed: &str) -> Result<i64, SinkError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_entries WHERE feed = ?")
            .bind(feed)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// Sink that caches entries for the app's lists and widgets.
pub struct StoreSink {
    pool: SqlitePool,
    feed: String,
}

impl StoreSink {
    pub fn new(pool: SqlitePool, feed: impl Into<String>) -> Self {
        Self {
            pool,
            feed: feed.into(),
        }
    }
}

#[async_trait]
impl Sink for StoreSink {
    fn name(&self) -> &str {
        "store"
    }

    async fn publish(&self, entry: &FeedEntry) -> Result<(), SinkError> {
        let inserted = EntryRepository::new(&self.pool)
            .insert_or_ignore(&self.feed, entry)
            .await?;

        match inserted {
            Some(row_id) => debug!(feed = %self.feed, id = %entry.id, row_id, "Cached entry"),
            None => debug!(feed = %self.feed, id = %entry.id, "Entry already cached"),
        }
        Ok(())
    }
}

/// Parse a datetime stored by SQLite.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}
