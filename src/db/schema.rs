//! Database schema and migrations for the feed cache.
//!
//! Migrations are applied in order when the database is opened.

/// Database migrations.
///
/// Each migration is a SQL script executed once. The schema_version table
/// tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Cached feed entries
    r#"
CREATE TABLE feed_entries (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    feed          TEXT NOT NULL,           -- configured feed name
    identifier    TEXT NOT NULL,           -- videoId / guid / atom id
    title         TEXT NOT NULL,
    link          TEXT,
    published_at  TEXT NOT NULL,           -- as found in the feed
    description   TEXT,
    image_url     TEXT,
    fetched_at    TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(feed, identifier)
);

CREATE INDEX idx_feed_entries_feed ON feed_entries(feed);
CREATE INDEX idx_feed_entries_fetched_at ON feed_entries(fetched_at);
"#,
    // v2: Watermark state, one row per feed namespace
    r#"
CREATE TABLE watermarks (
    namespace     TEXT PRIMARY KEY,
    state         TEXT NOT NULL,           -- JSON encoded WatermarkState
    updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_feed_entries_migration() {
        let migration = MIGRATIONS[0];
        assert!(migration.contains("CREATE TABLE feed_entries"));
        assert!(migration.contains("identifier"));
        assert!(migration.contains("published_at"));
        assert!(migration.contains("UNIQUE(feed, identifier)"));
    }

    #[test]
    fn test_watermarks_migration() {
        let migration = MIGRATIONS[1];
        assert!(migration.contains("CREATE TABLE watermarks"));
        assert!(migration.contains("namespace     TEXT PRIMARY KEY"));
    }
}
