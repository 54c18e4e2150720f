//! Full passes over a local HTTP feed with SQLite and file-backed state.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use meowbah_sync::config::{Config, FeedConfig, SinkKind, StateBackend};
use meowbah_sync::sink::{EntryRepository, Notification, Notifier, NotifySink};
use meowbah_sync::watermark::{FileWatermarkStore, SqliteWatermarkStore};
use meowbah_sync::{
    Database, FeedFormat, FeedPipeline, FeedUpdater, FirstRunPolicy, HttpFetcher, PassOutcome,
    SinkError, StoreSink, SyncError, WatermarkStore,
};

use common::{youtube_feed, FeedServer, Reply};

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn fetcher() -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::new(&Default::default()).unwrap())
}

#[tokio::test]
async fn test_store_pipeline_caches_new_videos() {
    let server = FeedServer::start(vec![Reply::ok(youtube_feed(&[
        ("v2", "Second video", "2024-01-02T00:00:00+00:00"),
        ("v1", "First video", "2024-01-01T00:00:00+00:00"),
    ]))])
    .await;

    let db = Database::open_in_memory().await.unwrap();
    let pipeline = FeedPipeline::new(
        "videos",
        server.url("/feeds/videos.xml"),
        FeedFormat::YoutubeAtom,
        fetcher(),
        Box::new(SqliteWatermarkStore::new(db.pool().clone(), "videos")),
        Box::new(StoreSink::new(db.pool().clone(), "videos")),
    );

    let report = pipeline.run_pass().await.unwrap();
    assert_eq!(report.parsed, 2);
    assert_eq!(report.published, 2);
    assert!(report.committed);

    let repo = EntryRepository::new(db.pool());
    assert_eq!(repo.count("videos").await.unwrap(), 2);
    let cached = repo.list_recent("videos", 10).await.unwrap();
    let v2 = cached.iter().find(|e| e.identifier == "v2").unwrap();
    assert_eq!(
        v2.image_url.as_deref(),
        Some("https://i4.ytimg.com/vi/v2/hqdefault.jpg")
    );
    assert_eq!(v2.link.as_deref(), Some("https://www.youtube.com/watch?v=v2"));
    assert_eq!(v2.description.as_deref(), Some("About Second video"));
    assert_eq!(v2.title, "Second video");

    // Same document again: nothing new, nothing rewritten.
    let report = pipeline.run_pass().await.unwrap();
    assert_eq!(report.selected, 0);
    assert!(!report.committed);
    assert_eq!(repo.count("videos").await.unwrap(), 2);
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_notify_pipeline_baselines_then_notifies() {
    let server = FeedServer::start(vec![Reply::ok(youtube_feed(&[(
        "v1",
        "Old video",
        "2024-01-01T00:00:00+00:00",
    )]))])
    .await;

    let dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = FeedPipeline::new(
        "videos",
        server.url("/feeds/videos.xml"),
        FeedFormat::YoutubeAtom,
        fetcher(),
        Box::new(FileWatermarkStore::new(dir.path(), "videos")),
        Box::new(NotifySink::new("New Meowbah video!", notifier.clone())),
    )
    .with_first_run(FirstRunPolicy::Baseline);

    let report = pipeline.run_pass().await.unwrap();
    assert!(report.baselined);
    assert!(notifier.sent.lock().unwrap().is_empty());

    server.set_replies(vec![Reply::ok(youtube_feed(&[
        ("v2", "Brand new video", "2024-02-01T00:00:00+00:00"),
        ("v1", "Old video", "2024-01-01T00:00:00+00:00"),
    ]))]);

    let report = pipeline.run_pass().await.unwrap();
    assert!(!report.baselined);
    assert_eq!(report.published, 1);

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "New Meowbah video!");
    assert_eq!(sent[0].body, "Brand new video");
    assert_eq!(
        sent[0].deep_link.as_deref(),
        Some("https://www.youtube.com/watch?v=v2")
    );
    drop(sent);

    let state = FileWatermarkStore::new(dir.path(), "videos").load().await.unwrap();
    assert!(state.has_seen("v1"));
    assert!(state.has_seen("v2"));
}

#[tokio::test]
async fn test_failed_fetch_leaves_state_untouched() {
    let server = FeedServer::start(vec![Reply::status(503)]).await;
    let db = Database::open_in_memory().await.unwrap();
    let store = SqliteWatermarkStore::new(db.pool().clone(), "videos");

    let pipeline = FeedPipeline::new(
        "videos",
        server.url("/feeds/videos.xml"),
        FeedFormat::YoutubeAtom,
        fetcher(),
        Box::new(SqliteWatermarkStore::new(db.pool().clone(), "videos")),
        Box::new(StoreSink::new(db.pool().clone(), "videos")),
    );

    let err = pipeline.run_pass().await.unwrap_err();
    assert!(matches!(err, SyncError::Fetch(_)));
    assert!(store.load().await.unwrap().is_fresh());
}

#[tokio::test]
async fn test_updater_from_config_with_file_state() {
    let server = FeedServer::start(vec![Reply::ok(youtube_feed(&[(
        "v1",
        "A video",
        "2024-01-01T00:00:00+00:00",
    )]))])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("meowbah.db")).await.unwrap();

    let mut config = Config::default();
    config.state.backend = StateBackend::Files;
    config.state.dir = dir.path().join("state").to_string_lossy().into_owned();
    config
        .feeds
        .push(FeedConfig::new("videos", server.url("/videos.xml")));
    let mut alerts = FeedConfig::new("alerts", server.url("/videos.xml"));
    alerts.sink = SinkKind::Notify;
    config.feeds.push(alerts);
    config.validate().unwrap();

    let mut updater = FeedUpdater::from_config(&config, &db).unwrap();
    let outcomes = updater.run_once().await;

    assert_eq!(outcomes.len(), 2);
    match &outcomes[0] {
        PassOutcome::Completed(report) => {
            assert_eq!(report.feed, "videos");
            assert_eq!(report.published, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    match &outcomes[1] {
        PassOutcome::Completed(report) => {
            assert_eq!(report.feed, "alerts");
            assert!(report.baselined);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert!(dir.path().join("state").join("videos.json").exists());
    assert!(dir.path().join("state").join("alerts.json").exists());
    assert_eq!(
        EntryRepository::new(db.pool()).count("videos").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_updater_gives_up_on_missing_feed() {
    let server = FeedServer::start(vec![Reply::status(404)]).await;
    let db = Database::open_in_memory().await.unwrap();

    let mut updater = FeedUpdater::new();
    updater.add_feed(
        FeedPipeline::new(
            "gone",
            server.url("/gone.xml"),
            FeedFormat::Rss,
            fetcher(),
            Box::new(SqliteWatermarkStore::new(db.pool().clone(), "gone")),
            Box::new(StoreSink::new(db.pool().clone(), "gone")),
        ),
        Duration::from_secs(60),
    );

    let outcomes = updater.run_once().await;
    assert!(matches!(outcomes[0], PassOutcome::GaveUp { .. }));
    assert!(updater.status()[0].disabled);

    let outcomes = updater.run_once().await;
    assert!(matches!(outcomes[0], PassOutcome::Disabled { .. }));
    assert_eq!(server.hits(), 1);
}
