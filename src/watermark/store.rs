//! Persistence of [`WatermarkState`].
//!
//! Every store instance is bound to a single namespace (one per feed), so a
//! pipeline can only ever touch its own state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::WatermarkState;
use crate::error::StoreError;

/// Durable per-namespace watermark state.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Namespace this store reads and writes.
    fn namespace(&self) -> &str;

    /// Load the state, empty when nothing was ever committed.
    async fn load(&self) -> Result<WatermarkState, StoreError>;

    /// Replace the stored state in a single atomic write.
    async fn commit(&self, state: &WatermarkState) -> Result<(), StoreError>;
}

/// Watermark state kept in the `watermarks` table.
pub struct SqliteWatermarkStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteWatermarkStore {
    pub fn new(pool: SqlitePool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl WatermarkStore for SqliteWatermarkStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn load(&self) -> Result<WatermarkState, StoreError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT state FROM watermarks WHERE namespace = ?")
                .bind(&self.namespace)
                .fetch_optional(&self.pool)
                .await?;

        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(WatermarkState::default()),
        }
    }

    async fn commit(&self, state: &WatermarkState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        sqlx::query(
            r#"
            INSERT INTO watermarks (namespace, state, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(namespace) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.namespace)
        .bind(&json)
        .execute(&self.pool)
        .await?;

        debug!(namespace = %self.namespace, seen = state.seen.len(), "Committed watermark");
        Ok(())
    }
}

/// Watermark state kept as one JSON file per namespace.
pub struct FileWatermarkStore {
    path: PathBuf,
    namespace: String,
}

impl FileWatermarkStore {
    pub fn new(dir: impl AsRef<Path>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let path = dir.as_ref().join(format!("{}.json", file_stem(&namespace)));
        Self { path, namespace }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Map a namespace onto a safe file name.
///
/// Distinct namespaces always map to distinct names: anything outside
/// `[A-Za-z0-9_-]` is written as `%XX` per UTF-8 byte.
fn file_stem(namespace: &str) -> String {
    let mut stem = String::with_capacity(namespace.len());
    for byte in namespace.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn load(&self) -> Result<WatermarkState, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(WatermarkState::default()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn commit(&self, state: &WatermarkState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(namespace = %self.namespace, path = ?self.path, "Committed watermark");
        Ok(())
    }
}

/// In-process store; clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryWatermarkStore {
    namespace: String,
    state: Arc<Mutex<WatermarkState>>,
}

impl MemoryWatermarkStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            state: Arc::default(),
        }
    }

    pub fn with_state(self, state: WatermarkState) -> Self {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
        self
    }

    /// Current state, for inspection.
    pub fn snapshot(&self) -> WatermarkState {
        self.state
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn load(&self) -> Result<WatermarkState, StoreError> {
        self.state
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn commit(&self, state: &WatermarkState) -> Result<(), StoreError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        *guard = state.clone();
        Ok(())
    }
}
