//! Keyed cache for live-game context.
//!
//! Maps video segment names to replay indices, and replay indices to the
//! game summary known at that point and the insights generated for it. Each key is written atomically, so
//! concurrent writers never observe a half-updated file.

mod sqlite;

pub use sqlite::SqliteKeyedStore;

use crate::error::{DugoutError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, instrument};

const SEGMENT_PREFIX: &str = "segment:";
const SUMMARY_PREFIX: &str = "summary:";
const INSIGHT_PREFIX: &str = "insight:";

/// A string-to-string store with atomic per-key writes.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory keyed store.
#[derive(Default)]
pub struct MemoryKeyedStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(e: std::sync::PoisonError<T>) -> DugoutError {
        DugoutError::Config(format!("Failed to acquire lock: {}", e))
    }
}

#[async_trait]
impl KeyedStore for MemoryKeyedStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Segment-to-replay links and per-index game summaries.
#[derive(Clone)]
pub struct ContextStore {
    store: Arc<dyn KeyedStore>,
}

impl ContextStore {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyedStore::new()))
    }

    /// Record which replay index a video segment corresponds to.
    pub async fn link_segment(&self, segment_name: &str, index: u64) -> Result<()> {
        self.store
            .put(&format!("{}{}", SEGMENT_PREFIX, segment_name), &index.to_string())
            .await
    }

    pub async fn index_for_segment(&self, segment_name: &str) -> Result<Option<u64>> {
        let value = self
            .store
            .get(&format!("{}{}", SEGMENT_PREFIX, segment_name))
            .await?;
        value
            .map(|v| {
                v.trim().parse::<u64>().map_err(|e| {
                    DugoutError::InvalidInput(format!(
                        "Stored index for {} is not a number: {}",
                        segment_name, e
                    ))
                })
            })
            .transpose()
    }

    pub async fn put_summary(&self, index: u64, summary: &str) -> Result<()> {
        self.store
            .put(&format!("{}{}", SUMMARY_PREFIX, index), summary)
            .await
    }

    pub async fn summary(&self, index: u64) -> Result<Option<String>> {
        self.store.get(&format!("{}{}", SUMMARY_PREFIX, index)).await
    }

    /// Generated insights for a replay index, stored as JSON.
    pub async fn put_insights(&self, index: u64, insights_json: &str) -> Result<()> {
        self.store
            .put(&format!("{}{}", INSIGHT_PREFIX, index), insights_json)
            .await
    }

    pub async fn insights(&self, index: u64) -> Result<Option<String>> {
        self.store.get(&format!("{}{}", INSIGHT_PREFIX, index)).await
    }

    /// Summary for the replay position of a video segment, if both are known.
    pub async fn summary_for_segment(&self, segment_name: &str) -> Result<Option<String>> {
        match self.index_for_segment(segment_name).await? {
            Some(index) => self.summary(index).await,
            None => Ok(None),
        }
    }

    /// Load segment links from a JSON object of `segment name -> index`.
    ///
    /// Returns the number of links written.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn import_sync_file(&self, path: &Path) -> Result<usize> {
        let content = tokio::fs::read_to_string(path).await?;
        let links: HashMap<String, serde_json::Value> = serde_json::from_str(&content)?;

        let mut written = 0;
        for (name, value) in links {
            let index = match &value {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }
            .ok_or_else(|| {
                DugoutError::InvalidInput(format!("Invalid replay index for {}: {}", name, value))
            })?;
            self.link_segment(&name, index).await?;
            written += 1;
        }

        info!("Imported {} segment links", written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_segment_summary_lookup() {
        let context = ContextStore::in_memory();
        context.link_segment("segment_4.mp4", 12).await.unwrap();
        context.put_summary(12, "Yankees lead 2-1 in the 3rd.").await.unwrap();

        assert_eq!(context.index_for_segment("segment_4.mp4").await.unwrap(), Some(12));
        assert_eq!(
            context.summary_for_segment("segment_4.mp4").await.unwrap().as_deref(),
            Some("Yankees lead 2-1 in the 3rd.")
        );
        assert_eq!(context.summary_for_segment("segment_5.mp4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_replaces_value() {
        let context = ContextStore::in_memory();
        context.put_summary(1, "first").await.unwrap();
        context.put_summary(1, "second").await.unwrap();
        assert_eq!(context.summary(1).await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_insights_are_kept_apart_from_summaries() {
        let context = ContextStore::in_memory();
        context.put_insights(4, r#"{"index": 4}"#).await.unwrap();
        assert_eq!(context.insights(4).await.unwrap().as_deref(), Some(r#"{"index": 4}"#));
        assert_eq!(context.summary(4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_import_sync_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(&path, r#"{"segment_1.mp4": 3, "segment_2.mp4": "7"}"#).unwrap();

        let context = ContextStore::in_memory();
        assert_eq!(context.import_sync_file(&path).await.unwrap(), 2);
        assert_eq!(context.index_for_segment("segment_2.mp4").await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_import_rejects_bad_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(&path, r#"{"segment_1.mp4": [1]}"#).unwrap();

        let err = ContextStore::in_memory().import_sync_file(&path).await.unwrap_err();
        assert!(matches!(err, DugoutError::InvalidInput(_)));
    }
}
