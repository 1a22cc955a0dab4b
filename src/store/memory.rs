//! In-memory summary store implementation.
//!
//! Useful for testing and one-off runs.

use super::{matches, sort_recent_first, CatalogEntry, Persisted, SummaryKey, SummaryRecord, SummaryStore};
use crate::error::{RecapError, Result};
use crate::source::VideoMetadata;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    videos: HashMap<String, VideoMetadata>,
    summaries: HashMap<SummaryKey, SummaryRecord>,
}

impl State {
    fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<CatalogEntry> = self
            .summaries
            .values()
            .map(|summary| CatalogEntry {
                video: self
                    .videos
                    .get(&summary.video_id)
                    .cloned()
                    .unwrap_or_else(|| VideoMetadata::unknown(summary.video_id.clone())),
                summary: summary.clone(),
            })
            .collect();
        sort_recent_first(&mut entries);
        entries
    }
}

/// In-memory summary store.
pub struct MemorySummaryStore {
    state: RwLock<State>,
}

impl MemorySummaryStore {
    /// Create a new in-memory summary store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| RecapError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| RecapError::Store(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemorySummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn lookup(&self, key: &SummaryKey) -> Result<Option<SummaryRecord>> {
        Ok(self.read()?.summaries.get(key).cloned())
    }

    async fn persist(&self, video: &VideoMetadata, record: &SummaryRecord) -> Result<Persisted> {
        let mut state = self.write()?;
        state.videos.insert(video.video_id.clone(), video.clone());

        let key = record.key();
        if state.summaries.contains_key(&key) {
            return Ok(Persisted::AlreadyExists);
        }
        state.summaries.insert(key, record.clone());
        Ok(Persisted::Created)
    }

    async fn get(&self, key: &SummaryKey) -> Result<Option<CatalogEntry>> {
        let state = self.read()?;
        Ok(state.summaries.get(key).map(|summary| CatalogEntry {
            video: state
                .videos
                .get(&summary.video_id)
                .cloned()
                .unwrap_or_else(|| VideoMetadata::unknown(summary.video_id.clone())),
            summary: summary.clone(),
        }))
    }

    async fn list(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.read()?.entries())
    }

    async fn search(&self, query: &str, tags: &BTreeSet<String>) -> Result<Vec<CatalogEntry>> {
        Ok(self
            .read()?
            .entries()
            .into_iter()
            .filter(|e| matches(e, query, tags))
            .collect())
    }

    async fn update_tags(&self, key: &SummaryKey, tags: BTreeSet<String>) -> Result<SummaryRecord> {
        let mut state = self.write()?;
        let record = state
            .summaries
            .get_mut(key)
            .ok_or_else(|| RecapError::NotFound(format!("no summary for {}", key)))?;
        record.tags = tags;
        Ok(record.clone())
    }

    async fn delete_video(&self, video_id: &str) -> Result<usize> {
        let mut state = self.write()?;
        let before = state.summaries.len();
        state.summaries.retain(|key, _| key.video_id != video_id);
        let removed = before - state.summaries.len();

        if state.videos.remove(video_id).is_none() && removed == 0 {
            return Err(RecapError::NotFound(format!("no video {}", video_id)));
        }
        Ok(removed)
    }

    async fn get_video(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        Ok(self.read()?.videos.get(video_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::normalize_tags;
    use crate::store::tests::{record, video};

    #[tokio::test]
    async fn test_round_trip_and_idempotence() {
        let store = MemorySummaryStore::new();
        let meta = video("abc123", "Title", "Channel");
        let rec = record("abc123", "Summary.", &["x"], 0);

        assert_eq!(store.persist(&meta, &rec).await.unwrap(), Persisted::Created);
        assert_eq!(store.persist(&meta, &rec).await.unwrap(), Persisted::AlreadyExists);
        assert_eq!(store.lookup(&rec.key()).await.unwrap(), Some(rec.clone()));
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(store.get(&rec.key()).await.unwrap().unwrap().video, meta);
    }

    #[tokio::test]
    async fn test_search_and_tags() {
        let store = MemorySummaryStore::new();
        store
            .persist(&video("a", "Cooking pasta", "Chef"), &record("a", "Boil water.", &["food"], 5))
            .await
            .unwrap();
        store
            .persist(&video("b", "Pasta history", "Historian"), &record("b", "Ancient Rome.", &[], 1))
            .await
            .unwrap();

        let found = store.search("PASTA", &BTreeSet::new()).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].video.video_id, "b");

        let key = found[0].summary.key();
        store.update_tags(&key, normalize_tags(["food"])).await.unwrap();
        let tagged = store.search("", &normalize_tags(["food"])).await.unwrap();
        assert_eq!(tagged.len(), 2);

        assert_eq!(store.delete_video("a").await.unwrap(), 1);
        assert!(store.get_video("a").await.unwrap().is_none());
        assert!(matches!(store.delete_video("a").await, Err(RecapError::NotFound(_))));
    }
}
