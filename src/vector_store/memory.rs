//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{
    cosine_similarity, EmbeddedChunk, IndexedGame, MetadataFilter, SegmentDocument, VectorStore,
};
use crate::error::{DugoutError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory vector store.
pub struct MemoryVectorStore {
    documents: RwLock<HashMap<String, SegmentDocument>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned<T>(e: std::sync::PoisonError<T>) -> DugoutError {
        DugoutError::VectorStore(format!("Failed to acquire lock: {}", e))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, docs: &[SegmentDocument]) -> Result<usize> {
        let mut store = self.documents.write().map_err(Self::poisoned)?;
        for doc in docs {
            store.insert(doc.id.to_string(), doc.clone());
        }
        Ok(docs.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
    ) -> Result<Vec<EmbeddedChunk>> {
        let docs = self.documents.read().map_err(Self::poisoned)?;

        let mut results: Vec<EmbeddedChunk> = docs
            .values()
            .filter(|doc| filter.matches(doc))
            .map(|doc| doc.to_chunk(cosine_similarity(query_embedding, &doc.embedding)))
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        Ok(results)
    }

    async fn scan(&self, filter: &MetadataFilter, limit: usize) -> Result<Vec<EmbeddedChunk>> {
        let docs = self.documents.read().map_err(Self::poisoned)?;

        let mut matching: Vec<&SegmentDocument> =
            docs.values().filter(|doc| filter.matches(doc)).collect();
        matching.sort_by(|a, b| b.metadata.time.cmp(&a.metadata.time));

        Ok(matching
            .into_iter()
            .take(limit)
            .map(|doc| doc.to_chunk(0.0))
            .collect())
    }

    async fn list_games(&self) -> Result<Vec<IndexedGame>> {
        let docs = self.documents.read().map_err(Self::poisoned)?;

        let mut game_map: HashMap<String, IndexedGame> = HashMap::new();

        for doc in docs.values() {
            let entry = game_map
                .entry(doc.game_id.clone())
                .or_insert_with(|| IndexedGame {
                    game_id: doc.game_id.clone(),
                    segment_count: 0,
                    last_time: doc.metadata.time,
                    indexed_at: doc.indexed_at,
                });

            entry.segment_count += 1;
            entry.last_time = entry.last_time.max(doc.metadata.time);
            if doc.indexed_at > entry.indexed_at {
                entry.indexed_at = doc.indexed_at;
            }
        }

        let mut games: Vec<IndexedGame> = game_map.into_values().collect();
        games.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));

        Ok(games)
    }

    async fn is_game_indexed(&self, game_id: &str) -> Result<bool> {
        let docs = self.documents.read().map_err(Self::poisoned)?;
        Ok(docs.values().any(|d| d.game_id == game_id))
    }

    async fn document_count(&self) -> Result<usize> {
        let docs = self.documents.read().map_err(Self::poisoned)?;
        Ok(docs.len())
    }
}
