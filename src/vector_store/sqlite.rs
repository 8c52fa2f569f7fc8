//! SQLite-based vector store implementation.
//!
//! Metadata predicates are compiled to a SQL `WHERE` clause; cosine similarity
//! is computed in Rust over the rows that pass it.

use super::{
    cosine_similarity, ChunkMetadata, EmbeddedChunk, IndexedGame, MetadataFilter, MetadataValue,
    SegmentDocument, VectorStore,
};
use crate::error::{DugoutError, Result};
use crate::query::Operator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS segments (
        id TEXT PRIMARY KEY,
        game_id TEXT NOT NULL,
        segment_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        time INTEGER NOT NULL,
        is_major INTEGER NOT NULL,
        homerun INTEGER NOT NULL,
        out INTEGER NOT NULL,
        source_reference TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_segments_game_id ON segments(game_id);
    CREATE INDEX IF NOT EXISTS idx_segments_time ON segments(time);
"#;

const SELECT_COLUMNS: &str = "SELECT id, game_id, segment_index, content, time, is_major, homerun, out, \
     source_reference, embedding, indexed_at FROM segments";

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets query-time readers proceed while ingestion writes.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DugoutError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn sql_operator(operator: Operator) -> &'static str {
        match operator {
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Le => "<=",
            Operator::Ge => ">=",
        }
    }

    /// Compile a filter to a `WHERE` clause and its bound values.
    fn where_clause(filter: &MetadataFilter) -> (String, Vec<Value>) {
        if filter.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut conditions = Vec::with_capacity(filter.predicates.len());
        let mut values = Vec::with_capacity(filter.predicates.len());

        for (i, predicate) in filter.predicates.iter().enumerate() {
            conditions.push(format!(
                "{} {} ?{}",
                predicate.field.column(),
                Self::sql_operator(predicate.comparison),
                i + 1
            ));
            values.push(match &predicate.value {
                MetadataValue::Number(n) => Value::Integer(*n),
                MetadataValue::Flag(b) => Value::Integer(*b as i64),
                MetadataValue::Text(s) => Value::Text(s.clone()),
            });
        }

        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<SegmentDocument> {
        let id_str: String = row.get(0)?;
        let is_major: i64 = row.get(5)?;
        let homerun: i64 = row.get(6)?;
        let out: i64 = row.get(7)?;
        let embedding_bytes: Vec<u8> = row.get(9)?;
        let indexed_at_str: String = row.get(10)?;

        Ok(SegmentDocument {
            id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
            game_id: row.get(1)?,
            segment_index: row.get(2)?,
            content: row.get(3)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            metadata: ChunkMetadata {
                time: row.get(4)?,
                is_major: is_major != 0,
                homerun: homerun != 0,
                out: out != 0,
                source_reference: row.get(8)?,
            },
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    fn query_documents(&self, filter: &MetadataFilter, order_limit: &str) -> Result<Vec<SegmentDocument>> {
        let conn = self.lock()?;
        let (where_sql, values) = Self::where_clause(filter);
        let sql = format!("{}{}{}", SELECT_COLUMNS, where_sql, order_limit);

        let mut stmt = conn.prepare(&sql)?;
        let docs = stmt.query_map(params_from_iter(values.iter()), Self::row_to_document)?;
        let result: Vec<SegmentDocument> = docs.filter_map(|d| d.ok()).collect();
        Ok(result)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn upsert_batch(&self, docs: &[SegmentDocument]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            let embedding_bytes = Self::embedding_to_bytes(&doc.embedding);

            tx.execute(
                r#"
                INSERT INTO segments
                (id, game_id, segment_index, content, time, is_major, homerun, out,
                 source_reference, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    doc.id.to_string(),
                    doc.game_id,
                    doc.segment_index,
                    doc.content,
                    doc.metadata.time,
                    doc.metadata.is_major as i64,
                    doc.metadata.homerun as i64,
                    doc.metadata.out as i64,
                    doc.metadata.source_reference,
                    embedding_bytes,
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch inserted {} segments", docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
    ) -> Result<Vec<EmbeddedChunk>> {
        let docs = self.query_documents(filter, "")?;

        let mut results: Vec<EmbeddedChunk> = docs
            .iter()
            .map(|doc| doc.to_chunk(cosine_similarity(query_embedding, &doc.embedding)))
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        debug!("Found {} matching segments", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn scan(&self, filter: &MetadataFilter, limit: usize) -> Result<Vec<EmbeddedChunk>> {
        let order_limit = format!(" ORDER BY time DESC LIMIT {}", limit);
        let docs = self.query_documents(filter, &order_limit)?;
        debug!("Scanned {} segments", docs.len());
        Ok(docs.iter().map(|doc| doc.to_chunk(0.0)).collect())
    }

    #[instrument(skip(self))]
    async fn list_games(&self) -> Result<Vec<IndexedGame>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT game_id, COUNT(*) as segment_count, MAX(time) as last_time,
                   MAX(indexed_at) as indexed_at
            FROM segments
            GROUP BY game_id
            ORDER BY indexed_at DESC
            "#,
        )?;

        let games = stmt.query_map([], |row| {
            let indexed_at_str: String = row.get(3)?;
            Ok(IndexedGame {
                game_id: row.get(0)?,
                segment_count: row.get(1)?,
                last_time: row.get(2)?,
                indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        let result: Vec<IndexedGame> = games.filter_map(|g| g.ok()).collect();
        Ok(result)
    }

    async fn is_game_indexed(&self, game_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM segments WHERE game_id = ?1",
            params![game_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
