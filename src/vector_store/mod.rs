//! Vector store abstraction for indexed game segments.
//!
//! Provides a trait-based interface for different vector database backends,
//! with similarity search constrained by metadata predicates.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use crate::query::{EventFlag, Operator, TemporalFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serde helpers for flags encoded as the strings `"0"` / `"1"`.
///
/// Deserialization is lenient: it also accepts booleans, numbers and
/// `"true"` / `"false"`, since model-written segment files are not strict.
pub mod flag {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "1" } else { "0" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(b),
            Raw::Int(n) => Ok(n != 0),
            Raw::Float(n) => Ok(n != 0.0),
            Raw::Text(s) => parse(&s).ok_or_else(|| de::Error::custom(format!("invalid flag: {}", s))),
        }
    }

    /// Parse a textual flag.
    pub fn parse(text: &str) -> Option<bool> {
        match text.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" | "" => Some(false),
            _ => None,
        }
    }
}

/// Metadata carried by every indexed segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Elapsed game time at the end of the segment, in seconds.
    pub time: i64,
    #[serde(with = "flag")]
    pub is_major: bool,
    #[serde(with = "flag")]
    pub homerun: bool,
    #[serde(with = "flag")]
    pub out: bool,
    /// Originating segment file, used as a citation key.
    pub source_reference: String,
}

impl ChunkMetadata {
    pub fn flag(&self, flag: EventFlag) -> bool {
        match flag {
            EventFlag::IsMajor => self.is_major,
            EventFlag::Homerun => self.homerun,
            EventFlag::Out => self.out,
        }
    }
}

/// A segment returned by similarity search or a filtered scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub id: String,
    pub text: String,
    /// Similarity score (higher is better); 0 for scans.
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// A segment stored in the vector database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDocument {
    /// Unique document ID.
    pub id: Uuid,
    /// Game this segment belongs to.
    pub game_id: String,
    /// Ordinal position among the game's segments.
    pub segment_index: i64,
    /// Embedded description text.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl SegmentDocument {
    /// Create a new document.
    pub fn new(
        game_id: String,
        segment_index: i64,
        content: String,
        embedding: Vec<f32>,
        metadata: ChunkMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            segment_index,
            content,
            embedding,
            metadata,
            indexed_at: Utc::now(),
        }
    }

    /// Convert into a search result with the given score.
    pub fn to_chunk(&self, score: f32) -> EmbeddedChunk {
        EmbeddedChunk {
            id: self.id.to_string(),
            text: self.content.clone(),
            score,
            metadata: self.metadata.clone(),
        }
    }

    /// Format the segment's game time for display.
    pub fn format_time(&self) -> String {
        format_game_time(self.metadata.time)
    }
}

/// Format seconds of game time as `MM:SS` or `HH:MM:SS`.
pub fn format_game_time(seconds: i64) -> String {
    let total = seconds.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Metadata field a predicate constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Time,
    Flag(EventFlag),
    GameId,
}

impl MetadataField {
    /// Column name in the SQLite store.
    pub fn column(&self) -> &'static str {
        match self {
            MetadataField::Time => "time",
            MetadataField::Flag(flag) => flag.key(),
            MetadataField::GameId => "game_id",
        }
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Number(i64),
    Flag(bool),
    Text(String),
}

/// A single `{field, comparison, value}` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: MetadataField,
    pub comparison: Operator,
    pub value: MetadataValue,
}

impl Predicate {
    /// Evaluate against a stored document.
    pub fn matches(&self, doc: &SegmentDocument) -> bool {
        match (self.field, &self.value) {
            (MetadataField::Time, MetadataValue::Number(v)) => {
                self.comparison.compare(doc.metadata.time, *v)
            }
            (MetadataField::Flag(flag), MetadataValue::Flag(v)) => self
                .comparison
                .compare(doc.metadata.flag(flag) as i64, *v as i64),
            (MetadataField::GameId, MetadataValue::Text(v)) => match self.comparison {
                Operator::Eq => doc.game_id == *v,
                Operator::Ne => doc.game_id != *v,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Conjunction of predicates; empty means no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub predicates: Vec<Predicate>,
}

impl MetadataFilter {
    /// A filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Add a predicate on the segment time.
    pub fn time(mut self, comparison: Operator, seconds: i64) -> Self {
        self.predicates.push(Predicate {
            field: MetadataField::Time,
            comparison,
            value: MetadataValue::Number(seconds),
        });
        self
    }

    /// Add a predicate on an event flag.
    pub fn flag(mut self, flag: EventFlag, is_set: bool) -> Self {
        self.predicates.push(Predicate {
            field: MetadataField::Flag(flag),
            comparison: Operator::Eq,
            value: MetadataValue::Flag(is_set),
        });
        self
    }

    /// Restrict to one game.
    pub fn game(mut self, game_id: impl Into<String>) -> Self {
        self.predicates.push(Predicate {
            field: MetadataField::GameId,
            comparison: Operator::Eq,
            value: MetadataValue::Text(game_id.into()),
        });
        self
    }

    /// Whether a document satisfies every predicate.
    pub fn matches(&self, doc: &SegmentDocument) -> bool {
        self.predicates.iter().all(|p| p.matches(doc))
    }

    /// Translate a query filter into store predicates.
    ///
    /// `EQ` on time matches the band `[v - tolerance, v + tolerance]`, since
    /// segment times fall on a fixed step and a derived point rarely lands on
    /// one exactly. A tolerance of 0 keeps exact equality.
    pub fn from_temporal(filter: &TemporalFilter, point_tolerance_seconds: i64) -> Self {
        match *filter {
            TemporalFilter::Empty => Self::all(),
            TemporalFilter::Time {
                seconds,
                operator: Operator::Eq,
            } if point_tolerance_seconds > 0 => Self::all()
                .time(Operator::Ge, seconds - point_tolerance_seconds)
                .time(Operator::Le, seconds + point_tolerance_seconds),
            TemporalFilter::Time { seconds, operator } => Self::all().time(operator, seconds),
            TemporalFilter::Category { flag, is_set } => Self::all().flag(flag, is_set),
        }
    }
}

/// Summary information about an indexed game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedGame {
    pub game_id: String,
    /// Number of indexed segments.
    pub segment_count: u32,
    /// Game time of the latest segment.
    pub last_time: i64,
    /// When the game was indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
///
/// Stores are append-only: segments are written once and never updated or
/// deleted.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk insert documents.
    async fn upsert_batch(&self, docs: &[SegmentDocument]) -> Result<usize>;

    /// Top-`top_k` documents by similarity among those matching `filter`.
    async fn search(
        &self,
        query_embedding: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
    ) -> Result<Vec<EmbeddedChunk>>;

    /// Documents matching `filter`, most recent first, without ranking.
    async fn scan(&self, filter: &MetadataFilter, limit: usize) -> Result<Vec<EmbeddedChunk>>;

    /// List all indexed games.
    async fn list_games(&self) -> Result<Vec<IndexedGame>>;

    /// Check if a game is indexed.
    async fn is_game_indexed(&self, game_id: &str) -> Result<bool>;

    /// Get total document count.
    async fn document_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn doc(game: &str, index: i64, time: i64, embedding: Vec<f32>) -> SegmentDocument {
        SegmentDocument::new(
            game.to_string(),
            index,
            format!("segment {} at {}t", index, time),
            embedding,
            ChunkMetadata {
                time,
                is_major: index % 2 == 0,
                homerun: index == 3,
                out: false,
                source_reference: format!("segment_{}.txt", index),
            },
        )
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_metadata_flags_serialize_as_strings() {
        let metadata = doc("g", 3, 90, vec![]).metadata;
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["homerun"], "1");
        assert_eq!(value["out"], "0");
        assert_eq!(value["time"], 90);

        let parsed: ChunkMetadata = serde_json::from_str(
            r#"{"time": 30, "is_major": 1, "homerun": "0", "out": true, "source_reference": "a"}"#,
        )
        .unwrap();
        assert!(parsed.is_major);
        assert!(!parsed.homerun);
        assert!(parsed.out);
    }

    #[test]
    fn test_filter_from_temporal() {
        let filter = MetadataFilter::from_temporal(
            &TemporalFilter::Time {
                seconds: 20,
                operator: Operator::Gt,
            },
            15,
        );
        assert!(filter.matches(&doc("g", 1, 30, vec![])));
        assert!(!filter.matches(&doc("g", 0, 20, vec![])));

        let filter = MetadataFilter::from_temporal(
            &TemporalFilter::Category {
                flag: EventFlag::Homerun,
                is_set: true,
            },
            15,
        );
        assert!(filter.matches(&doc("g", 3, 120, vec![])));
        assert!(!filter.matches(&doc("g", 2, 90, vec![])));

        assert!(MetadataFilter::from_temporal(&TemporalFilter::Empty, 15).is_empty());
    }

    #[test]
    fn test_point_filter_tolerance_band() {
        let point = TemporalFilter::Time {
            seconds: 20,
            operator: Operator::Eq,
        };

        let banded = MetadataFilter::from_temporal(&point, 15);
        assert!(banded.matches(&doc("g", 0, 30, vec![])));
        assert!(banded.matches(&doc("g", 0, 5, vec![])));
        assert!(!banded.matches(&doc("g", 0, 60, vec![])));

        let exact = MetadataFilter::from_temporal(&point, 0);
        assert!(!exact.matches(&doc("g", 0, 30, vec![])));
        assert!(exact.matches(&doc("g", 0, 20, vec![])));
    }

    #[test]
    fn test_game_predicate() {
        let filter = MetadataFilter::all().game("nyy-bos");
        assert!(filter.matches(&doc("nyy-bos", 0, 30, vec![])));
        assert!(!filter.matches(&doc("lad-sd", 0, 30, vec![])));
    }

    #[test]
    fn test_format_game_time() {
        assert_eq!(format_game_time(125), "02:05");
        assert_eq!(format_game_time(3723), "01:02:03");
    }
}
