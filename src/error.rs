//! Error types for Dugout.

use thiserror::Error;

/// Library-level error type for Dugout operations.
#[derive(Error, Debug)]
pub enum DugoutError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse segment {file}: {reason}")]
    IngestParse { file: String, reason: String },

    #[error("No usable segments found in {0}")]
    NoSegments(String),

    #[error("Query classification failed: {0}")]
    Classification(String),

    #[error("Unrecognized time expression: {0}")]
    FilterBuild(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Chunk at {chunk_time}s is later than the current time {current_time}s")]
    FutureLeakage { chunk_time: i64, current_time: i64 },

    #[error("Video processing failed: {0}")]
    VideoProcessing(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Insight generation failed: {0}")]
    Insight(String),

    #[error("Web search failed: {0}")]
    WebSearch(String),

    #[error("Answer generation failed: {0}")]
    Answer(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for Dugout operations.
pub type Result<T> = std::result::Result<T, DugoutError>;
