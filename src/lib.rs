//! Dugout - live baseball game question answering
//!
//! Answers questions asked while a game is in progress, without ever looking
//! past the current game clock.
//!
//! # Overview
//!
//! Every question is classified into one of three branches:
//! - realtime questions go to a video model with the current segment
//! - historical questions go through time-aware retrieval over the segment
//!   analyses indexed so far, then answer synthesis
//! - everything else goes to web search
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `ingest` - Segment analysis parsing
//! - `query` - Classification, temporal filters and query rewriting
//! - `embedding` - Embedding generation
//! - `vector_store` - Segment index with metadata filters
//! - `retrieval` - Time-bounded retrieval and recency ordering
//! - `answer` - Answer synthesis from retrieved segments
//! - `video` - Gemini video analysis (realtime and offline)
//! - `search` - Web search answers
//! - `context` - Live-game context cache
//! - `insight` - Replay insights and the running game summary
//! - `orchestrator` - Query routing and ingestion
//!
//! # Example
//!
//! ```rust,no_run
//! use dugout::config::Settings;
//! use dugout::orchestrator::Orchestrator;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let result = orchestrator.ingest_game(Path::new("data/event"), Some("nyy-bos")).await?;
//!     println!("Indexed {} segments", result.segments_indexed);
//!
//!     let envelope = orchestrator.answer("Show me the latest homerun", None, "2:30").await;
//!     println!("{}", serde_json::to_string_pretty(&envelope)?);
//!
//!     Ok(())
//! }
//! ```

pub mod answer;
pub mod cli;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod insight;
pub mod openai;
pub mod orchestrator;
pub mod query;
pub mod retrieval;
pub mod search;
pub mod vector_store;
pub mod video;

pub use error::{DugoutError, Result};
