//! Video analysis for realtime questions and corpus production.
//!
//! Realtime questions are answered by a multimodal model looking at the
//! segment itself; the same model also writes the per-segment analysis
//! files that ingestion turns into the searchable corpus.

mod gemini;
mod segments;

pub use gemini::{GeminiClient, GeminiFile, GeminiVideoAnalyzer};
pub use segments::{SegmentAnalyzer, SegmentRunReport};

use crate::error::{DugoutError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Answer to a realtime question about one video segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeAnswer {
    pub query: String,
    pub video: String,
    pub response: String,
}

/// Processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    StateUnspecified,
    Processing,
    Active,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Trait for models that can look at a video segment.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    /// Answer a question about the segment at `video`.
    async fn analyze(&self, query: &str, video: &Path) -> Result<RealtimeAnswer>;

    /// Produce the structured analysis text for one segment.
    async fn describe_segment(&self, video: &Path) -> Result<String>;
}

/// Poll `fetch` until the file is active.
///
/// A `FAILED` state ends polling at once. Running out of polls is also a
/// [`DugoutError::VideoProcessing`].
pub async fn wait_until_active<F, Fut>(
    mut fetch: F,
    interval: Duration,
    max_polls: u32,
) -> Result<GeminiFile>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<GeminiFile>>,
{
    for attempt in 1..=max_polls.max(1) {
        let file = fetch().await?;
        match file.state {
            FileState::Active => return Ok(file),
            FileState::Failed => {
                return Err(DugoutError::VideoProcessing(format!(
                    "Processing of {} failed",
                    file.name
                )))
            }
            state => {
                debug!(attempt, ?state, "File not ready yet");
                if attempt < max_polls {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(DugoutError::VideoProcessing(format!(
        "File was not ready after {} polls",
        max_polls
    )))
}

/// MIME type for a video file, by extension.
pub fn video_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "video/mp4",
    }
}
