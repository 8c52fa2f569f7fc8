//! Answer synthesis for historical questions.

mod openai;

pub use openai::OpenAIAnswerSynthesizer;

use crate::error::Result;
use crate::vector_store::{format_game_time, EmbeddedChunk};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TIME_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)t\b").expect("Invalid regex"));

/// A grounded answer to a historical question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalAnswer {
    pub answer: String,
    pub query: String,
    /// Segment files the answer was drawn from, in retrieval order.
    pub citations: Vec<String>,
}

/// Trait for turning retrieved segments into an answer.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// Answer `query` from `chunks`, which are already ordered.
    ///
    /// An empty `chunks` must produce a "no information" answer rather than
    /// an error.
    async fn synthesize(
        &self,
        query: &str,
        chunks: &[EmbeddedChunk],
        current_time_seconds: i64,
    ) -> Result<HistoricalAnswer>;
}

/// Rewrite `NNNt` markers in segment text to `NNN seconds`.
pub fn humanize_time_markers(text: &str) -> String {
    TIME_MARKER.replace_all(text, "$1 seconds").into_owned()
}

/// Distinct source references, first occurrence wins.
pub fn citations(chunks: &[EmbeddedChunk]) -> Vec<String> {
    let mut seen = Vec::new();
    for chunk in chunks {
        let source = &chunk.metadata.source_reference;
        if !source.is_empty() && !seen.contains(source) {
            seen.push(source.clone());
        }
    }
    seen
}

/// Chunk block for the answer prompt.
pub fn format_chunks_for_prompt(chunks: &[EmbeddedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "---\n[{}] {} @ {} ({} seconds)\n{}\n---",
                i + 1,
                chunk.metadata.source_reference,
                format_game_time(chunk.metadata.time),
                chunk.metadata.time,
                humanize_time_markers(&chunk.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::ChunkMetadata;

    fn chunk(time: i64, source: &str, text: &str) -> EmbeddedChunk {
        EmbeddedChunk {
            id: format!("c{}", time),
            text: text.to_string(),
            score: 0.9,
            metadata: ChunkMetadata {
                time,
                is_major: false,
                homerun: false,
                out: false,
                source_reference: source.to_string(),
            },
        }
    }

    #[test]
    fn test_humanize_time_markers() {
        assert_eq!(
            humanize_time_markers("Ball one.\ntime: 30t"),
            "Ball one.\ntime: 30 seconds"
        );
        // Only bare markers, not words that end in t.
        assert_eq!(humanize_time_markers("left field at 9pt"), "left field at 9pt");
    }

    #[test]
    fn test_citations_are_distinct_and_ordered() {
        let chunks = vec![
            chunk(90, "segment_3.txt", "a"),
            chunk(30, "segment_1.txt", "b"),
            chunk(90, "segment_3.txt", "c"),
        ];
        assert_eq!(citations(&chunks), vec!["segment_3.txt", "segment_1.txt"]);
    }

    #[test]
    fn test_prompt_block_contains_readable_times() {
        let block = format_chunks_for_prompt(&[chunk(90, "segment_3.txt", "Bunt.\ntime: 90t")]);
        assert!(block.contains("[1] segment_3.txt @ 01:30 (90 seconds)"));
        assert!(block.contains("time: 90 seconds"));
    }
}
