//! Time-aware retrieval over the segment index.
//!
//! Runs the similarity search (or a filter-only scan when there is nothing
//! to embed), removes every candidate from the caller's future, then orders
//! what is left according to how the question asks about recency.

use crate::embedding::Embedder;
use crate::error::{DugoutError, Result};
use crate::query::time_expr::has_recency_cue;
use crate::query::{flag_keyword, lexicon, Operator, RewrittenQuery, TemporalFilter};
use crate::vector_store::{EmbeddedChunk, MetadataFilter, VectorStore};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, info, instrument};

/// Candidates requested from the index by default.
pub const DEFAULT_TOP_K: usize = 10;

static LATEST_ORDERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            based\s+on\s+(?:the\s+)?(?:latest|recency|most\s+recent)
          | (?:latest|newest|most\s+recent)\s+first
          | (?:sorted|ordered|sort|order)\s+by\s+(?:time|recency|latest)
          | latest\s+(?:events|plays|moments|updates|highlights)
          | in\s+reverse\s+(?:chronological\s+)?order
        )\b
        ",
    )
    .expect("Invalid regex")
});

static LATEST_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:latest|most\s+recent|newest)\b").expect("Invalid regex")
});

// "the last homerun" but not "the last 30 seconds" or "the last few innings".
static THE_LAST_EVENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bthe\s+last\s+([a-z][a-z'-]*)").expect("Invalid regex")
});

const NOT_AN_EVENT: &[&str] = &[
    "few", "couple", "several", "one", "two", "three", "four", "five", "six", "seven", "eight",
    "nine", "ten", "half", "second", "seconds", "minute", "minutes", "hour", "hours", "inning",
    "innings", "time", "while",
];

/// How a question wants its results ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyIntent {
    /// Only the single most recent match ("show me the latest homerun").
    LatestSingle,
    /// Everything, newest first ("show me events based on latest").
    LatestOrdered,
    /// Similarity first, recency breaks ties.
    Relevance,
}

impl RecencyIntent {
    pub fn detect(query: &str) -> Self {
        if LATEST_ORDERED.is_match(query) {
            return RecencyIntent::LatestOrdered;
        }
        if LATEST_SINGLE.is_match(query) || Self::asks_for_last_event(query) {
            return RecencyIntent::LatestSingle;
        }
        RecencyIntent::Relevance
    }

    fn asks_for_last_event(query: &str) -> bool {
        THE_LAST_EVENT.captures_iter(query).any(|caps| {
            caps.get(1)
                .map(|word| !NOT_AN_EVENT.contains(&word.as_str().to_lowercase().as_str()))
                .unwrap_or(false)
        })
    }
}

/// Retrieves game segments for a historical question.
pub struct TemporalRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    point_tolerance_seconds: i64,
    score_tie_epsilon: f32,
    game_id: Option<String>,
}

impl TemporalRetriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            top_k: DEFAULT_TOP_K,
            point_tolerance_seconds: 15,
            score_tie_epsilon: 0.01,
            game_id: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Half-width of the band an `EQ` time filter matches; 0 is exact.
    pub fn with_point_tolerance(mut self, seconds: i64) -> Self {
        self.point_tolerance_seconds = seconds.max(0);
        self
    }

    pub fn with_tie_epsilon(mut self, epsilon: f32) -> Self {
        self.score_tie_epsilon = epsilon.max(0.0);
        self
    }

    /// Only search segments of one game.
    pub fn with_game(mut self, game_id: Option<String>) -> Self {
        self.game_id = game_id;
        self
    }

    /// Store predicates for a query filter.
    pub fn metadata_filter(&self, filter: &TemporalFilter) -> MetadataFilter {
        let metadata = MetadataFilter::from_temporal(filter, self.point_tolerance_seconds);
        match &self.game_id {
            Some(game_id) => metadata.game(game_id.clone()),
            None => metadata,
        }
    }

    /// Retrieve, post-filter and order segments.
    ///
    /// The result never contains a segment whose time is later than
    /// `current_time_seconds`. An empty result is not an error.
    #[instrument(skip(self, rewritten, filter), fields(query = %rewritten.modified_query, filter = %filter))]
    pub async fn retrieve(
        &self,
        rewritten: &RewrittenQuery,
        filter: &TemporalFilter,
        original_query: &str,
        current_time_seconds: i64,
    ) -> Result<Vec<EmbeddedChunk>> {
        let intent = RecencyIntent::detect(original_query);
        let (metadata, flagged) = self.recency_scoped_filter(filter, intent, original_query);
        // Future segments must not take top_k slots.
        let metadata = metadata.time(Operator::Le, current_time_seconds);

        let candidates = if rewritten.is_searchable() {
            let embedding = self
                .embedder
                .embed(&rewritten.modified_query)
                .await
                .map_err(|e| DugoutError::Retrieval(format!("Failed to embed query: {}", e)))?;
            self.store
                .search(&embedding, &metadata, self.top_k)
                .await
                .map_err(|e| DugoutError::Retrieval(e.to_string()))?
        } else {
            // Nothing to rank by: newest matches within the filter.
            self.store
                .scan(&metadata, self.top_k)
                .await
                .map_err(|e| DugoutError::Retrieval(e.to_string()))?
        };
        debug!("Index returned {} candidates", candidates.len());

        let mut chunks = Self::drop_future(candidates, current_time_seconds);

        if intent == RecencyIntent::LatestSingle && !flagged {
            // Without a flag to filter on, "the latest X" must at least mention X.
            chunks.retain(|chunk| {
                lexicon::mentions_query_terms(original_query, &chunk.text).unwrap_or(true)
            });
        }

        Self::order(&mut chunks, intent, self.score_tie_epsilon);

        Self::check_no_leakage(&chunks, current_time_seconds);
        info!(?intent, "Retrieved {} chunks", chunks.len());
        Ok(chunks)
    }

    /// Store predicates for a query, plus the event flag a recency question
    /// names ("the latest home run" only considers home runs).
    ///
    /// Returns whether a flag predicate was added.
    fn recency_scoped_filter(
        &self,
        filter: &TemporalFilter,
        intent: RecencyIntent,
        original_query: &str,
    ) -> (MetadataFilter, bool) {
        let metadata = self.metadata_filter(filter);
        let asks_recency = intent != RecencyIntent::Relevance || has_recency_cue(original_query);
        if !asks_recency || matches!(filter, TemporalFilter::Category { .. }) {
            return (metadata, false);
        }
        match flag_keyword(original_query) {
            Some(flag) => {
                debug!(?flag, "Recency question restricted to flagged segments");
                (metadata.flag(flag, true), true)
            }
            None => (metadata, false),
        }
    }

    /// Remove every candidate later than the current time.
    pub fn drop_future(candidates: Vec<EmbeddedChunk>, current_time_seconds: i64) -> Vec<EmbeddedChunk> {
        candidates
            .into_iter()
            .filter(|chunk| {
                let keep = chunk.metadata.time <= current_time_seconds;
                if !keep {
                    debug!(
                        chunk_time = chunk.metadata.time,
                        current_time_seconds, "Dropped chunk from the future"
                    );
                }
                keep
            })
            .collect()
    }

    /// Apply the recency intent to already post-filtered chunks.
    pub fn order(chunks: &mut Vec<EmbeddedChunk>, intent: RecencyIntent, tie_epsilon: f32) {
        match intent {
            RecencyIntent::LatestSingle => {
                let latest = chunks
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, c)| c.metadata.time)
                    .map(|(i, _)| i);
                match latest {
                    Some(i) => {
                        let chunk = chunks.swap_remove(i);
                        chunks.clear();
                        chunks.push(chunk);
                    }
                    None => chunks.clear(),
                }
            }
            RecencyIntent::LatestOrdered => {
                chunks.sort_by(|a, b| b.metadata.time.cmp(&a.metadata.time));
            }
            RecencyIntent::Relevance => {
                // Scores within one epsilon bucket count as a tie.
                let bucket = |score: f32| -> i64 {
                    if tie_epsilon > 0.0 {
                        (score / tie_epsilon).floor() as i64
                    } else {
                        0
                    }
                };
                chunks.sort_by(|a, b| {
                    let primary = if tie_epsilon > 0.0 {
                        bucket(b.score).cmp(&bucket(a.score))
                    } else {
                        b.score.total_cmp(&a.score)
                    };
                    primary.then_with(|| b.metadata.time.cmp(&a.metadata.time))
                });
            }
        }
    }

    fn check_no_leakage(chunks: &[EmbeddedChunk], current_time_seconds: i64) {
        if let Some(chunk) = chunks.iter().find(|c| c.metadata.time > current_time_seconds) {
            let violation = DugoutError::FutureLeakage {
                chunk_time: chunk.metadata.time,
                current_time: current_time_seconds,
            };
            error!("{}", violation);
            debug_assert!(false, "{}", violation);
        }
    }
}
