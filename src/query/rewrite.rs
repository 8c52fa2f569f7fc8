//! Reduce a question to the string that is embedded for similarity search.

use super::lexicon::{distinct_terms, named_entities};
use super::time_expr::{find_durations, find_unrecognized_anchor, has_recency_cue};
use super::RewrittenQuery;
use regex::Regex;
use std::sync::LazyLock;

/// Search string used for term-less recap questions.
pub const GENERIC_RECAP: &str = "baseball major events";

static RECAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*what(?:'s|\s+is|\s+has)?\s+(?:happened|happening|going\s+on)\b
      | \b(?:highlights?|recap|summary|summari[sz]e)\b
      | \bwhat\s+did\s+i\s+miss\b
        ",
    )
    .expect("Invalid regex")
});

// Vague "some time back" phrasing with no number.
static VAGUE_LOOKBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:\w+\s+)?(?:time|while|moment)\s+(?:back|ago)\b").expect("Invalid regex")
});

/// Rewrites questions into embedding-index search strings.
///
/// - Time-relative questions become `"*"` unless they name a baseball term,
///   in which case the term (and any player name) is kept.
/// - Other questions are canonicalized to the baseball term they name, kept
///   verbatim when they name two or more, and blank when they name none.
#[derive(Debug, Clone, Default)]
pub struct QueryRewriter;

impl QueryRewriter {
    pub fn new() -> Self {
        Self
    }

    pub fn rewrite(&self, query: &str) -> RewrittenQuery {
        let terms = distinct_terms(query);
        let entities = named_entities(query);

        if Self::is_time_relative(query) {
            if terms.is_empty() {
                return RewrittenQuery::wildcard();
            }
            return RewrittenQuery::new(Self::join(&entities, &terms));
        }

        match terms.len() {
            0 if RECAP.is_match(query) => RewrittenQuery::new(GENERIC_RECAP),
            0 => RewrittenQuery::blank(),
            1 => RewrittenQuery::new(Self::join(&entities, &terms)),
            _ => RewrittenQuery::new(query.trim()),
        }
    }

    fn is_time_relative(query: &str) -> bool {
        !find_durations(query).is_empty()
            || find_unrecognized_anchor(query).is_some()
            || has_recency_cue(query)
            || VAGUE_LOOKBACK.is_match(query)
    }

    fn join(entities: &[String], terms: &[&str]) -> String {
        entities
            .iter()
            .map(String::as_str)
            .chain(terms.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(query: &str) -> String {
        QueryRewriter::new().rewrite(query).modified_query
    }

    #[test]
    fn test_pure_time_queries_are_wildcards() {
        assert_eq!(rewrite("What happened 30 seconds back"), "*");
        assert_eq!(rewrite("What happened exactly 40 seconds back"), "*");
        assert_eq!(rewrite("What happened from 30 seconds back till now"), "*");
        assert_eq!(rewrite("what happened in the last 30 seconds"), "*");
    }

    #[test]
    fn test_time_queries_keep_the_term() {
        assert_eq!(rewrite("tell me when did the last bunting happen"), "bunting");
        assert_eq!(rewrite("Show me the latest homerun"), "homerun");
        assert_eq!(rewrite("when was the last walk event?"), "walk");
        assert_eq!(rewrite("what about the latest stolen base?"), "stolen base");
        assert_eq!(rewrite("any double plays recently"), "double play");
        assert_eq!(rewrite("provide be the bunts that happended 20s back"), "bunt");
        assert_eq!(rewrite("provide me homerrun that happened x time back"), "homerun");
    }

    #[test]
    fn test_time_queries_keep_player_names() {
        assert_eq!(
            rewrite("when did Shohei Ohtani hit a homerun?"),
            "Shohei Ohtani homerun"
        );
    }

    #[test]
    fn test_multiple_terms_are_kept_verbatim() {
        let query = "Show me major events related to bunting or strike or homerun";
        assert_eq!(rewrite(query), query);
    }

    #[test]
    fn test_single_term_is_canonicalized() {
        assert_eq!(rewrite("Show me all the homers"), "homerun");
        assert_eq!(rewrite("were there any strikeouts"), "strikeout");
    }

    #[test]
    fn test_recap_without_terms_is_generic() {
        assert_eq!(rewrite("What happened"), GENERIC_RECAP);
        assert_eq!(rewrite("show me the highlights"), GENERIC_RECAP);
    }

    #[test]
    fn test_no_terms_is_blank() {
        assert!(QueryRewriter::new()
            .rewrite("provide me all major events happen")
            .is_blank());
        assert!(QueryRewriter::new()
            .rewrite("show me events tagged with 'news'")
            .is_blank());
    }
}
