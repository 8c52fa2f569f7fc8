//! Web search for questions the game itself cannot answer.

mod serper;

pub use serper::SerperSearcher;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An answer drawn from web results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAnswer {
    pub answer: String,
    /// Links of the results the answer was drawn from.
    pub citations: Vec<String>,
}

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchAnswer>;
}

/// Result block for the search answer prompt.
pub fn format_hits_for_prompt(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("[{}] {}\n{}\n{}", i + 1, hit.title, hit.link, hit.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hits() {
        let hits = vec![SearchHit {
            title: "Yankees roster".to_string(),
            link: "https://example.com/nyy".to_string(),
            snippet: "Aaron Judge, RF".to_string(),
        }];
        assert_eq!(
            format_hits_for_prompt(&hits),
            "[1] Yankees roster\nhttps://example.com/nyy\nAaron Judge, RF"
        );
    }
}
