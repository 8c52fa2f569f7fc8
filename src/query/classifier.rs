//! Query classification into realtime, historical and search paths.

use super::lexicon::mentions_baseball_term;
use super::time_expr::{find_durations, find_unrecognized_anchor};
use super::{QueryClassification, QueryType};
use crate::config::Prompts;
use crate::error::{DugoutError, Result};
use crate::openai::{create_client, extract_json_object, OpenAIClient};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, instrument};

/// Decides which path answers a query.
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> Result<QueryClassification>;
}

static OTHER_GAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            yesterday | tomorrow
          | last\s+(?:night|game|season|year|week|month|series|time\s+they)
          | this\s+(?:season|year)
          | previous\s+(?:game|season|series)
          | career | history | all[-\s]time | world\s+series
          | standings | roster | schedule | next\s+game
        )\b
        ",
    )
    .expect("Invalid regex")
});

// Lookback words that make a duration an in-game time anchor.
static LOOKBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ago|back|before|earlier|last|past|since)\b").expect("Invalid regex")
});

static IMMEDIACY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            right\s+now | now | currently | current | at\s+the\s+moment
          | any\s+(?:score\s+)?updates? | in\s+this | live | at\s+bat
          | (?:are|is)\s+(?:they|we|he)\s+(?:winning|losing|doing)
          | who(?:'s|\s+is)\s+(?:pitching|batting|playing|up)
        )\b
        ",
    )
    .expect("Invalid regex")
});

static IN_GAME_HISTORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            major | outs? | events? | happened | happen | highlights? | recap
          | latest | most\s+recent | when\s+(?:did|was|were)
          | so\s+far | earlier\s+in\s+the\s+game
        )\b
        ",
    )
    .expect("Invalid regex")
});

static BACKGROUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            stats? | statistics | average | era | batting\s+average
          | who\s+is | who\s+are | tell\s+me\s+about | born | contract | salary
          | how\s+old | biography | record\s+(?:for|of)
        )\b
        ",
    )
    .expect("Invalid regex")
});

/// Deterministic keyword classifier.
///
/// Rules are checked in order and the first match wins:
/// 1. references to other games or seasons: search;
/// 2. an explicit in-game time anchor: historical, with the anchor kept as
///    `time_reference`;
/// 3. immediacy ("right now", "any updates", "in this"): realtime;
/// 4. in-game events or recap wording: historical;
/// 5. player or team background: search;
/// 6. anything else is treated as a question about the live picture: realtime.
#[derive(Debug, Clone, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_sync(&self, query: &str) -> QueryClassification {
        let optimized_query = query.split_whitespace().collect::<Vec<_>>().join(" ");
        let classification = |kind, time_reference| QueryClassification {
            kind,
            time_reference,
            optimized_query: optimized_query.clone(),
        };

        if OTHER_GAME.is_match(query) {
            return classification(QueryType::Search, None);
        }

        if let Some(anchor) = Self::time_anchor(query) {
            return classification(QueryType::Historical, Some(anchor));
        }

        if IMMEDIACY.is_match(query) {
            return classification(QueryType::Realtime, None);
        }

        if IN_GAME_HISTORY.is_match(query) || mentions_baseball_term(query) {
            return classification(QueryType::Historical, None);
        }

        if BACKGROUND.is_match(query) {
            return classification(QueryType::Search, None);
        }

        classification(QueryType::Realtime, None)
    }

    /// In-game time anchor, captured verbatim.
    fn time_anchor(query: &str) -> Option<String> {
        if let Some(anchor) = find_unrecognized_anchor(query) {
            return Some(anchor);
        }

        let duration = find_durations(query).into_iter().next()?;
        if !LOOKBACK.is_match(query) {
            return None;
        }

        // Widen the span to the adjacent lookback word ("20 minutes ago",
        // "last 30 seconds") so the reference reads naturally.
        let before = query[..duration.start].trim_end();
        let after = query[duration.end..].trim_start();
        let prefix = before
            .rsplit(char::is_whitespace)
            .next()
            .filter(|w| LOOKBACK.is_match(w));
        let suffix = after
            .split(|c: char| c.is_whitespace() || c == '?' || c == '.' || c == ',')
            .next()
            .filter(|w| LOOKBACK.is_match(w));

        let mut reference = String::new();
        if let Some(prefix) = prefix {
            reference.push_str(prefix);
            reference.push(' ');
        }
        reference.push_str(&duration.text);
        if let Some(suffix) = suffix {
            reference.push(' ');
            reference.push_str(suffix);
        }
        Some(reference)
    }
}

#[async_trait]
impl QueryClassifier for RuleClassifier {
    async fn classify(&self, query: &str) -> Result<QueryClassification> {
        let classification = self.classify_sync(query);
        debug!(kind = %classification.kind, "Classified query by rules");
        Ok(classification)
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(rename = "type")]
    kind: Option<String>,
    time_reference: Option<String>,
    optimized_query: Option<String>,
}

/// Chat-model classifier using the few-shot classification prompt.
pub struct LlmClassifier {
    client: OpenAIClient,
    model: String,
    prompts: Prompts,
}

impl LlmClassifier {
    pub fn new(model: impl Into<String>, prompts: Prompts) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.into(),
            prompts,
        })
    }

    /// Turn a raw model reply into a classification.
    fn parse_response(query: &str, response: &str) -> Result<QueryClassification> {
        let json_str = extract_json_object(response);
        let raw: RawClassification = serde_json::from_str(json_str).map_err(|e| {
            DugoutError::Classification(format!("Unparseable classifier output: {}", e))
        })?;

        let kind = raw
            .kind
            .as_deref()
            .ok_or_else(|| DugoutError::Classification("Classifier returned no type".to_string()))?
            .parse::<QueryType>()
            .map_err(DugoutError::Classification)?;

        let time_reference = raw
            .time_reference
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("null"));

        let optimized_query = raw
            .optimized_query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| query.trim().to_string());

        Ok(QueryClassification {
            kind,
            time_reference,
            optimized_query,
        })
    }
}

#[async_trait]
impl QueryClassifier for LlmClassifier {
    #[instrument(skip(self))]
    async fn classify(&self, query: &str) -> Result<QueryClassification> {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        let user_prompt = self
            .prompts
            .render_with_custom(&self.prompts.classifier.user, &vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.classifier.system.clone())
                .build()
                .map_err(|e| DugoutError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| DugoutError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| DugoutError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| DugoutError::OpenAI(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| DugoutError::Classification("Empty classifier response".to_string()))?;

        let classification = Self::parse_response(query, &content)?;
        debug!(kind = %classification.kind, "Classified query by model");
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(query: &str) -> QueryType {
        RuleClassifier::new().classify_sync(query).kind
    }

    #[test]
    fn test_realtime_cues() {
        assert_eq!(kind("What's the score of the game right now?"), QueryType::Realtime);
        assert_eq!(kind("Any score updates?"), QueryType::Realtime);
        assert_eq!(kind("Are they winning"), QueryType::Realtime);
        assert_eq!(kind("Who is playing right now?"), QueryType::Realtime);
        assert_eq!(kind("who is pitching in this inning"), QueryType::Realtime);
    }

    #[test]
    fn test_historical_with_time_reference() {
        let c = RuleClassifier::new().classify_sync("What happened 20 minutes ago?");
        assert_eq!(c.kind, QueryType::Historical);
        assert_eq!(c.time_reference.as_deref(), Some("20 minutes ago"));

        let c = RuleClassifier::new().classify_sync("recap the last 3 innings");
        assert_eq!(c.kind, QueryType::Historical);
        assert_eq!(c.time_reference.as_deref(), Some("last 3 innings"));

        let c = RuleClassifier::new().classify_sync("what happened in the last 30 seconds");
        assert_eq!(c.time_reference.as_deref(), Some("last 30 seconds"));

        let c = RuleClassifier::new().classify_sync("What was the score at the half?");
        assert_eq!(c.kind, QueryType::Historical);
        assert_eq!(c.time_reference.as_deref(), Some("at the half"));
    }

    #[test]
    fn test_historical_without_time_reference() {
        let c = RuleClassifier::new().classify_sync("Show me the highlights from the game");
        assert_eq!(c.kind, QueryType::Historical);
        assert!(c.time_reference.is_none());

        assert_eq!(kind("Show me the latest homerun"), QueryType::Historical);
        assert_eq!(kind("when did the last bunting happen"), QueryType::Historical);
    }

    #[test]
    fn test_search_cues() {
        assert_eq!(kind("What about the game yesterday"), QueryType::Search);
        assert_eq!(kind("How many home runs did they hit yesterday?"), QueryType::Search);
        assert_eq!(kind("Tell me about the history of the Yankees"), QueryType::Search);
        assert_eq!(kind("What is Aaron Judge's batting average this season?"), QueryType::Search);
        assert_eq!(kind("Who is the catcher for the Dodgers?"), QueryType::Search);
    }

    #[test]
    fn test_optimized_query_is_normalized() {
        let c = RuleClassifier::new().classify_sync("  any   updates ");
        assert_eq!(c.optimized_query, "any updates");
    }

    #[tokio::test]
    async fn test_trait_object_classification() {
        let classifier: Box<dyn QueryClassifier> = Box::new(RuleClassifier::new());
        let c = classifier.classify("Show me all the out").await.unwrap();
        assert_eq!(c.kind, QueryType::Historical);
    }

    #[test]
    fn test_parse_model_response() {
        let response = "```json\n{\"type\": \"historical\", \"time_reference\": \"20 minutes ago\", \"optimized_query\": \"What happened 20 minutes ago in the game?\"}\n```";
        let c = LlmClassifier::parse_response("q", response).unwrap();
        assert_eq!(c.kind, QueryType::Historical);
        assert_eq!(c.time_reference.as_deref(), Some("20 minutes ago"));
    }

    #[test]
    fn test_parse_model_response_rejects_unknown_type() {
        let err = LlmClassifier::parse_response("q", "{\"type\": \"maybe\"}").unwrap_err();
        assert!(matches!(err, DugoutError::Classification(_)));

        let err = LlmClassifier::parse_response("q", "no json here").unwrap_err();
        assert!(matches!(err, DugoutError::Classification(_)));
    }

    #[test]
    fn test_parse_model_response_fills_missing_query() {
        let c = LlmClassifier::parse_response(" live score ", "{\"type\": \"realtime\", \"time_reference\": null}").unwrap();
        assert_eq!(c.optimized_query, "live score");
        assert!(c.time_reference.is_none());
    }
}
