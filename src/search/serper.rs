//! Serper.dev search answered by an OpenAI chat model.

use super::{format_hits_for_prompt, SearchAnswer, SearchHit, WebSearcher};
use crate::config::{Prompts, SearchSettings};
use crate::error::{DugoutError, Result};
use crate::openai::{create_client, http_client, OpenAIClient};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

/// [`WebSearcher`] over the Serper Google search API.
pub struct SerperSearcher {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    max_results: usize,
    client: OpenAIClient,
    model: String,
    prompts: Prompts,
}

impl SerperSearcher {
    /// Build a searcher from settings and `SERPER_API_KEY`.
    pub fn from_settings(settings: &SearchSettings, prompts: Prompts) -> Result<Self> {
        let api_key = std::env::var("SERPER_API_KEY")
            .map_err(|_| DugoutError::Config("SERPER_API_KEY is not set".to_string()))?;
        Self::new(settings, api_key, prompts)
    }

    pub fn new(settings: &SearchSettings, api_key: impl Into<String>, prompts: Prompts) -> Result<Self> {
        let endpoint = Url::parse(&settings.endpoint).map_err(|e| {
            DugoutError::Config(format!("Invalid search endpoint {}: {}", settings.endpoint, e))
        })?;

        Ok(Self {
            http: http_client(Duration::from_secs(30))?,
            endpoint,
            api_key: api_key.into(),
            max_results: settings.max_results.max(1),
            client: create_client()?,
            model: settings.model.clone(),
            prompts,
        })
    }

    /// Organic results for `query`, at most `max_results`.
    #[instrument(skip(self))]
    pub async fn fetch_hits(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": self.max_results }))
            .send()
            .await
            .map_err(|e| DugoutError::WebSearch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DugoutError::WebSearch(format!("{}: {}", status, body)));
        }

        let parsed: SerperResponse = response
            .json()
            .await
            .map_err(|e| DugoutError::WebSearch(format!("Unreadable search response: {}", e)))?;

        Ok(Self::top_hits(parsed, self.max_results))
    }

    fn top_hits(response: SerperResponse, max_results: usize) -> Vec<SearchHit> {
        response
            .organic
            .into_iter()
            .filter(|h| !h.snippet.trim().is_empty() || !h.title.trim().is_empty())
            .take(max_results)
            .collect()
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<SearchAnswer> {
        let hits = self.fetch_hits(query).await?;
        info!("Search returned {} results", hits.len());
        if hits.is_empty() {
            return Ok(SearchAnswer {
                answer: "No search results were found for this question.".to_string(),
                citations: Vec::new(),
            });
        }

        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        vars.insert("results".to_string(), format_hits_for_prompt(&hits));
        let user_prompt = self.prompts.render_with_custom(&self.prompts.search.user, &vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.search.system.clone())
                .build()
                .map_err(|e| DugoutError::WebSearch(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| DugoutError::WebSearch(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| DugoutError::WebSearch(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            DugoutError::OpenAI(format!("Failed to answer from search results: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| DugoutError::WebSearch("Empty response from model".to_string()))?;
        debug!("Answered from {} search results", hits.len());

        Ok(SearchAnswer {
            answer: answer.trim().to_string(),
            citations: hits
                .into_iter()
                .map(|h| h.link)
                .filter(|l| !l.is_empty())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_hits_from_serper_shape() {
        let raw = r#"{
            "searchParameters": {"q": "Yankees roster 2024"},
            "organic": [
                {"title": "Roster", "link": "https://a.example/1", "snippet": "Judge", "position": 1},
                {"title": "", "link": "https://a.example/2", "snippet": " ", "position": 2},
                {"title": "Stats", "link": "https://a.example/3", "snippet": "Soto", "position": 3},
                {"title": "News", "link": "https://a.example/4", "snippet": "Cole", "position": 4}
            ]
        }"#;
        let response: SerperResponse = serde_json::from_str(raw).unwrap();
        let hits = SerperSearcher::top_hits(response, 2);
        let links: Vec<&str> = hits.iter().map(|h| h.link.as_str()).collect();
        assert_eq!(links, vec!["https://a.example/1", "https://a.example/3"]);
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let settings = SearchSettings {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        let err = SerperSearcher::new(&settings, "key", Prompts::default())
            .err()
            .unwrap();
        assert!(matches!(err, DugoutError::Config(_)));
    }
}
