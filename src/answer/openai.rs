//! OpenAI chat answer synthesis.

use super::{citations, format_chunks_for_prompt, AnswerSynthesizer, HistoricalAnswer};
use crate::config::Prompts;
use crate::error::{DugoutError, Result};
use crate::openai::{create_client, OpenAIClient};
use crate::vector_store::EmbeddedChunk;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Answers from retrieved segments with an OpenAI chat model.
pub struct OpenAIAnswerSynthesizer {
    client: OpenAIClient,
    model: String,
    temperature: f32,
    prompts: Prompts,
}

impl OpenAIAnswerSynthesizer {
    pub fn new(model: impl Into<String>, prompts: Prompts) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.into(),
            temperature: 0.0,
            prompts,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn no_information(&self, query: &str) -> HistoricalAnswer {
        HistoricalAnswer {
            answer: self.prompts.answer.no_information.clone(),
            query: query.to_string(),
            citations: Vec::new(),
        }
    }
}

#[async_trait]
impl AnswerSynthesizer for OpenAIAnswerSynthesizer {
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    async fn synthesize(
        &self,
        query: &str,
        chunks: &[EmbeddedChunk],
        current_time_seconds: i64,
    ) -> Result<HistoricalAnswer> {
        if chunks.is_empty() {
            info!("No segments retrieved, skipping model call");
            return Ok(self.no_information(query));
        }

        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        vars.insert("current_time".to_string(), current_time_seconds.to_string());
        vars.insert("chunks".to_string(), format_chunks_for_prompt(chunks));
        let user_prompt = self.prompts.render_with_custom(&self.prompts.answer.user, &vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.answer.system.clone())
                .build()
                .map_err(|e| DugoutError::Answer(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| DugoutError::Answer(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| DugoutError::Answer(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            DugoutError::OpenAI(format!("Failed to generate answer: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| DugoutError::Answer("Empty response from model".to_string()))?;

        debug!("Generated answer from {} segments", chunks.len());

        Ok(HistoricalAnswer {
            answer: answer.trim().to_string(),
            query: query.to_string(),
            citations: citations(chunks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_chunks_skip_the_model() {
        let synthesizer = OpenAIAnswerSynthesizer::new("gpt-4o-mini", Prompts::default()).unwrap();
        let answer = synthesizer
            .synthesize("Show me the latest homerun", &[], 40)
            .await
            .unwrap();
        assert_eq!(answer.answer, "No information is available about this as of now.");
        assert_eq!(answer.query, "Show me the latest homerun");
        assert!(answer.citations.is_empty());
    }
}
