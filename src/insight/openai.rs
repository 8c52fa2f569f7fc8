//! OpenAI chat model for replay insights.

use super::InsightModel;
use crate::config::{InsightSettings, Prompts};
use crate::error::{DugoutError, Result};
use crate::openai::{create_client, OpenAIClient};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

pub struct OpenAIInsightModel {
    client: OpenAIClient,
    model: String,
    temperature: f32,
    system: String,
}

impl OpenAIInsightModel {
    pub fn new(settings: &InsightSettings, prompts: &Prompts) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            system: prompts.insight.system.clone(),
        })
    }
}

#[async_trait]
impl InsightModel for OpenAIInsightModel {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system.clone())
                .build()
                .map_err(|e| DugoutError::Insight(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| DugoutError::Insight(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| DugoutError::Insight(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            DugoutError::OpenAI(format!("Failed to generate insight: {}", e))
        })?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| DugoutError::Insight("Empty response from model".to_string()))?;

        debug!("Generated {} characters", text.len());
        Ok(text)
    }
}
