//! Shared HTTP and OpenAI client construction.

use crate::error::{DugoutError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for model requests (2 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// OpenAI client type used across the crate.
pub type OpenAIClient = Client<OpenAIConfig>;

/// Build a `reqwest` client with the given request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DugoutError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Create an OpenAI client with the default timeout.
pub fn create_client() -> Result<OpenAIClient> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Result<OpenAIClient> {
    let http = http_client(timeout)?;
    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http))
}

/// Pull the first JSON object out of a model response.
///
/// Models often wrap JSON in markdown fences or prose; everything outside the
/// outermost braces is dropped.
pub fn extract_json_object(response: &str) -> &str {
    let start = response.find('{');
    let end = response.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_from_fenced_response() {
        let response = "Here you go:\n```json\n{\"type\": \"realtime\"}\n```";
        assert_eq!(extract_json_object(response), "{\"type\": \"realtime\"}");
    }

    #[test]
    fn test_extract_json_object_without_braces() {
        assert_eq!(extract_json_object("  plain text "), "plain text");
    }
}
