//! Pre-flight checks before expensive operations.
//!
//! Validates that the API keys an operation needs are set before starting
//! work that would otherwise fail midway.

use crate::config::{ClassifierMode, Settings};
use crate::error::{DugoutError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion embeds every segment.
    Ingest,
    /// Answering embeds the query and calls a chat model.
    Ask,
    /// Retrieval embeds the query.
    Retrieve,
    /// Planning only needs a key when the classifier is a model.
    Plan,
    /// Segment analysis uploads videos to Gemini.
    AnalyzeSegments,
    /// Replay insights call a chat model.
    Insights,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest | Operation::Ask | Operation::Retrieve | Operation::Insights => {
            check_key("OPENAI_API_KEY", "sk-...")?;
        }
        Operation::Plan => {
            if settings.classifier.mode == ClassifierMode::Llm {
                check_key("OPENAI_API_KEY", "sk-...")?;
            }
        }
        Operation::AnalyzeSegments => {
            check_key("GOOGLE_API_KEY", "AIza...")?;
        }
    }
    Ok(())
}

/// Keys whose absence disables part of an operation without stopping it.
pub fn optional_warnings(operation: Operation) -> Vec<String> {
    let optional: &[(&str, &str)] = match operation {
        Operation::Ask => &[
            ("GOOGLE_API_KEY", "realtime questions"),
            ("SERPER_API_KEY", "web search questions"),
        ],
        _ => &[],
    };

    optional
        .iter()
        .filter(|(key, _)| !is_set(key))
        .map(|(key, feature)| format!("{} not set; {} will fail", key, feature))
        .collect()
}

fn is_set(name: &str) -> bool {
    std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}

fn check_key(name: &str, example: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(DugoutError::Config(format!(
            "{} is empty. Set it with: export {}='{}'",
            name, name, example
        ))),
        Err(_) => Err(DugoutError::Config(format!(
            "{} not set. Set it with: export {}='{}'",
            name, name, example
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_with_rules_has_no_requirements() {
        assert!(check(Operation::Plan, &Settings::default()).is_ok());
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = check_key("DUGOUT_TEST_KEY_THAT_IS_NEVER_SET", "x").unwrap_err();
        assert!(matches!(err, DugoutError::Config(_)));
        assert!(err.to_string().contains("not set"));
    }
}
