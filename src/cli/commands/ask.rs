//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{AnalysisEnvelope, AnalysisResult, Orchestrator};
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    query: &str,
    at: &str,
    video: Option<String>,
    game: Option<String>,
    json: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }
    for warning in preflight::optional_warnings(Operation::Ask) {
        Output::warning(&warning);
    }

    let orchestrator = Orchestrator::new(settings)?.with_game(game);

    let spinner = Output::spinner("Thinking...");
    let envelope = orchestrator.answer(query, video.as_deref(), at).await;
    spinner.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        if envelope.is_error() {
            anyhow::bail!("query failed");
        }
        return Ok(());
    }

    match envelope {
        AnalysisEnvelope::Success { result, kind } => {
            Output::kv("Handled as", &kind.to_string());
            match result {
                AnalysisResult::Realtime(answer) => {
                    println!("\n{}\n", answer.response);
                    Output::kv("Video", &answer.video);
                }
                AnalysisResult::Historical(answer) => {
                    println!("\n{}\n", answer.answer);
                    if !answer.citations.is_empty() {
                        Output::header("Segments");
                        for citation in &answer.citations {
                            Output::list_item(citation);
                        }
                    }
                }
                AnalysisResult::Search(answer) => {
                    println!("\n{}\n", answer.answer);
                    if !answer.citations.is_empty() {
                        Output::header("Sources");
                        for citation in &answer.citations {
                            Output::list_item(citation);
                        }
                    }
                }
            }
        }
        AnalysisEnvelope::Failure { error } => {
            Output::error(&error);
            anyhow::bail!(error);
        }
    }

    Ok(())
}
