//! Retrieve command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::query::time_expr::parse_clock;
use anyhow::Result;

/// Run the retrieve command.
pub async fn run_retrieve(
    query: &str,
    at: &str,
    game: Option<String>,
    json: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Retrieve, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let current_time = parse_clock(at)?;
    let orchestrator = Orchestrator::new(settings)?.with_game(game);

    let spinner = Output::spinner("Searching game history...");
    let result = orchestrator.retrieve(query, current_time).await;
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            Output::error(&format!("Retrieval failed: {}", e));
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    Output::kv("Filter", &result.plan.filter.to_string());
    Output::kv("Search string", &result.plan.rewritten.modified_query);

    if result.chunks.is_empty() {
        Output::warning("Nothing relevant has happened as of now.");
    } else {
        Output::success(&format!("Found {} segments", result.chunks.len()));
        for chunk in &result.chunks {
            Output::chunk_result(
                &chunk.metadata.source_reference,
                chunk.metadata.time,
                chunk.score,
                &chunk.text,
            );
        }
    }

    Ok(())
}
