//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::PathBuf;

/// Run the ingest command.
pub async fn run_ingest(dir: &str, game: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let dir = Settings::expand_path(dir);

    let spinner = Output::spinner(&format!("Ingesting {}...", dir.display()));
    let result = orchestrator.ingest_game(&PathBuf::from(&dir), game.as_deref()).await;
    spinner.finish_and_clear();

    match result {
        Ok(result) => {
            Output::success(&format!(
                "Indexed {} segments for game '{}'",
                result.segments_indexed, result.game_id
            ));
            for skipped in &result.skipped {
                Output::warning(&format!("Skipped {}: {}", skipped.file, skipped.reason));
            }
            for file in &result.embedding_failures {
                Output::warning(&format!("Could not embed {}", file));
            }
        }
        Err(e) => {
            Output::error(&format!("Ingest failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
