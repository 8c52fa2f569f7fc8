//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.list_games().await {
        Ok(games) => {
            if games.is_empty() {
                Output::info("No games indexed yet. Use 'dugout ingest <dir>' to add one.");
            } else {
                Output::header(&format!("Indexed Games ({})", games.len()));
                println!();

                for game in &games {
                    Output::game_info(
                        &game.game_id,
                        game.segment_count,
                        game.last_time,
                        &game.indexed_at.format("%Y-%m-%d %H:%M").to_string(),
                    );
                }

                let total_segments: u32 = games.iter().map(|g| g.segment_count).sum();
                println!();
                Output::kv("Total games", &games.len().to_string());
                Output::kv("Total segments", &total_segments.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list games: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
