//! Insights command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::context::{ContextStore, SqliteKeyedStore};
use crate::insight::{GameSnapshot, InsightGenerator, OpenAIInsightModel};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Run the insights command.
pub async fn run_insights(
    snapshot_path: &str,
    index: Option<u64>,
    segment: Option<&str>,
    json: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Insights, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = Settings::expand_path(snapshot_path);
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot: GameSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Invalid game snapshot in {}", path.display()))?;

    let context = ContextStore::new(Arc::new(SqliteKeyedStore::new(&settings.context_path())?));
    let index = match (index, segment) {
        (Some(index), _) => index,
        (None, Some(segment)) => match context.index_for_segment(segment).await? {
            Some(index) => index,
            None => anyhow::bail!("No replay index is linked to {}", segment),
        },
        (None, None) => anyhow::bail!("--index or --segment is required"),
    };

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let model = OpenAIInsightModel::new(&settings.insight, &prompts)?;
    let generator = InsightGenerator::new(Arc::new(model), prompts, context);

    let spinner = Output::spinner(&format!("Generating insights for replay index {}...", index));
    let result = generator.generate(index, &snapshot).await;
    spinner.finish_and_clear();

    let insights = match result {
        Ok(insights) => insights,
        Err(e) => {
            Output::error(&format!("Insight generation failed: {}", e));
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    Output::header("Play");
    println!("{}", insights.play_analysis);
    Output::header("Strategy");
    println!("{}", insights.strategic_analysis);
    if let Some(patterns) = &insights.pattern_analysis {
        Output::header("Patterns");
        println!("{}", patterns);
    }
    Output::header("What's next");
    println!("{}", insights.strategic_prediction);
    Output::header("Game so far");
    println!("{}", insights.game_summary);

    Ok(())
}
