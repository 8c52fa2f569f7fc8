//! Replay insights for a game in progress.
//!
//! Each replay index gets three independent analyses of the current game
//! state, and the running game summary is extended with them. Summaries are
//! chained: index `n` builds on the summary stored for `n - 1`, which is the
//! same summary the realtime video branch reads as previous context.

mod openai;

pub use openai::OpenAIInsightModel;

use crate::config::Prompts;
use crate::context::ContextStore;
use crate::error::{DugoutError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The game state at one replay index, as reported by the live data feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSnapshot {
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub inning: u32,
    /// "top" or "bottom".
    pub half_inning: String,
    pub play_description: String,
    pub balls: u8,
    pub strikes: u8,
    pub outs: u8,
    pub away_score: u32,
    pub home_score: u32,
    pub batter: String,
    pub pitcher: String,
    pub runners_on_base: u8,
    /// Background on the matchup from earlier games.
    pub historical_notes: Option<String>,
}

impl GameSnapshot {
    fn count(&self) -> String {
        format!("{}-{}", self.balls, self.strikes)
    }

    fn inning_label(&self) -> String {
        if self.half_inning.trim().is_empty() {
            self.inning.to_string()
        } else {
            format!("{} ({})", self.inning, self.half_inning)
        }
    }

    fn score(&self) -> String {
        format!("{}-{}", self.away_score, self.home_score)
    }

    fn historical_notes(&self) -> Option<&str> {
        self.historical_notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
    }

    /// Plain-text description of the situation for prompts.
    pub fn context_block(&self) -> String {
        format!(
            "Inning: {}\nCount: {}\nOuts: {}\nScore ({} at {}): {}\nBatter: {}\nPitcher: {}\nRunners on base: {}\nLast play: {}",
            self.inning_label(),
            self.count(),
            self.outs,
            self.away_team,
            self.home_team,
            self.score(),
            self.batter,
            self.pitcher,
            self.runners_on_base,
            self.play_description,
        )
    }

    fn variables(&self, past_summary: &str) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("home_team".to_string(), self.home_team.clone());
        vars.insert("away_team".to_string(), self.away_team.clone());
        vars.insert("league".to_string(), self.league.clone());
        vars.insert("play".to_string(), self.play_description.clone());
        vars.insert("count".to_string(), self.count());
        vars.insert("inning".to_string(), self.inning_label());
        vars.insert("score".to_string(), self.score());
        vars.insert("batter".to_string(), self.batter.clone());
        vars.insert("pitcher".to_string(), self.pitcher.clone());
        vars.insert("runners".to_string(), self.runners_on_base.to_string());
        vars.insert("game_context".to_string(), self.context_block());
        vars.insert(
            "historical".to_string(),
            self.historical_notes().unwrap_or("None available.").to_string(),
        );
        let past = if past_summary.trim().is_empty() {
            "The game has just started."
        } else {
            past_summary
        };
        vars.insert("past_summary".to_string(), past.to_string());
        vars
    }
}

/// Analyses generated for one replay index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInsights {
    pub index: u64,
    pub play_analysis: String,
    pub strategic_analysis: String,
    /// Only produced when the snapshot carries background notes.
    pub pattern_analysis: Option<String>,
    pub strategic_prediction: String,
    /// Summary of the game up to and including this index.
    pub game_summary: String,
}

impl GameInsights {
    fn prompt_block(
        play_analysis: &str,
        strategic_analysis: &str,
        pattern_analysis: Option<&str>,
        strategic_prediction: &str,
        snapshot: &GameSnapshot,
    ) -> String {
        let mut block = format!(
            "Play analysis:\n{}\n\nStrategic analysis:\n{}\n\n",
            play_analysis, strategic_analysis
        );
        if let Some(patterns) = pattern_analysis {
            block.push_str(&format!("Pattern analysis:\n{}\n\n", patterns));
        }
        block.push_str(&format!(
            "Strategic prediction:\n{}\n\nSituation:\n{}",
            strategic_prediction,
            snapshot.context_block()
        ));
        block
    }
}

/// A text model that insight prompts are sent to.
#[async_trait]
pub trait InsightModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generates replay insights and keeps the running game summary current.
pub struct InsightGenerator {
    model: Arc<dyn InsightModel>,
    prompts: Prompts,
    context: ContextStore,
}

impl InsightGenerator {
    pub fn new(model: Arc<dyn InsightModel>, prompts: Prompts, context: ContextStore) -> Self {
        Self {
            model,
            prompts,
            context,
        }
    }

    /// Insights for `index`, generated once and then served from the context store.
    ///
    /// The play, pattern and prediction analyses run concurrently. The game
    /// summary for `index` is only written when none exists yet.
    #[instrument(skip(self, snapshot))]
    pub async fn generate(&self, index: u64, snapshot: &GameSnapshot) -> Result<GameInsights> {
        if let Some(cached) = self.context.insights(index).await? {
            match serde_json::from_str::<GameInsights>(&cached) {
                Ok(insights) => {
                    debug!("Using stored insights");
                    return Ok(insights);
                }
                Err(e) => warn!("Regenerating unreadable stored insights: {}", e),
            }
        }

        let past_summary = match index.checked_sub(1) {
            Some(previous) => self.context.summary(previous).await?.unwrap_or_default(),
            None => String::new(),
        };
        let vars = snapshot.variables(&past_summary);

        let (play, patterns, prediction) = tokio::join!(
            self.analyze_play(&vars),
            self.analyze_patterns(snapshot, &vars),
            self.ask(&self.prompts.insight.prediction, &vars),
        );
        let (play_analysis, strategic_analysis) = play?;
        let pattern_analysis = patterns?;
        let strategic_prediction = prediction?;

        let game_summary = match self.context.summary(index).await? {
            Some(existing) if !existing.trim().is_empty() => existing,
            _ => {
                let mut summary_vars = vars.clone();
                summary_vars.insert(
                    "insights".to_string(),
                    GameInsights::prompt_block(
                        &play_analysis,
                        &strategic_analysis,
                        pattern_analysis.as_deref(),
                        &strategic_prediction,
                        snapshot,
                    ),
                );
                let summary = self.ask(&self.prompts.insight.summary, &summary_vars).await?;
                self.context.put_summary(index, &summary).await?;
                summary
            }
        };

        let insights = GameInsights {
            index,
            play_analysis,
            strategic_analysis,
            pattern_analysis,
            strategic_prediction,
            game_summary,
        };
        self.context
            .put_insights(index, &serde_json::to_string(&insights)?)
            .await?;

        info!("Generated insights for replay index {}", index);
        Ok(insights)
    }

    async fn analyze_play(&self, vars: &HashMap<String, String>) -> Result<(String, String)> {
        tokio::try_join!(
            self.ask(&self.prompts.insight.play, vars),
            self.ask(&self.prompts.insight.strategy, vars),
        )
    }

    async fn analyze_patterns(
        &self,
        snapshot: &GameSnapshot,
        vars: &HashMap<String, String>,
    ) -> Result<Option<String>> {
        if snapshot.historical_notes().is_none() {
            debug!("No background notes, skipping pattern analysis");
            return Ok(None);
        }
        self.ask(&self.prompts.insight.pattern, vars).await.map(Some)
    }

    async fn ask(&self, template: &str, vars: &HashMap<String, String>) -> Result<String> {
        let prompt = self.prompts.render_with_custom(template, vars);
        let response = self.model.generate(&prompt).await?;
        let response = response.trim();
        if response.is_empty() {
            return Err(DugoutError::Insight("Empty response from model".to_string()));
        }
        Ok(response.to_string())
    }
}
