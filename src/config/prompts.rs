//! Prompt templates for Dugout.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub classifier: ClassifierPrompts,
    pub answer: AnswerPrompts,
    pub video: VideoPrompts,
    pub search: SearchPrompts,
    pub insight: InsightPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for model-backed query classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierPrompts {
    pub system: String,
    pub user: String,
}

impl Default for ClassifierPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an expert sports query analyzer and optimizer. You analyze a user's question about a baseball game that is being watched live and decide how it should be answered.

Analysis:
1. Decide whether the query needs realtime information (live updates), historical information (past events within the current game), or a search for general information about a team or player.
2. Realtime cues include phrases like "right now", "currently", "any updates", "in this".
3. Historical cues (within the current game) include "in the 7th inning", "last 3 innings", "20 minutes ago" or other specific times within the current game.
4. Anything about past games, general statistics, player or team background, or anything beyond the current game is a search.
5. For historical queries, copy any specific time reference verbatim ("7th inning", "last 3 innings", "20 minutes ago").

Query optimization:
1. Identify the core request (score, stats, player info).
2. Resolve vague references to teams, players or times.
3. Rewrite the query so a retrieval system or web search understands it without the conversation.
4. Keep the user's intent. For "search", phrase the query for a web search.

Respond with a single JSON object and nothing else:
{"type": "realtime" | "historical" | "search", "time_reference": "<time string>" | null, "optimized_query": "<rewritten query>"}"#
                .to_string(),

            user: r#"Examples:
Query: "What's the score of the game right now?"
{"type": "realtime", "time_reference": null, "optimized_query": "What is the current score of the game?"}
Query: "Any score updates?"
{"type": "realtime", "time_reference": null, "optimized_query": "What is the latest score of the game?"}
Query: "Show me the highlights from the game"
{"type": "historical", "time_reference": null, "optimized_query": "Show the highlights from the current game"}
Query: "What happened 20 minutes ago?"
{"type": "historical", "time_reference": "20 minutes ago", "optimized_query": "What were the key events that happened 20 minutes ago within the current game?"}
Query: "What about the game yesterday"
{"type": "search", "time_reference": null, "optimized_query": "Search for the final scores and statistics from the game that was played yesterday."}
Query: "Are they winning"
{"type": "realtime", "time_reference": null, "optimized_query": "Is the team winning in their current match?"}
Query: "What was the score at the half?"
{"type": "historical", "time_reference": "half", "optimized_query": "What was the score at halftime in the current game?"}
Query: "How many home runs did they hit yesterday?"
{"type": "search", "time_reference": null, "optimized_query": "Search for the number of home runs hit by the team in the game yesterday."}

Query: "{{query}}""#
                .to_string(),
        }
    }
}

/// Prompts for answering from retrieved game segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    pub system: String,
    pub user: String,
    /// Returned without a model call when nothing was retrieved.
    pub no_information: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            system: r#"You answer questions about a baseball game that is in progress, using only the game segments provided.

Guidelines:
- Use only the information in the segments; if they do not contain the answer, say it cannot be determined from the available information
- Be concise and direct
- Do not mention file names or citations in the answer
- Use the segment times to give the answer a logical order, and mention the time of an event when it helps"#
                .to_string(),

            user: r#"Question: {{query}}
Current game time: {{current_time}} seconds

Game segments:
{{chunks}}

Answer the question from the segments above."#
                .to_string(),

            no_information: "No information is available about this as of now.".to_string(),
        }
    }
}

/// Prompts for video analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoPrompts {
    /// System instruction for answering a question about a live segment.
    pub realtime_system: String,
    /// Appended to the realtime system instruction when a past-game summary exists.
    pub previous_context: String,
    /// System instruction for offline segment analysis.
    pub segment_system: String,
    /// Structured analysis request producing one segment file.
    pub segment_analysis: String,
}

impl Default for VideoPrompts {
    fn default() -> Self {
        Self {
            realtime_system: "When given a video and a query, provide answer to the user query based on the provided video."
                .to_string(),

            previous_context: r#"Here is a summary of everything that has happened in the game so far. Use it as reference context, and answer the query by analyzing the video.

Previous context:
{{summary}}"#
                .to_string(),

            segment_system: "When given a video of a baseball game, return only the requested JSON object for that video."
                .to_string(),

            segment_analysis: r#"Analyze the provided video of a baseball game.

Return a JSON object with the following keys:

1. "play_by_play": a string with a detailed, engaging explanation of the play, as live sports commentary. Cover key actions by the batter, pitcher, runners and fielders, including pitch type (if discernible), swing mechanics, ball trajectory and fielder movement. Include player names if identifiable. Use audio cues (bat crack, crowd reaction, umpire calls). If no play occurs, briefly describe the scene, like "The pitcher is taking warm-up tosses on the mound".

2. "major_events": a string listing every major event in the video as "start-end: Event description" (seconds, relative to the start of the segment), separated by semicolons. Major events include home run, single, double, triple, stolen base, caught stealing, walk, hit by pitch, strikeout, wild pitch, passed ball, balk, double play, triple play, error, fielder's choice, sacrifice bunt, sacrifice fly, infield fly, ground-rule double, interference, uncaught third strike, force out, tag out and pick off, plus any other event you judge important. Use an empty string when there are none.

3. "is_major": "1" if any major event occurs in the segment, otherwise "0".
4. "homerun": "1" if a home run occurs in the segment, otherwise "0".
5. "out": "1" if any batter is out in the segment (strikeout, force out, tag out, fly out, ...), otherwise "0".
6. "strategies": a string listing the strategies observed, separated by semicolons, such as stealing a base, hit and run, bunting, intentional walk, pitching around a batter, defensive shift, pick off attempt or squeeze play. Use an empty string when there are none.

Output format:
{
  "play_by_play": "...",
  "major_events": "...",
  "is_major": "...",
  "homerun": "...",
  "out": "...",
  "strategies": "..."
}

Example, a single followed by a steal:
{
  "play_by_play": "The pitcher delivers a fastball, low and inside. Smith sends a grounder toward the shortstop and beats the throw to first for a single. Smith takes off on the next pitch and slides into second, safe! Steal of second!",
  "major_events": "5-7: Single; 15-17: Stolen base",
  "is_major": "1",
  "homerun": "0",
  "out": "0",
  "strategies": "Stealing a base"
}

Example, no play:
{
  "play_by_play": "The pitcher is standing on the mound, adjusting his cap. The game is in a lull.",
  "major_events": "",
  "is_major": "0",
  "homerun": "0",
  "out": "0",
  "strategies": ""
}"#
            .to_string(),
        }
    }
}

/// Prompts for answering from web search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SearchPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an MLB researcher. Answer the user's question using only the web search results provided.

Guidelines:
- Answer as soon as the results contain the answer; do not speculate beyond them
- Be concise
- If the results do not answer the question, say so"#
                .to_string(),

            user: r#"Question: {{query}}

Search results:
{{results}}

Answer the question from the search results above."#
                .to_string(),
        }
    }
}

/// Prompts for replay insights and the running game summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightPrompts {
    pub system: String,
    /// Play-by-play explanation for casual fans.
    pub play: String,
    /// Managerial reasoning behind the current situation.
    pub strategy: String,
    /// Batter and pitcher tendencies; only asked when background notes exist.
    pub pattern: String,
    pub prediction: String,
    /// Folds the new insights into the summary of the game so far.
    pub summary: String,
}

impl Default for InsightPrompts {
    fn default() -> Self {
        Self {
            system: "You are a baseball analyst writing for fans watching a game in progress. Use only the context you are given, and keep every answer concise."
                .to_string(),

            play: r#"The {{home_team}} host the {{away_team}} ({{league}}). Explain the current play for a casual fan.
Use the game so far only as background. If you use the background notes, say so and be precise.

Game so far:
{{past_summary}}

Current situation:
{{game_context}}

Background notes:
{{historical}}

Play: {{play}}
Count: {{count}}
Inning: {{inning}}

Cover:
1. The key action and its result
2. Why the play matters in this game
3. Anything interesting or unusual

Use everyday language and keep it short."#
                .to_string(),

            strategy: r#"The {{home_team}} host the {{away_team}} ({{league}}). Analyze the strategy of the current situation.

1. Why are the teams making their current decisions?
2. What options does each team have here?
3. What is likely to happen next in the short term?

Focus on managerial decisions. Background notes describe earlier games, never this one.

Game so far:
{{past_summary}}

Current situation:
{{game_context}}
Matchup: {{batter}} vs {{pitcher}}
Score (away-home): {{score}}

Background notes:
{{historical}}"#
                .to_string(),

            pattern: r#"The {{home_team}} host the {{away_team}} ({{league}}). {{batter}} is batting against {{pitcher}}.

1. Identify patterns in pitch sequences, batter tendencies and situational approaches.
2. From those patterns, what are the likely outcomes of this at-bat, and why?
3. Point out a trend a spectator might miss.

Game so far:
{{past_summary}}

Background notes:
{{historical}}"#
                .to_string(),

            prediction: r#"The {{home_team}} host the {{away_team}} ({{league}}). Predict the upcoming strategic decisions.
Use the game so far only as background.

Game so far:
{{past_summary}}

Current situation:
{{game_context}}
Inning: {{inning}}
Runners on base: {{runners}}

Predict and explain:
1. Likely pitching decisions
2. Batting adjustments
3. Strategic moves such as bunts, steals or defensive alignment
4. The manager's likely thinking

Keep it short."#
                .to_string(),

            summary: r#"The {{home_team}} host the {{away_team}} ({{league}}). Write a detailed summary of the game so far from the previous summary and the latest insights.

Cover:
1. Key moments and turning points
2. Standout performances
3. Strategic decisions and their impact
4. The flow of the game, including momentum shifts

Previous summary:
{{past_summary}}

Latest insights:
{{insights}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let classifier_path = custom_path.join("classifier.toml");
            if classifier_path.exists() {
                let content = std::fs::read_to_string(&classifier_path)?;
                prompts.classifier = toml::from_str(&content)?;
            }

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }

            let video_path = custom_path.join("video.toml");
            if video_path.exists() {
                let content = std::fs::read_to_string(&video_path)?;
                prompts.video = toml::from_str(&content)?;
            }

            let search_path = custom_path.join("search.toml");
            if search_path.exists() {
                let content = std::fs::read_to_string(&search_path)?;
                prompts.search = toml::from_str(&content)?;
            }

            let insight_path = custom_path.join("insight.toml");
            if insight_path.exists() {
                let content = std::fs::read_to_string(&insight_path)?;
                prompts.insight = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
