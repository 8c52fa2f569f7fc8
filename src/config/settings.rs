//! Configuration settings for Dugout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub ingest: IngestSettings,
    pub classifier: ClassifierSettings,
    pub retrieval: RetrievalSettings,
    pub answer: AnswerSettings,
    pub video: VideoSettings,
    pub search: SearchSettings,
    pub context: ContextSettings,
    pub insight: InsightSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.dugout".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.dugout/segments.db".to_string(),
        }
    }
}

/// Segment ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Game time added per parsed segment file.
    pub step_seconds: i64,
    /// Game ID used when none is given.
    pub default_game_id: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            step_seconds: 30,
            default_game_id: "live".to_string(),
        }
    }
}

/// How queries are classified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// Deterministic keyword rules.
    #[default]
    Rules,
    /// Few-shot prompted chat model.
    Llm,
}

impl std::str::FromStr for ClassifierMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rules" | "rule" => Ok(ClassifierMode::Rules),
            "llm" | "openai" => Ok(ClassifierMode::Llm),
            _ => Err(format!("Unknown classifier mode: {}", s)),
        }
    }
}

impl std::fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierMode::Rules => write!(f, "rules"),
            ClassifierMode::Llm => write!(f, "llm"),
        }
    }
}

/// Query classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub mode: ClassifierMode,
    /// Chat model for `llm` mode.
    pub model: String,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::Rules,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Historical retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Candidates requested from the index.
    pub top_k: usize,
    /// Half-width of the band an `EQ` time filter matches.
    pub point_tolerance_seconds: i64,
    /// Scores closer than this are treated as equal and ordered by recency.
    pub score_tie_epsilon: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            point_tolerance_seconds: 15,
            score_tie_epsilon: 0.01,
        }
    }
}

/// Answer synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    pub model: String,
    pub temperature: f32,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
        }
    }
}

/// Video analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Base URL of the Gemini API.
    pub api_base: String,
    /// Gemini model ID.
    pub model: String,
    /// Seconds between file state polls.
    pub poll_interval_secs: u64,
    /// Polls before giving up on an uploaded file.
    pub max_polls: u32,
    /// Segments analyzed at once by `analyze-segments`.
    pub max_concurrent: usize,
    /// Extra passes over segments that failed.
    pub max_passes: u32,
    /// Request timeout for uploads and generation.
    pub timeout_secs: u64,
    /// Directory that realtime questions name video segments in.
    pub segment_dir: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            poll_interval_secs: 10,
            max_polls: 30,
            max_concurrent: 4,
            max_passes: 3,
            timeout_secs: 300,
            segment_dir: "~/.dugout/segments".to_string(),
        }
    }
}

/// Web search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Serper search endpoint.
    pub endpoint: String,
    /// Organic results passed to the model.
    pub max_results: usize,
    /// Chat model that answers from the results.
    pub model: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://google.serper.dev/search".to_string(),
            max_results: 5,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Replay context store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Path to the SQLite key-value database.
    pub sqlite_path: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.dugout/context.db".to_string(),
        }
    }
}

/// Replay insight generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightSettings {
    /// Chat model that writes the analyses and the running game summary.
    pub model: String,
    pub temperature: f32,
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::DugoutError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dugout")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded segment index path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Get the expanded context store path.
    pub fn context_path(&self) -> PathBuf {
        Self::expand_path(&self.context.sqlite_path)
    }

    /// Get the expanded realtime segment directory.
    pub fn segment_dir(&self) -> PathBuf {
        Self::expand_path(&self.video.segment_dir)
    }
}
