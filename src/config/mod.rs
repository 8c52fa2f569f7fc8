//! Configuration module for Dugout.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{
    AnswerPrompts, ClassifierPrompts, InsightPrompts, Prompts, SearchPrompts, VideoPrompts,
};
pub use settings::{
    AnswerSettings, ClassifierMode, ClassifierSettings, ContextSettings, EmbeddingSettings,
    GeneralSettings, IngestSettings, InsightSettings, PromptSettings, RetrievalSettings,
    SearchSettings, Settings, VectorStoreSettings, VideoSettings,
};
