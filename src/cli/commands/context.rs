//! Context command implementation.

use crate::cli::{ContextAction, Output};
use crate::config::Settings;
use crate::context::{ContextStore, SqliteKeyedStore};
use anyhow::Result;
use std::sync::Arc;

/// Run the context command.
pub async fn run_context(action: &ContextAction, settings: Settings) -> Result<()> {
    let context = ContextStore::new(Arc::new(SqliteKeyedStore::new(&settings.context_path())?));

    match action {
        ContextAction::ImportSync { path } => {
            let path = Settings::expand_path(path);
            let count = context.import_sync_file(&path).await?;
            Output::success(&format!("Imported {} segment links from {}", count, path.display()));
        }

        ContextAction::PutSummary { index, summary, file } => {
            let text = match (summary, file) {
                (Some(text), _) => text.clone(),
                (None, Some(file)) => tokio::fs::read_to_string(Settings::expand_path(file)).await?,
                (None, None) => anyhow::bail!("a summary or --file is required"),
            };
            context.put_summary(*index, text.trim()).await?;
            Output::success(&format!("Stored summary for replay index {}", index));
        }
    }

    Ok(())
}
