//! Plan command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::query::time_expr::parse_clock;
use anyhow::Result;

/// Run the plan command.
pub async fn run_plan(query: &str, at: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Plan, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let current_time = parse_clock(at)?;
    let orchestrator = Orchestrator::new(settings)?;
    let plan = orchestrator.plan(query, current_time).await?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
