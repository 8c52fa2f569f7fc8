//! Analyze-segments command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::video::{GeminiClient, GeminiVideoAnalyzer, SegmentAnalyzer};
use anyhow::Result;
use std::sync::Arc;

/// Run the analyze-segments command.
pub async fn run_analyze_segments(video_dir: &str, out_dir: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::AnalyzeSegments, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let client = GeminiClient::from_settings(&settings.video)?;
    let analyzer = SegmentAnalyzer::new(Arc::new(GeminiVideoAnalyzer::new(client, prompts)))
        .with_concurrency(settings.video.max_concurrent)
        .with_max_passes(settings.video.max_passes);

    let video_dir = Settings::expand_path(video_dir);
    let out_dir = Settings::expand_path(out_dir);

    let spinner = Output::spinner(&format!("Analyzing segments in {}...", video_dir.display()));
    let report = analyzer.process_segments(&video_dir, &out_dir).await;
    spinner.finish_and_clear();

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            Output::error(&format!("Segment analysis failed: {}", e));
            return Err(e.into());
        }
    };

    Output::success(&format!(
        "Wrote {} analyses to {}",
        report.written.len(),
        out_dir.join("event").display()
    ));
    if report.existing > 0 {
        Output::info(&format!("{} segments were already analyzed", report.existing));
    }
    for failed in &report.failed {
        Output::warning(&format!("Gave up on {}", failed));
    }

    Ok(())
}
