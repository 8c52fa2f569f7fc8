//! Dugout CLI entry point.

use anyhow::Result;
use clap::Parser;
use dugout::cli::{commands, Cli, Commands};
use dugout::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("dugout={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Ensure data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Ingest { dir, game } => {
            commands::run_ingest(dir, game.clone(), settings).await?;
        }

        Commands::Ask {
            query,
            at,
            video,
            game,
            json,
        } => {
            commands::run_ask(query, at, video.clone(), game.clone(), *json, settings).await?;
        }

        Commands::Retrieve {
            query,
            at,
            game,
            json,
        } => {
            commands::run_retrieve(query, at, game.clone(), *json, settings).await?;
        }

        Commands::Plan { query, at } => {
            commands::run_plan(query, at, settings).await?;
        }

        Commands::AnalyzeSegments { video_dir, out_dir } => {
            commands::run_analyze_segments(video_dir, out_dir, settings).await?;
        }

        Commands::Insights {
            snapshot,
            index,
            segment,
            json,
        } => {
            commands::run_insights(snapshot, *index, segment.as_deref(), *json, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Context { action } => {
            commands::run_context(action, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
