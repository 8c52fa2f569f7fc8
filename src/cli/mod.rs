//! CLI module for Dugout.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Dugout - live baseball game question answering
///
/// Routes questions about a game in progress to live video analysis, to
/// time-aware retrieval over the game so far, or to web search.
#[derive(Parser, Debug)]
#[command(name = "dugout")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a directory of segment analysis files
    Ingest {
        /// Directory containing segment_N.txt files
        dir: String,

        /// Game ID to index under (default from config)
        #[arg(short, long)]
        game: Option<String>,
    },

    /// Ask a question about the game
    Ask {
        /// The question to ask
        query: String,

        /// Current game time ("150", "2:30", "2 min 30 s")
        #[arg(long)]
        at: String,

        /// Video segment file name in the configured segment directory
        #[arg(long)]
        video: Option<String>,

        /// Only use segments from this game
        #[arg(short, long)]
        game: Option<String>,

        /// Print the raw JSON envelope
        #[arg(long)]
        json: bool,
    },

    /// Show the segments a historical question retrieves
    Retrieve {
        /// The question to retrieve for
        query: String,

        /// Current game time
        #[arg(long)]
        at: String,

        /// Only use segments from this game
        #[arg(short, long)]
        game: Option<String>,

        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },

    /// Show how a question is classified, filtered and rewritten
    Plan {
        /// The question to plan
        query: String,

        /// Current game time
        #[arg(long)]
        at: String,
    },

    /// Produce segment analysis files from video segments
    AnalyzeSegments {
        /// Directory containing segment_N.mp4 files
        video_dir: String,

        /// Output directory; files are written to <out_dir>/event
        out_dir: String,
    },

    /// Generate insights and the game summary for one replay position
    Insights {
        /// JSON file with the game state at that position
        snapshot: String,

        /// Replay index
        #[arg(long, conflicts_with = "segment", required_unless_present = "segment")]
        index: Option<u64>,

        /// Video segment linked to the replay index
        #[arg(long)]
        segment: Option<String>,

        /// Print JSON instead of sections
        #[arg(long)]
        json: bool,
    },

    /// List indexed games
    List,

    /// Manage live-game context (segment links and summaries)
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContextAction {
    /// Import segment-to-replay links from a JSON file
    ImportSync {
        /// JSON object of segment name -> replay index
        path: String,
    },

    /// Store the game summary for a replay index
    PutSummary {
        /// Replay index
        index: u64,

        /// Summary text
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        summary: Option<String>,

        /// Read the summary from a file
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from([
            "dugout", "-v", "ask", "Show me the latest homerun", "--at", "2:30",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Ask { query, at, video, .. } => {
                assert_eq!(query, "Show me the latest homerun");
                assert_eq!(at, "2:30");
                assert!(video.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_insights_needs_index_or_segment() {
        assert!(Cli::try_parse_from(["dugout", "insights", "state.json"]).is_err());
        assert!(Cli::try_parse_from([
            "dugout", "insights", "state.json", "--index", "3", "--segment", "segment_1.mp4"
        ])
        .is_err());
        let cli = Cli::parse_from(["dugout", "insights", "state.json", "--segment", "segment_1.mp4"]);
        match cli.command {
            Commands::Insights { segment, index, .. } => {
                assert_eq!(segment.as_deref(), Some("segment_1.mp4"));
                assert!(index.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_put_summary_needs_text_or_file() {
        assert!(Cli::try_parse_from(["dugout", "context", "put-summary", "3"]).is_err());
        assert!(Cli::try_parse_from(["dugout", "context", "put-summary", "3", "Top of the 1st"]).is_ok());
    }
}
