//! CLI command implementations.

mod analyze_segments;
mod ask;
mod config;
mod context;
mod ingest;
mod insights;
mod list;
mod plan;
mod retrieve;
mod serve;

pub use analyze_segments::run_analyze_segments;
pub use ask::run_ask;
pub use config::run_config;
pub use context::run_context;
pub use ingest::run_ingest;
pub use insights::run_insights;
pub use list::run_list;
pub use plan::run_plan;
pub use retrieve::run_retrieve;
pub use serve::run_serve;
