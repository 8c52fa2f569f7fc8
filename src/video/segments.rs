//! Offline production of segment analysis files.

use super::VideoAnalyzer;
use crate::error::{DugoutError, Result};
use crate::ingest::{parse_segment, SegmentIngestor};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "avi"];

/// Outcome of one `process_segments` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SegmentRunReport {
    /// Analysis files written by this run.
    pub written: Vec<PathBuf>,
    /// Segments that already had an analysis file.
    pub existing: usize,
    /// Segments still without a usable analysis after every pass.
    pub failed: Vec<String>,
}

/// Runs the segment analysis prompt over a directory of video segments.
pub struct SegmentAnalyzer {
    analyzer: Arc<dyn VideoAnalyzer>,
    max_concurrent: usize,
    max_passes: u32,
}

impl SegmentAnalyzer {
    pub fn new(analyzer: Arc<dyn VideoAnalyzer>) -> Self {
        Self {
            analyzer,
            max_concurrent: 4,
            max_passes: 3,
        }
    }

    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Video segments in `dir`, in replay order.
    pub fn list_videos(dir: &Path) -> Result<Vec<PathBuf>> {
        let files = SegmentIngestor::list_segment_files(dir)?;
        Ok(files
            .into_iter()
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Where the analysis of `video` goes: `<out>/event/<stem>.txt`.
    pub fn output_path(out_dir: &Path, video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "segment".to_string());
        out_dir.join("event").join(format!("{}.txt", stem))
    }

    /// Analyze every segment in `video_dir` that has no analysis yet.
    ///
    /// Segments whose analysis fails or cannot be parsed are retried on the
    /// next pass, up to the pass limit.
    #[instrument(skip(self), fields(video_dir = %video_dir.display(), out_dir = %out_dir.display()))]
    pub async fn process_segments(&self, video_dir: &Path, out_dir: &Path) -> Result<SegmentRunReport> {
        let videos = Self::list_videos(video_dir)?;
        if videos.is_empty() {
            return Err(DugoutError::NoSegments(format!(
                "no video segments in {}",
                video_dir.display()
            )));
        }
        tokio::fs::create_dir_all(out_dir.join("event")).await?;

        let mut report = SegmentRunReport::default();
        let mut pending: Vec<PathBuf> = Vec::new();
        for video in videos {
            if Self::output_path(out_dir, &video).exists() {
                report.existing += 1;
            } else {
                pending.push(video);
            }
        }

        for pass in 1..=self.max_passes {
            if pending.is_empty() {
                break;
            }
            info!(pass, "Analyzing {} segments", pending.len());

            let results: Vec<(PathBuf, Result<PathBuf>)> = stream::iter(pending.drain(..))
                .map(|video| async move {
                    let result = self.analyze_one(&video, out_dir).await;
                    (video, result)
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;

            for (video, result) in results {
                match result {
                    Ok(path) => report.written.push(path),
                    Err(e) => {
                        warn!(pass, "Segment {} failed: {}", video.display(), e);
                        pending.push(video);
                    }
                }
            }
        }

        pending.sort_by_key(|p| {
            p.file_name()
                .and_then(|n| SegmentIngestor::segment_number(&n.to_string_lossy()))
        });
        report.failed = pending
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        report.written.sort();

        info!(
            "Wrote {} analyses ({} existing, {} failed)",
            report.written.len(),
            report.existing,
            report.failed.len()
        );
        Ok(report)
    }

    async fn analyze_one(&self, video: &Path, out_dir: &Path) -> Result<PathBuf> {
        let text = self.analyzer.describe_segment(video).await?;

        // A reply that ingestion cannot read is as good as no reply.
        parse_segment(&text).map_err(|reason| DugoutError::IngestParse {
            file: video.display().to_string(),
            reason,
        })?;

        let path = Self::output_path(out_dir, video);
        tokio::fs::write(&path, text.trim()).await?;
        Ok(path)
    }
}
