//! Segment ingestion: turns a directory of per-segment analysis files into
//! ordered, time-stamped records ready for embedding.
//!
//! Game time is injected from file order, not read from the files: every
//! successfully parsed segment advances the clock by a fixed step.

mod payload;

pub use payload::{parse_segment, SegmentPayload};

use crate::error::{DugoutError, Result};
use crate::vector_store::{flag, ChunkMetadata};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, instrument, warn};

/// Game time added per parsed segment.
pub const DEFAULT_STEP_SECONDS: i64 = 30;

static SEGMENT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"segment_(\d+)").expect("Invalid regex"));

/// One ingested unit of game history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSegmentRecord {
    /// Ordinal position among the game's parsed segments.
    pub segment_index: i64,
    /// Cumulative game time at the end of this segment.
    pub elapsed_time_seconds: i64,
    pub description: String,
    #[serde(with = "flag")]
    pub is_major: bool,
    #[serde(with = "flag")]
    pub homerun: bool,
    #[serde(with = "flag")]
    pub out: bool,
    /// Originating file name.
    pub source_reference: String,
}

impl GameSegmentRecord {
    /// Index metadata for this record.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            time: self.elapsed_time_seconds,
            is_major: self.is_major,
            homerun: self.homerun,
            out: self.out,
            source_reference: self.source_reference.clone(),
        }
    }
}

/// A file that was left out of the ingest.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// Outcome of ingesting one directory.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub records: Vec<GameSegmentRecord>,
    pub skipped: Vec<SkippedFile>,
}

/// Parses segment files into [`GameSegmentRecord`]s.
#[derive(Debug, Clone)]
pub struct SegmentIngestor {
    step_seconds: i64,
}

impl Default for SegmentIngestor {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_SECONDS)
    }
}

impl SegmentIngestor {
    pub fn new(step_seconds: i64) -> Self {
        Self { step_seconds }
    }

    /// Segment number embedded in a file name (`segment_12.txt` -> 12).
    pub fn segment_number(file_name: &str) -> Option<u64> {
        SEGMENT_NUMBER
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Segment files in replay order; files without a number go last.
    pub fn list_segment_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| DugoutError::NoSegments(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<(Option<u64>, String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            files.push((Self::segment_number(&name), name, path));
        }

        files.sort_by(|a, b| match (a.0, b.0) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.1.cmp(&b.1)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.1.cmp(&b.1),
        });

        Ok(files.into_iter().map(|(_, _, path)| path).collect())
    }

    /// Ingest every segment file in `dir`.
    ///
    /// Unreadable or unparseable files are skipped and reported. A directory
    /// that yields no records at all is a [`DugoutError::NoSegments`].
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn ingest(&self, dir: &Path) -> Result<IngestReport> {
        let files = Self::list_segment_files(dir)?;
        if files.is_empty() {
            warn!("No files found in {}", dir.display());
            return Err(DugoutError::NoSegments(dir.display().to_string()));
        }

        let mut records = Vec::new();
        let mut skipped = Vec::new();
        let mut elapsed = 0i64;

        for path in &files {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            let payload = match Self::read_payload(path, &file) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Skipping segment: {}", e);
                    let reason = match e {
                        DugoutError::IngestParse { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    skipped.push(SkippedFile { file, reason });
                    continue;
                }
            };

            elapsed += self.step_seconds;
            debug!(file = %file, elapsed, "Parsed segment");

            records.push(GameSegmentRecord {
                segment_index: records.len() as i64,
                elapsed_time_seconds: elapsed,
                description: payload.describe(elapsed),
                is_major: payload.is_major,
                homerun: payload.homerun,
                out: payload.out,
                source_reference: file,
            });
        }

        if records.is_empty() {
            return Err(DugoutError::NoSegments(format!(
                "{} ({} files, all skipped)",
                dir.display(),
                skipped.len()
            )));
        }

        info!(
            "Ingested {} segments from {} ({} skipped)",
            records.len(),
            dir.display(),
            skipped.len()
        );

        Ok(IngestReport { records, skipped })
    }

    fn read_payload(path: &Path, file: &str) -> Result<SegmentPayload> {
        let parse_error = |reason: String| DugoutError::IngestParse {
            file: file.to_string(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|e| parse_error(e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| parse_error("content is not valid UTF-8".to_string()))?;

        let payload = parse_segment(&text).map_err(parse_error)?;
        if payload.play_by_play().is_empty() {
            return Err(parse_error("no play_by_play content".to_string()));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn segment_json(play: &str, homerun: bool) -> String {
        format!(
            r#"{{"play_by_play": "{}", "major_events": "", "is_major": "{}", "homerun": "{}", "out": "0", "strategies": ""}}"#,
            play,
            if homerun { 1 } else { 0 },
            if homerun { 1 } else { 0 }
        )
    }

    #[test]
    fn test_segment_number() {
        assert_eq!(SegmentIngestor::segment_number("segment_12.txt"), Some(12));
        assert_eq!(SegmentIngestor::segment_number("notes.txt"), None);
    }

    #[test]
    fn test_ordering_ignores_listing_order() {
        let dir = tempfile::tempdir().unwrap();
        // Created out of order; lexical order would put 10 before 2.
        for n in [10, 2, 1, 3] {
            fs::write(
                dir.path().join(format!("segment_{}.txt", n)),
                segment_json(&format!("play {}", n), false),
            )
            .unwrap();
        }
        fs::write(dir.path().join("extra.txt"), segment_json("unnumbered", false)).unwrap();

        let report = SegmentIngestor::default().ingest(dir.path()).unwrap();
        let sources: Vec<&str> = report
            .records
            .iter()
            .map(|r| r.source_reference.as_str())
            .collect();
        assert_eq!(
            sources,
            vec!["segment_1.txt", "segment_2.txt", "segment_3.txt", "segment_10.txt", "extra.txt"]
        );

        let times: Vec<i64> = report.records.iter().map(|r| r.elapsed_time_seconds).collect();
        assert_eq!(times, vec![30, 60, 90, 120, 150]);
        for (i, record) in report.records.iter().enumerate() {
            assert_eq!(record.segment_index, i as i64);
        }
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=5 {
            let content = if n == 3 {
                "I could not analyze this video.".to_string()
            } else {
                segment_json(&format!("play {}", n), n == 4)
            };
            fs::write(dir.path().join(format!("segment_{}.txt", n)), content).unwrap();
        }

        let report = SegmentIngestor::default().ingest(dir.path()).unwrap();
        assert_eq!(report.records.len(), 4);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].file, "segment_3.txt");

        // Time advances only for parsed files.
        let times: Vec<i64> = report.records.iter().map(|r| r.elapsed_time_seconds).collect();
        assert_eq!(times, vec![30, 60, 90, 120]);
        assert!(report.records[2].homerun);
        assert_eq!(report.records[2].source_reference, "segment_4.txt");
    }

    #[test]
    fn test_non_utf8_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("segment_1.txt"), [0xff, 0xfe, 0x00, 0x41]).unwrap();
        fs::write(dir.path().join("segment_2.txt"), segment_json("ok", false)).unwrap();

        let report = SegmentIngestor::default().ingest(dir.path()).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].elapsed_time_seconds, 30);
        assert!(report.skipped[0].reason.contains("UTF-8"));
    }

    #[test]
    fn test_description_carries_time_marker() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("segment_1.txt"), segment_json("Ball one.", false)).unwrap();

        let report = SegmentIngestor::new(15).ingest(dir.path()).unwrap();
        assert_eq!(report.records[0].description, "Ball one.\ntime: 15t");
        assert_eq!(report.records[0].metadata().time, 15);
    }

    #[test]
    fn test_empty_or_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SegmentIngestor::default().ingest(dir.path()).unwrap_err();
        assert!(matches!(err, DugoutError::NoSegments(_)));

        let missing = dir.path().join("nope");
        let err = SegmentIngestor::default().ingest(&missing).unwrap_err();
        assert!(matches!(err, DugoutError::NoSegments(_)));

        fs::write(dir.path().join("segment_1.txt"), "garbage").unwrap();
        let err = SegmentIngestor::default().ingest(dir.path()).unwrap_err();
        assert!(matches!(err, DugoutError::NoSegments(_)));
    }
}
