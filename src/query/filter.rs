//! Temporal filter construction.

use super::time_expr::{find_durations, find_unrecognized_anchor, has_recency_cue, DurationMatch};
use super::{EventFlag, Operator, TemporalFilter};
use crate::error::DugoutError;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static EXACT_CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:exactly|precisely|exact)\b").expect("Invalid regex"));

// Phrasing right before a duration that turns it into a trailing window.
static WINDOW_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:last|past|since|within|from|over|during|for)(?:\s+the)?(?:\s+last|\s+past)?\s*$",
    )
    .expect("Invalid regex")
});

// "... 30 seconds back till now" style windows.
static WINDOW_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:back|ago|before|earlier)?\s*(?:,\s*)?(?:till|until|up\s+to|to|through)\s+now\b")
        .expect("Invalid regex")
});

static MAJOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmajor\b").expect("Invalid regex"));
static HOME_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhome[\s-]?runs?\b").expect("Invalid regex"));
static OUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bouts?\b").expect("Invalid regex"));

/// The event flag a query names by keyword, checked as "major", then
/// "home run", then "out".
pub fn flag_keyword(query: &str) -> Option<EventFlag> {
    if MAJOR.is_match(query) {
        Some(EventFlag::IsMajor)
    } else if HOME_RUN.is_match(query) {
        Some(EventFlag::Homerun)
    } else if OUT.is_match(query) {
        Some(EventFlag::Out)
    } else {
        None
    }
}

/// How a duration phrase relates to the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookback {
    /// A single moment: "30 seconds back".
    Point,
    /// Everything from that moment until now: "last 30 seconds".
    Window,
}

/// Builds the single metadata predicate for a query.
///
/// Precedence, highest first:
/// 1. an explicit duration ("30 seconds back", "last 20 sec") becomes a
///    `time` filter relative to the current time;
/// 2. a recency ask ("latest homerun", "when did the last bunt happen")
///    becomes `time LT now`;
/// 3. the keywords "major", "home run" and "out" select an event flag;
/// 4. otherwise the filter is empty.
///
/// A time anchor that cannot be converted to seconds ("7th inning") falls
/// back to the empty filter instead of failing the request.
#[derive(Debug, Clone, Default)]
pub struct TemporalFilterBuilder;

impl TemporalFilterBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the filter for `query` given the current game time in seconds.
    pub fn build(&self, query: &str, current_time_seconds: i64) -> TemporalFilter {
        let durations = find_durations(query);

        if let Some(duration) = durations.first() {
            let lookback = Self::lookback_kind(query, duration);
            let delta = current_time_seconds.saturating_sub(duration.seconds);
            let operator = match lookback {
                Lookback::Point => Operator::Eq,
                Lookback::Window => Operator::Gt,
            };
            debug!(
                expression = %duration.text,
                ?lookback,
                delta,
                "Built time filter"
            );
            return TemporalFilter::Time {
                seconds: delta,
                operator,
            };
        }

        if let Some(anchor) = find_unrecognized_anchor(query) {
            let err = DugoutError::FilterBuild(anchor);
            warn!("{}; using an empty filter", err);
            return TemporalFilter::Empty;
        }

        if has_recency_cue(query) {
            return TemporalFilter::Time {
                seconds: current_time_seconds,
                operator: Operator::Lt,
            };
        }

        match flag_keyword(query) {
            Some(flag) => Self::flag(flag),
            None => TemporalFilter::Empty,
        }
    }

    fn flag(flag: EventFlag) -> TemporalFilter {
        TemporalFilter::Category { flag, is_set: true }
    }

    fn lookback_kind(query: &str, duration: &DurationMatch) -> Lookback {
        if EXACT_CUE.is_match(query) {
            return Lookback::Point;
        }

        let before = &query[..duration.start];
        let after = &query[duration.end..];
        if WINDOW_PREFIX.is_match(before) || WINDOW_SUFFIX.is_match(after) {
            Lookback::Window
        } else {
            Lookback::Point
        }
    }
}
