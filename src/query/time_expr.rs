//! Time expression parsing.
//!
//! Everything is normalized to whole seconds of elapsed game time.

use crate::error::{DugoutError, Result};
use regex::Regex;
use std::sync::LazyLock;

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            (?P<half>half\s+an?)\s+
          | (?P<num>\d+(?:\.\d+)?)\s*
          | (?P<word>an?|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve
              |fifteen|twenty|thirty|forty|forty-five|fifty|sixty|ninety)\s+
        )
        (?P<unit>hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)\b
        ",
    )
    .expect("Invalid regex")
});

static UNRECOGNIZED_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            (?:top|bottom|middle|end)\s+of\s+the\s+\d+(?:st|nd|rd|th)(?:\s+inning)?
          | (?:in\s+the\s+)?\d+(?:st|nd|rd|th)\s+inning
          | (?:last|past|previous|first)\s+(?:\d+|two|three|four|five|six|seven|eight|nine)
              \s+(?:innings?|at[-\s]bats?|plays?|pitches|outs)
          | (?:\d+|an?|one|two|three|four|five)\s+(?:innings?|at[-\s]bats?|plays?|pitches)
              \s+(?:ago|back|before|earlier)
          | at\s+the\s+half
        )
        ",
    )
    .expect("Invalid regex")
});

static RECENCY_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            when\s+(?:did|does|do|was|were|is|has|have)
          | latest | most\s+recent | newest | recent(?:ly)?
        )\b
        ",
    )
    .expect("Invalid regex")
});

static LOOKBACK_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:ago|back|before|earlier|(?:until|till|up\s+to)\s+now)\b")
        .expect("Invalid regex")
});

static LOOKBACK_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:last|past|since|within|over|for)\s*$").expect("Invalid regex")
});

static THE_LAST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bthe\s+last\s+([a-z'-]+)").expect("Invalid regex"));

static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{1,2})$").expect("Invalid regex")
});

/// Upper bound on any game-clock value, in seconds.
pub const MAX_GAME_CLOCK_SECONDS: i64 = 24 * 3600;

/// A duration phrase found in a query.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationMatch {
    /// Byte offset where the phrase starts.
    pub start: usize,
    /// Byte offset just past the phrase.
    pub end: usize,
    /// Phrase value in seconds.
    pub seconds: i64,
    /// Matched text.
    pub text: String,
}

fn number_word(word: &str) -> Option<f64> {
    let value = match word.to_lowercase().as_str() {
        "a" | "an" | "one" => 1.0,
        "two" => 2.0,
        "three" => 3.0,
        "four" => 4.0,
        "five" => 5.0,
        "six" => 6.0,
        "seven" => 7.0,
        "eight" => 8.0,
        "nine" => 9.0,
        "ten" => 10.0,
        "eleven" => 11.0,
        "twelve" => 12.0,
        "fifteen" => 15.0,
        "twenty" => 20.0,
        "thirty" => 30.0,
        "forty" => 40.0,
        "forty-five" => 45.0,
        "fifty" => 50.0,
        "sixty" => 60.0,
        "ninety" => 90.0,
        _ => return None,
    };
    Some(value)
}

fn unit_seconds(unit: &str) -> f64 {
    match unit.to_lowercase().chars().next() {
        Some('h') => 3600.0,
        Some('m') => 60.0,
        _ => 1.0,
    }
}

/// Find every duration phrase in `text`.
///
/// Adjacent phrases joined only by whitespace, a comma or "and" are merged,
/// so "2 minutes and 10 seconds" is one 130 second match.
pub fn find_durations(text: &str) -> Vec<DurationMatch> {
    let mut matches: Vec<DurationMatch> = Vec::new();

    for caps in DURATION.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(unit) = caps.name("unit") else { continue };

        let amount = if caps.name("half").is_some() {
            0.5
        } else if let Some(num) = caps.name("num") {
            match num.as_str().parse::<f64>() {
                Ok(n) => n,
                Err(_) => continue,
            }
        } else if let Some(word) = caps.name("word") {
            // "a second homerun" is not a duration; "a minute ago" is.
            if is_article(word.as_str()) && !has_lookback_context(text, whole.start(), whole.end()) {
                continue;
            }
            match number_word(word.as_str()) {
                Some(n) => n,
                None => continue,
            }
        } else {
            continue;
        };

        let value = amount * unit_seconds(unit.as_str());
        if !value.is_finite() || value > MAX_GAME_CLOCK_SECONDS as f64 {
            continue;
        }
        let seconds = value.round() as i64;

        if let Some(last) = matches.last_mut() {
            let gap = text[last.end..whole.start()].trim().to_lowercase();
            if gap.is_empty() || gap == "and" || gap == "," {
                last.end = whole.end();
                last.seconds = last.seconds.saturating_add(seconds);
                last.text = text[last.start..last.end].to_string();
                continue;
            }
        }

        matches.push(DurationMatch {
            start: whole.start(),
            end: whole.end(),
            seconds,
            text: whole.as_str().to_string(),
        });
    }

    matches
}

fn is_article(word: &str) -> bool {
    word.eq_ignore_ascii_case("a") || word.eq_ignore_ascii_case("an")
}

fn has_lookback_context(text: &str, start: usize, end: usize) -> bool {
    LOOKBACK_AFTER.is_match(&text[end..]) || LOOKBACK_BEFORE.is_match(&text[..start])
}

/// Time-like anchor that cannot be converted to seconds ("7th inning", "last 3 innings").
pub fn find_unrecognized_anchor(text: &str) -> Option<String> {
    UNRECOGNIZED_ANCHOR
        .find(text)
        .map(|m| m.as_str().trim().to_string())
}

/// Whether the query asks about the most recent occurrence of something.
///
/// Covers "when did ...", "latest", "most recent", "recently" and "the last
/// <event>" where the word after "last" is not a number or time unit.
pub fn has_recency_cue(text: &str) -> bool {
    if RECENCY_CUE.is_match(text) {
        return true;
    }
    THE_LAST.captures_iter(text).any(|caps| {
        caps.get(1)
            .map(|w| {
                let word = w.as_str().to_lowercase();
                number_word(&word).is_none()
                    && word.parse::<f64>().is_err()
                    && !is_unit_word(&word)
            })
            .unwrap_or(false)
    })
}

fn is_unit_word(word: &str) -> bool {
    matches!(
        word,
        "second" | "seconds" | "sec" | "secs" | "minute" | "minutes" | "min" | "mins"
            | "hour" | "hours" | "inning" | "innings" | "few" | "couple"
    )
}

/// Normalize a caller-supplied current time to whole seconds.
///
/// Accepts a bare number ("50", "50.4"), a clock ("1:30", "01:02:03") or
/// duration phrases ("50 seconds", "2 min 10 s"). Values above
/// [`MAX_GAME_CLOCK_SECONDS`] are rejected.
pub fn parse_clock(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DugoutError::InvalidInput("current time is empty".to_string()));
    }

    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() && value >= 0.0 {
            if value > MAX_GAME_CLOCK_SECONDS as f64 {
                return Err(out_of_range(trimmed));
            }
            return Ok(value.round() as i64);
        }
        return Err(DugoutError::InvalidInput(format!(
            "current time must be a non-negative number of seconds, got {}",
            trimmed
        )));
    }

    if let Some(caps) = CLOCK.captures(trimmed) {
        let field = |i: usize| -> Result<i64> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().map_err(|_| out_of_range(trimmed)),
                None => Ok(0),
            }
        };
        let total = field(1)?
            .checked_mul(3600)
            .and_then(|h| h.checked_add(field(2).ok()?.checked_mul(60)?))
            .and_then(|hm| hm.checked_add(field(3).ok()?))
            .filter(|total| *total <= MAX_GAME_CLOCK_SECONDS)
            .ok_or_else(|| out_of_range(trimmed))?;
        return Ok(total);
    }

    let durations = find_durations(trimmed);
    if durations.is_empty() {
        return Err(DugoutError::InvalidInput(format!(
            "Could not parse current time: {}",
            trimmed
        )));
    }
    let total = durations
        .iter()
        .fold(0i64, |acc, d| acc.saturating_add(d.seconds));
    if total > MAX_GAME_CLOCK_SECONDS {
        return Err(out_of_range(trimmed));
    }
    Ok(total)
}

fn out_of_range(text: &str) -> DugoutError {
    DugoutError::InvalidInput(format!(
        "current time {} is beyond the {} second game clock limit",
        text, MAX_GAME_CLOCK_SECONDS
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_durations_units() {
        let found = find_durations("what happened 30 seconds back");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].seconds, 30);
        assert_eq!(found[0].text, "30 seconds");

        assert_eq!(find_durations("since last 20 sec")[0].seconds, 20);
        assert_eq!(find_durations("the bunts from 20s back")[0].seconds, 20);
        assert_eq!(find_durations("5 minutes ago")[0].seconds, 300);
        assert_eq!(find_durations("a minute ago")[0].seconds, 60);
        assert_eq!(find_durations("half a minute ago")[0].seconds, 30);
        assert_eq!(find_durations("1.5 minutes ago")[0].seconds, 90);
    }

    #[test]
    fn test_find_durations_merges_compound_phrases() {
        let found = find_durations("2 minutes and 10 seconds ago");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].seconds, 130);
    }

    #[test]
    fn test_find_durations_ignores_ordinals_and_words() {
        assert!(find_durations("in the 7th inning").is_empty());
        assert!(find_durations("5 men left on base").is_empty());
        assert!(find_durations("show me the latest homerun").is_empty());
    }

    #[test]
    fn test_unrecognized_anchor() {
        assert_eq!(
            find_unrecognized_anchor("what happened in the 7th inning").as_deref(),
            Some("in the 7th inning")
        );
        assert_eq!(
            find_unrecognized_anchor("recap the last 3 innings").as_deref(),
            Some("last 3 innings")
        );
        assert_eq!(find_unrecognized_anchor("what was the score at the half").as_deref(), Some("at the half"));
        assert!(find_unrecognized_anchor("what happened 30 seconds ago").is_none());
    }

    #[test]
    fn test_recency_cue() {
        assert!(has_recency_cue("Show me the latest homerun"));
        assert!(has_recency_cue("tell me when did the last bunting happen"));
        assert!(has_recency_cue("when was the last walk event?"));
        assert!(has_recency_cue("any double plays recently"));
        assert!(!has_recency_cue("all the home runs so far"));
        assert!(!has_recency_cue("any bunts till now"));
        assert!(!has_recency_cue("what happened in the last 30 seconds"));
        assert!(!has_recency_cue("Show me all the homerun"));
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("50").unwrap(), 50);
        assert_eq!(parse_clock("50.6").unwrap(), 51);
        assert_eq!(parse_clock("50 seconds").unwrap(), 50);
        assert_eq!(parse_clock("2 min 10 s").unwrap(), 130);
        assert_eq!(parse_clock("1:30").unwrap(), 90);
        assert_eq!(parse_clock("01:02:03").unwrap(), 3723);
        assert!(parse_clock("").is_err());
        assert!(parse_clock("-5").is_err());
        assert!(parse_clock("soon").is_err());
    }

    #[test]
    fn test_parse_clock_rejects_overflowing_values() {
        let err = parse_clock("9999999999999999:00:00").unwrap_err();
        assert!(matches!(err, DugoutError::InvalidInput(_)));
        assert!(parse_clock("99999999999999999999999:00:00").is_err());
        assert!(parse_clock("1e300").is_err());
        assert!(parse_clock("999999999999 hours").is_err());
        assert!(parse_clock("23 hours and 2 hours").is_err());
        assert!(parse_clock("25:00:00").is_err());
        assert_eq!(parse_clock("24:00:00").unwrap(), MAX_GAME_CLOCK_SECONDS);
    }

    #[test]
    fn test_durations_beyond_game_clock_are_ignored() {
        let found = find_durations("what happened 99999999999999999999 hours or 5 hours ago");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].seconds, 5 * 3600);
    }

    #[test]
    fn test_article_needs_lookback_context() {
        assert!(find_durations("Who hit a second homerun in this game?").is_empty());
        assert!(find_durations("Who is playing a second baseman today").is_empty());
        assert!(find_durations("an hour of rain delay").is_empty());
        assert_eq!(find_durations("what happened a minute ago")[0].seconds, 60);
        assert_eq!(find_durations("any hits in the last a minute")[0].seconds, 60);
        assert_eq!(find_durations("bunts within an hour")[0].seconds, 3600);
        assert_eq!(find_durations("a second back")[0].seconds, 1);
        assert_eq!(find_durations("half a minute ago")[0].seconds, 30);
    }
}
