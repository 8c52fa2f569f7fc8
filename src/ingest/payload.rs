//! Parsing of model-written segment analysis files.

use crate::vector_store::flag;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

// Last resort for files that are almost JSON (unescaped quotes, trailing prose).
static FIELDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)"play_by_play"\s*:\s*"(.*?)".*"major_events"\s*:\s*"(.*?)".*"is_major"\s*:\s*"(.*?)".*"homerun"\s*:\s*"(.*?)".*"out"\s*:\s*"(.*?)".*"strategies"\s*:\s*"(.*?)""#,
    )
    .expect("Invalid regex")
});

/// The six fields of one analyzed segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SegmentPayload {
    #[serde(default)]
    pub play_by_play: Option<String>,
    #[serde(default)]
    pub major_events: Option<String>,
    #[serde(default, with = "flag")]
    pub is_major: bool,
    #[serde(default, with = "flag")]
    pub homerun: bool,
    #[serde(default, with = "flag")]
    pub out: bool,
    #[serde(default)]
    pub strategies: Option<String>,
}

impl SegmentPayload {
    pub fn play_by_play(&self) -> &str {
        self.play_by_play.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn major_events(&self) -> &str {
        self.major_events.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn strategies(&self) -> &str {
        self.strategies.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Description text with the elapsed time appended as `time: {t}t`.
    pub fn describe(&self, elapsed_time_seconds: i64) -> String {
        let mut parts = vec![self.play_by_play().to_string()];
        if !self.major_events().is_empty() {
            parts.push(format!("Major_events: {}", self.major_events()));
        }
        if !self.strategies().is_empty() {
            parts.push(format!("Strategies in the game: {}", self.strategies()));
        }
        parts.push(format!("time: {}t", elapsed_time_seconds));
        parts.join("\n")
    }
}

/// Parse a segment file's text.
///
/// Markdown fences are stripped and the rest is read as a JSON object; when
/// that fails the six fields are pulled out with a pattern match. Returns
/// `Err` with the reason when neither works.
pub fn parse_segment(raw: &str) -> std::result::Result<SegmentPayload, String> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let json_error = match serde_json::from_str::<SegmentPayload>(cleaned) {
        Ok(payload) => return Ok(payload),
        Err(e) => e,
    };
    debug!("JSON parse failed ({}), trying field extraction", json_error);

    let caps = FIELDS
        .captures(cleaned)
        .ok_or_else(|| format!("not valid JSON ({}) and no fields could be extracted", json_error))?;

    let text = |i: usize| caps.get(i).map(|m| m.as_str().trim().to_string());
    let flag_at = |i: usize| {
        caps.get(i)
            .and_then(|m| flag::parse(m.as_str()))
            .unwrap_or(false)
    };

    Ok(SegmentPayload {
        play_by_play: text(1),
        major_events: text(2),
        is_major: flag_at(3),
        homerun: flag_at(4),
        out: flag_at(5),
        strategies: text(6),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"play_by_play\": \"Smith singles to left.\", \"major_events\": \"5-7: Single\", \"is_major\": \"1\", \"homerun\": \"0\", \"out\": \"0\", \"strategies\": \"\"}\n```";
        let payload = parse_segment(raw).unwrap();
        assert_eq!(payload.play_by_play(), "Smith singles to left.");
        assert!(payload.is_major);
        assert!(!payload.homerun);
        assert_eq!(payload.strategies(), "");
    }

    #[test]
    fn test_parse_lenient_flags_and_nulls() {
        let raw = r#"{"play_by_play": "Ball one.", "major_events": null, "is_major": 0, "homerun": false, "out": "1"}"#;
        let payload = parse_segment(raw).unwrap();
        assert!(!payload.is_major);
        assert!(payload.out);
        assert_eq!(payload.major_events(), "");
    }

    #[test]
    fn test_regex_fallback_on_broken_json() {
        // Trailing comma and an unescaped quote make this invalid JSON.
        let raw = r#"{
  "play_by_play": "Jones crushes it, "outta here"!",
  "major_events": "2-5: Home Run",
  "is_major": "1",
  "homerun": "1",
  "out": "0",
  "strategies": "",
}"#;
        let payload = parse_segment(raw).unwrap();
        assert!(payload.homerun);
        assert_eq!(payload.major_events(), "2-5: Home Run");
        assert!(payload.play_by_play().starts_with("Jones crushes it"));
    }

    #[test]
    fn test_unparseable_text_is_rejected() {
        assert!(parse_segment("The model refused to answer.").is_err());
    }

    #[test]
    fn test_describe_includes_optional_lines() {
        let payload = SegmentPayload {
            play_by_play: Some("Steal of second!".to_string()),
            major_events: Some("15-17: Stolen base".to_string()),
            strategies: Some("Stealing a base".to_string()),
            ..Default::default()
        };
        assert_eq!(
            payload.describe(60),
            "Steal of second!\nMajor_events: 15-17: Stolen base\nStrategies in the game: Stealing a base\ntime: 60t"
        );

        let bare = SegmentPayload {
            play_by_play: Some("Warm-up tosses.".to_string()),
            ..Default::default()
        };
        assert_eq!(bare.describe(30), "Warm-up tosses.\ntime: 30t");
    }
}
