//! Query understanding: classification, temporal filters and search-string rewriting.
//!
//! A user question about the live game goes through three independent steps
//! before anything touches the index:
//!
//! - [`QueryClassifier`] decides whether it is a realtime, historical or
//!   general search question.
//! - [`TemporalFilterBuilder`] turns time-relative phrasing into a single
//!   metadata predicate anchored on the caller's current game time.
//! - [`QueryRewriter`] reduces the question to the string that is embedded
//!   for similarity search.

mod classifier;
mod filter;
pub mod lexicon;
mod rewrite;
pub mod time_expr;

pub use classifier::{LlmClassifier, QueryClassifier, RuleClassifier};
pub use filter::{flag_keyword, TemporalFilterBuilder};
pub use rewrite::QueryRewriter;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Which handling path a query takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Answered from the live video segment.
    Realtime,
    /// Answered from the indexed history of the current game.
    Historical,
    /// Answered from the open web.
    Search,
}

impl std::str::FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "realtime" | "real-time" | "real_time" => Ok(QueryType::Realtime),
            "historical" | "history" => Ok(QueryType::Historical),
            "search" => Ok(QueryType::Search),
            other => Err(format!("Unknown query type: {}", other)),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Realtime => write!(f, "realtime"),
            QueryType::Historical => write!(f, "historical"),
            QueryType::Search => write!(f, "search"),
        }
    }
}

/// Result of classifying one incoming query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryClassification {
    #[serde(rename = "type")]
    pub kind: QueryType,
    /// In-game time anchor, captured verbatim from the query.
    pub time_reference: Option<String>,
    /// Self-contained version of the query for the next stage.
    pub optimized_query: String,
}

/// Comparison operator of a time filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    Lt,
    Gt,
    Eq,
    Ne,
    Le,
    Ge,
}

impl Operator {
    /// Wire tag of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Lt => "LT",
            Operator::Gt => "GT",
            Operator::Eq => "EQ",
            Operator::Ne => "NE",
            Operator::Le => "LE",
            Operator::Ge => "GE",
        }
    }

    /// Apply the operator to `lhs <op> rhs`.
    pub fn compare(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Gt => lhs > rhs,
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
            Operator::Le => lhs <= rhs,
            Operator::Ge => lhs >= rhs,
        }
    }
}

impl std::str::FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LT" => Ok(Operator::Lt),
            "GT" => Ok(Operator::Gt),
            "EQ" => Ok(Operator::Eq),
            "NE" => Ok(Operator::Ne),
            "LE" => Ok(Operator::Le),
            "GE" => Ok(Operator::Ge),
            other => Err(format!("Unknown operator: {}", other)),
        }
    }
}

/// Categorical event flags carried by every indexed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFlag {
    IsMajor,
    Homerun,
    Out,
}

impl EventFlag {
    /// Metadata field name of the flag.
    pub fn key(&self) -> &'static str {
        match self {
            EventFlag::IsMajor => "is_major",
            EventFlag::Homerun => "homerun",
            EventFlag::Out => "out",
        }
    }
}

/// A single structured predicate derived from a query.
///
/// Serializes to the `{key, value, operator}` wire shape; [`TemporalFilter::Empty`]
/// serializes to `{}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalFilter {
    /// No constraint; similarity ranking decides.
    #[default]
    Empty,
    /// Constraint on the segment's elapsed game time.
    Time { seconds: i64, operator: Operator },
    /// Constraint on one event flag.
    Category { flag: EventFlag, is_set: bool },
}

impl TemporalFilter {
    pub fn is_empty(&self) -> bool {
        matches!(self, TemporalFilter::Empty)
    }

    /// Metadata key this filter constrains, if any.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            TemporalFilter::Empty => None,
            TemporalFilter::Time { .. } => Some("time"),
            TemporalFilter::Category { flag, .. } => Some(flag.key()),
        }
    }
}

impl Serialize for TemporalFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TemporalFilter::Empty => serializer.serialize_map(Some(0))?.end(),
            TemporalFilter::Time { seconds, operator } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("key", "time")?;
                map.serialize_entry("value", seconds)?;
                map.serialize_entry("operator", operator.as_str())?;
                map.end()
            }
            TemporalFilter::Category { flag, is_set } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("key", flag.key())?;
                map.serialize_entry("value", if *is_set { "1" } else { "0" })?;
                map.serialize_entry("operator", "")?;
                map.end()
            }
        }
    }
}

impl fmt::Display for TemporalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalFilter::Empty => write!(f, "{{}}"),
            TemporalFilter::Time { seconds, operator } => {
                write!(f, "time {} {}", operator.as_str(), seconds)
            }
            TemporalFilter::Category { flag, is_set } => {
                write!(f, "{} = {}", flag.key(), if *is_set { "1" } else { "0" })
            }
        }
    }
}

/// The string handed to the embedding index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenQuery {
    pub modified_query: String,
}

impl RewrittenQuery {
    /// Sentinel meaning "match everything, rely on the filter".
    pub const WILDCARD: &'static str = "*";

    pub fn new(query: impl Into<String>) -> Self {
        Self {
            modified_query: query.into(),
        }
    }

    pub fn wildcard() -> Self {
        Self::new(Self::WILDCARD)
    }

    pub fn blank() -> Self {
        Self::new("")
    }

    pub fn is_wildcard(&self) -> bool {
        self.modified_query.trim() == Self::WILDCARD
    }

    pub fn is_blank(&self) -> bool {
        self.modified_query.trim().is_empty()
    }

    /// Whether there is text worth embedding.
    pub fn is_searchable(&self) -> bool {
        !self.is_wildcard() && !self.is_blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_wire_shape() {
        let time = TemporalFilter::Time {
            seconds: 20,
            operator: Operator::Gt,
        };
        assert_eq!(
            serde_json::to_value(time).unwrap(),
            serde_json::json!({"key": "time", "value": 20, "operator": "GT"})
        );

        let category = TemporalFilter::Category {
            flag: EventFlag::Homerun,
            is_set: true,
        };
        assert_eq!(
            serde_json::to_value(category).unwrap(),
            serde_json::json!({"key": "homerun", "value": "1", "operator": ""})
        );

        assert_eq!(
            serde_json::to_value(TemporalFilter::Empty).unwrap(),
            serde_json::json!({})
        );
    }

    #[test]
    fn test_operator_compare() {
        assert!(Operator::Gt.compare(30, 20));
        assert!(!Operator::Lt.compare(50, 50));
        assert!(Operator::Le.compare(50, 50));
        assert!(Operator::Ne.compare(1, 2));
    }

    #[test]
    fn test_rewritten_query_markers() {
        assert!(RewrittenQuery::wildcard().is_wildcard());
        assert!(RewrittenQuery::new("  ").is_blank());
        assert!(RewrittenQuery::new("homerun").is_searchable());
    }

    #[test]
    fn test_classification_serializes_type_tag() {
        let classification = QueryClassification {
            kind: QueryType::Historical,
            time_reference: Some("20 minutes ago".to_string()),
            optimized_query: "What happened 20 minutes ago?".to_string(),
        };
        let value = serde_json::to_value(&classification).unwrap();
        assert_eq!(value["type"], "historical");
        assert_eq!(value["time_reference"], "20 minutes ago");
    }
}
