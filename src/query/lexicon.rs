//! Baseball vocabulary used to recognize what a query is about.

use regex::Regex;
use std::sync::LazyLock;

/// A recognizable baseball action term.
pub struct Term {
    /// Canonical search string for the term.
    pub canonical: &'static str,
    pattern: Regex,
}

/// One occurrence of a term in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermMatch {
    pub canonical: &'static str,
    pub start: usize,
    pub end: usize,
}

fn term(canonical: &'static str, pattern: &str) -> Term {
    Term {
        canonical,
        pattern: Regex::new(&format!(r"(?i)\b(?:{})\b", pattern)).expect("Invalid regex"),
    }
}

// Multi-word and more specific terms come first; overlapping matches of
// later entries are dropped.
static TERMS: LazyLock<Vec<Term>> = LazyLock::new(|| {
    vec![
        term("grand slam", r"grand\s+slams?"),
        term("caught stealing", r"caught\s+stealing"),
        term("stolen base", r"stolen\s+bases?|steals?\s+(?:of\s+)?(?:second|third|home|a\s+base)|stealing(?:\s+a\s+base)?|stole"),
        term("double play", r"double[\s-]+plays?"),
        term("triple play", r"triple[\s-]+plays?"),
        term("sacrifice fly", r"sacrifice\s+fl(?:y|ies)|sac\s+fly"),
        term("sacrifice bunt", r"sacrifice\s+bunts?|sac\s+bunt"),
        term("intentional walk", r"intentional\s+walks?"),
        term("hit by pitch", r"hit\s+by\s+(?:a\s+)?pitch"),
        term("wild pitch", r"wild\s+pitch(?:es)?"),
        term("passed ball", r"passed\s+balls?"),
        term("fielder's choice", r"fielder'?s\s+choice"),
        term("hit and run", r"hit[\s-]+and[\s-]+run"),
        term("squeeze play", r"squeeze(?:\s+play)?"),
        term("force out", r"force[\s-]*outs?"),
        term("tag out", r"tag(?:ged)?[\s-]*outs?"),
        term("fly out", r"fly[\s-]*outs?|flied\s+out"),
        term("ground out", r"ground[\s-]*outs?|grounded\s+out"),
        term("pickoff", r"pick[\s-]*offs?|picked\s+off"),
        term("homerun", r"home[\s-]*runs?|homers?|homerr?uns?|dingers?"),
        term("strikeout", r"strike[\s-]*outs?|struck\s+out"),
        term("strike", r"strikes?"),
        term("bunting", r"bunting"),
        term("bunt", r"bunt(?:s|ed)?"),
        term("walk", r"walks?|walked|base\s+on\s+balls"),
        term("single", r"singles?|singled"),
        term("double", r"doubles?|doubled"),
        term("triple", r"triples?|tripled"),
        term("error", r"errors?|fielding\s+error"),
        term("balk", r"balks?"),
        term("run scored", r"runs?\s+scored|scored\s+a\s+run|rbi"),
        term("pitching change", r"pitching\s+change|relie(?:f|ver)\s+pitcher"),
    ]
});

static STOPWORD_CAPS: &[&str] = &[
    "I", "What", "When", "Who", "Where", "Why", "How", "Show", "Tell", "Did", "Does", "Do", "Was",
    "Is", "Are", "Any", "The", "A", "An", "Give", "Provide", "Can", "Could", "Please", "List",
];

/// All term occurrences in `text`, in order of appearance, without overlaps.
pub fn find_terms(text: &str) -> Vec<TermMatch> {
    let mut found: Vec<TermMatch> = Vec::new();

    for term in TERMS.iter() {
        for m in term.pattern.find_iter(text) {
            let overlaps = found
                .iter()
                .any(|f| m.start() < f.end && f.start < m.end());
            if !overlaps {
                found.push(TermMatch {
                    canonical: term.canonical,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }
    }

    found.sort_by_key(|f| f.start);
    found
}

/// Distinct canonical terms in order of first appearance.
pub fn distinct_terms(text: &str) -> Vec<&'static str> {
    let mut terms: Vec<&'static str> = Vec::new();
    for m in find_terms(text) {
        if !terms.contains(&m.canonical) {
            terms.push(m.canonical);
        }
    }
    terms
}

/// Named entities: runs of capitalized words, e.g. "Shohei Ohtani".
///
/// The first word of the query is only counted when it starts a run of two
/// or more capitalized words, so a leading "Show" or "When" is skipped.
pub fn named_entities(text: &str) -> Vec<String> {
    let mut entities = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_starts_query = false;

    let flush = |current: &mut Vec<String>, starts_query: bool, entities: &mut Vec<String>| {
        if !current.is_empty() && (!starts_query || current.len() > 1) {
            entities.push(current.join(" "));
        }
        current.clear();
    };

    for (i, raw) in text.split_whitespace().enumerate() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-');
        let word = word.strip_suffix("'s").unwrap_or(word);
        let capitalized = word.chars().next().is_some_and(|c| c.is_uppercase())
            && word.chars().skip(1).any(|c| c.is_lowercase())
            && !STOPWORD_CAPS.contains(&word);

        if capitalized {
            if current.is_empty() {
                current_starts_query = i == 0;
            }
            current.push(word.to_string());
        } else {
            flush(&mut current, current_starts_query, &mut entities);
        }

        // Punctuation ends a name even when the next word is capitalized.
        if raw.ends_with(['.', ',', '?', '!', ';', ':']) {
            flush(&mut current, current_starts_query, &mut entities);
        }
    }
    flush(&mut current, current_starts_query, &mut entities);

    entities
}

/// Whether the text names any recognizable baseball term.
pub fn mentions_baseball_term(text: &str) -> bool {
    TERMS.iter().any(|t| t.pattern.is_match(text))
}

// Forms of one action that count as the same thing when matching.
fn family(canonical: &'static str) -> &'static str {
    match canonical {
        "bunting" | "sacrifice bunt" => "bunt",
        "grand slam" => "homerun",
        other => other,
    }
}

/// Whether `text` mentions an action named in `query`, treating related
/// forms ("bunting", "sacrifice bunt") as the same action.
///
/// `None` when the query names no action.
pub fn mentions_query_terms(query: &str, text: &str) -> Option<bool> {
    let wanted: Vec<&str> = distinct_terms(query).into_iter().map(family).collect();
    if wanted.is_empty() {
        return None;
    }
    Some(
        find_terms(text)
            .iter()
            .any(|m| wanted.contains(&family(m.canonical))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_terms_canonicalizes() {
        assert_eq!(distinct_terms("what about the latest stolen base?"), vec!["stolen base"]);
        assert_eq!(distinct_terms("any double plays recently"), vec!["double play"]);
        assert_eq!(distinct_terms("when did he hit a home run"), vec!["homerun"]);
        assert_eq!(distinct_terms("provide be the bunts that happended 20s back"), vec!["bunt"]);
        assert_eq!(distinct_terms("when did the last bunting happen"), vec!["bunting"]);
    }

    #[test]
    fn test_specific_terms_win_over_generic() {
        assert_eq!(distinct_terms("was that a double play"), vec!["double play"]);
        assert_eq!(distinct_terms("show me strikeouts"), vec!["strikeout"]);
    }

    #[test]
    fn test_multiple_terms_in_order() {
        assert_eq!(
            distinct_terms("Show me major events related to bunting or strike or homerun"),
            vec!["bunting", "strike", "homerun"]
        );
    }

    #[test]
    fn test_named_entities() {
        assert_eq!(
            named_entities("when did Shohei Ohtani hit a homerun?"),
            vec!["Shohei Ohtani".to_string()]
        );
        assert!(named_entities("Show me the latest homerun").is_empty());
        assert_eq!(
            named_entities("Did Judge's homer count?"),
            vec!["Judge".to_string()]
        );
    }

    #[test]
    fn test_mentions_query_terms() {
        let query = "tell me when did the last bunting happen";
        assert_eq!(mentions_query_terms(query, "Sacrifice bunt moves the runner"), Some(true));
        assert_eq!(mentions_query_terms(query, "Ohtani homerun to deep center"), Some(false));
        assert_eq!(
            mentions_query_terms("latest grand slam", "Bases-loaded home run to right"),
            Some(true)
        );
        assert_eq!(mentions_query_terms("what happened latest", "Ball one"), None);
    }
}
