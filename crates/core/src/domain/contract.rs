use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Shape the classification prompt asks for: `{"is_special_situation": true}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmVerdict {
    pub is_special_situation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationVerdict {
    pub is_special_situation: bool,
    pub article_link: String,
}

impl LlmVerdict {
    pub fn into_verdict(self, article_link: &str) -> ClassificationVerdict {
        ClassificationVerdict {
            is_special_situation: self.is_special_situation,
            article_link: article_link.to_string(),
        }
    }
}

const MAX_COMPANY_NAME_CHARS: usize = 200;

/// Trims, drops blanks and implausibly long names, and removes repeats while keeping first-seen order.
pub fn validate_company_names(raw: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for name in raw {
        let name = name.trim().to_string();
        if name.is_empty() {
            continue;
        }
        let len = name.chars().count();
        if len > MAX_COMPANY_NAME_CHARS {
            tracing::debug!(len, "dropping implausibly long company name");
            continue;
        }
        if seen.insert(name.to_lowercase()) {
            out.push(name);
        }
    }
    out
}

fn out_of_ten() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(10|[1-9])\s*(?:/|out\s+of)\s*10\b").expect("static regex")
    })
}

fn labelled() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:score|rating)\b[^0-9\n]{0,20}\b(10|[1-9])\b").expect("static regex")
    })
}

fn bare() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(10|[1-9])\b").expect("static regex"))
}

/// Pulls the 1..=10 rating out of a free-text score answer.
pub fn rating_from_score(text: &str) -> Option<u8> {
    [out_of_ten(), labelled(), bare()]
        .into_iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_requires_a_boolean() {
        let v: LlmVerdict = serde_json::from_str(r#"{"is_special_situation": true}"#).unwrap();
        let verdict = v.into_verdict("https://x.example/a");
        assert!(verdict.is_special_situation);
        assert_eq!(verdict.article_link, "https://x.example/a");

        assert!(serde_json::from_str::<LlmVerdict>(r#"{"is_special_situation": "yes"}"#).is_err());
        assert!(serde_json::from_str::<LlmVerdict>(r#"{"special": true}"#).is_err());
    }

    #[test]
    fn company_names_are_cleaned_in_order() {
        let names = validate_company_names(vec![
            " Acme Corp ".into(),
            "".into(),
            "Globex".into(),
            "acme corp".into(),
        ]);
        assert_eq!(names, vec!["Acme Corp", "Globex"]);
    }

    #[test]
    fn overlong_name_is_dropped_without_losing_the_rest() {
        let names = validate_company_names(vec![
            "Acme Corp".into(),
            "x".repeat(500),
            "Globex".into(),
        ]);
        assert_eq!(names, vec!["Acme Corp", "Globex"]);
    }

    #[test]
    fn rating_prefers_explicit_scales() {
        assert_eq!(rating_from_score("8"), Some(8));
        assert_eq!(
            rating_from_score("1. Upside is strong.\nOverall: 7/10 given the catalyst."),
            Some(7)
        );
        assert_eq!(rating_from_score("Score: 10 - compelling setup"), Some(10));
        assert_eq!(rating_from_score("I would rate it 6 out of 10."), Some(6));
        assert_eq!(rating_from_score("no number here"), None);
        assert_eq!(rating_from_score("Score: 42"), None);
    }
}
