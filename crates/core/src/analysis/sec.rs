use crate::domain::analysis::FilingExcerpt;
use crate::ingest::provider::FilingRepository;
use crate::ingest::types::Filing;
use crate::resilience::CallExecutor;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Filing types worth reading for a special-situation thesis.
pub const FORMS: [&str; 20] = [
    "10-K", "10-Q", "8-K", "6-K", "20-F", "S-1", "S-4", "424B2", "424B3", "SC 13D", "SC 13G",
    "DEFA14A", "DEF 14A", "PRE 14A", "POS AM", "3", "4", "5", "SD", "11-K",
];

const SECTIONED_FORMS: [&str; 3] = ["10-K", "10-Q", "S-1"];
const MAX_SECTION_CHARS: usize = 6_000;
const MAX_FULL_TEXT_CHARS: usize = 6_000;
const MAX_HEADING_CHARS: usize = 140;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Business,
    RiskFactors,
    Mdna,
}

impl Section {
    fn title(self) -> &'static str {
        match self {
            Section::Business => "Business",
            Section::RiskFactors => "Risk Factors",
            Section::Mdna => "Management's Discussion and Analysis",
        }
    }
}

fn section_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:item\s+\d+[a-z]?\s*[.:\-]?\s*)?(business|risk\s+factors|management[’'`]?s\s+discussion\s+and\s+analysis\b.*)\.?$",
        )
        .expect("static regex")
    })
}

fn item_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:part\s+[iv]+\b|item\s+\d+[a-z]?\b)").expect("static regex"))
}

fn classify_heading(line: &str) -> Option<Section> {
    if line.len() > MAX_HEADING_CHARS {
        return None;
    }
    let caps = section_heading_regex().captures(line.trim())?;
    let name = caps.get(1)?.as_str().to_ascii_lowercase();
    if name == "business" {
        Some(Section::Business)
    } else if name.starts_with("risk") {
        Some(Section::RiskFactors)
    } else {
        Some(Section::Mdna)
    }
}

fn is_boundary(line: &str) -> bool {
    line.len() <= MAX_HEADING_CHARS
        && (item_heading_regex().is_match(line.trim()) || classify_heading(line).is_some())
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Pulls Business, Risk Factors and MD&A out of a plain-text filing.
///
/// Tables of contents repeat every heading with an empty body, so the longest
/// body per section wins.
pub fn key_sections(text: &str) -> Vec<(String, String)> {
    let lines: Vec<&str> = text.lines().collect();
    let mut best: Vec<(Section, String)> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(section) = classify_heading(line) else {
            continue;
        };
        let body = lines[i + 1..]
            .iter()
            .take_while(|l| !is_boundary(l))
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        if body.trim().is_empty() {
            continue;
        }

        match best.iter_mut().find(|(s, _)| *s == section) {
            Some((_, existing)) if existing.len() >= body.len() => {}
            Some((_, existing)) => *existing = body,
            None => best.push((section, body)),
        }
    }

    let order = [Section::Business, Section::RiskFactors, Section::Mdna];
    order
        .iter()
        .filter_map(|section| {
            best.iter()
                .find(|(s, _)| s == section)
                .map(|(s, body)| (s.title().to_string(), clip(body, MAX_SECTION_CHARS)))
        })
        .collect()
}

/// Sections for 10-K/10-Q/S-1, clipped full text for everything else.
pub fn excerpt(filing: &Filing, text: &str) -> FilingExcerpt {
    let sectioned = SECTIONED_FORMS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(&filing.form));

    let mut sections = if sectioned {
        key_sections(text)
    } else {
        Vec::new()
    };
    if sections.is_empty() {
        sections.push(("Full text".to_string(), clip(text.trim(), MAX_FULL_TEXT_CHARS)));
    }

    FilingExcerpt {
        form: filing.form.clone(),
        filed: filing.filing_date,
        sections,
    }
}

/// Lists recent filings and excerpts each one; a filing whose document fails is skipped.
pub async fn filing_excerpts(
    repo: &dyn FilingRepository,
    exec: &CallExecutor,
    ticker: &str,
    limit: usize,
) -> Result<Vec<FilingExcerpt>> {
    let filings = exec
        .execute("sec_filings", || repo.filings(ticker, &FORMS, limit))
        .await
        .with_context(|| format!("could not list SEC filings for {ticker}"))?;

    let mut out = Vec::with_capacity(filings.len());
    for filing in &filings {
        let text = exec
            .execute("sec_document", || repo.document_text(filing))
            .await;
        match text {
            Some(text) => out.push(excerpt(filing, &text)),
            None => tracing::warn!(
                ticker,
                form = %filing.form,
                accession = %filing.accession_number,
                "skipping unreadable SEC filing"
            ),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_K: &str = "\
Table of Contents
Item 1. Business
Item 1A. Risk Factors
Item 7. Management's Discussion and Analysis of Financial Condition and Results of Operations
PART I
Item 1. Business
Acme makes widgets for industrial customers.
We operate two segments.
Item 1A. Risk Factors
Our customers are concentrated.
Item 1B. Unresolved Staff Comments
None.
PART II
Item 7. Management’s Discussion and Analysis of Financial Condition and Results of Operations
Revenue grew 12% year over year.
Item 8. Financial Statements";

    fn filing(form: &str) -> Filing {
        Filing {
            form: form.to_string(),
            filing_date: None,
            accession_number: "0000000000-24-000001".to_string(),
            url: "https://www.sec.gov/x".to_string(),
        }
    }

    #[test]
    fn extracts_sections_past_the_table_of_contents() {
        let sections = key_sections(TEN_K);
        assert_eq!(
            sections,
            vec![
                (
                    "Business".to_string(),
                    "Acme makes widgets for industrial customers.\nWe operate two segments."
                        .to_string()
                ),
                (
                    "Risk Factors".to_string(),
                    "Our customers are concentrated.".to_string()
                ),
                (
                    "Management's Discussion and Analysis".to_string(),
                    "Revenue grew 12% year over year.".to_string()
                ),
            ]
        );
    }

    #[test]
    fn other_forms_keep_full_text() {
        let ex = excerpt(&filing("8-K"), "Item 1.01 Entry into a Material Agreement\nAcme agreed to merge.");
        assert_eq!(ex.sections.len(), 1);
        assert_eq!(ex.sections[0].0, "Full text");
        assert!(ex.sections[0].1.contains("Acme agreed to merge."));
    }

    #[test]
    fn sectioned_form_without_headings_falls_back_to_full_text() {
        let ex = excerpt(&filing("10-Q"), "unstructured quarterly text");
        assert_eq!(ex.sections, vec![("Full text".to_string(), "unstructured quarterly text".to_string())]);
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("héllo", 2), "hé...");
        assert_eq!(clip("hi", 5), "hi");
    }
}
