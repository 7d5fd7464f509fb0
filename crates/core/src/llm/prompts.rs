use crate::llm::ChatMessage;

// Article descriptions and filings can be long; keep prompts within typical context limits.
const MAX_PROMPT_CONTENT_CHARS: usize = 24_000;

fn clip(text: &str) -> &str {
    match text.char_indices().nth(MAX_PROMPT_CONTENT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn extract_companies(article_content: &str) -> Vec<ChatMessage> {
    let user = [
        "Extract every company name mentioned in the article content below.",
        "Return ONLY a JSON array of strings, one company name per element.",
        "Do not wrap in markdown. Do not add any other text. Return [] if no company is mentioned.",
        "",
        "Example output:",
        "[\"Apple Inc.\", \"Microsoft Corporation\", \"Amazon.com, Inc.\"]",
        "",
        "Content:",
        clip(article_content),
    ]
    .join("\n");

    vec![
        ChatMessage::system(
            "You extract company names from text and answer with a JSON array of strings.",
        ),
        ChatMessage::user(user),
    ]
}

pub fn classify_special_situation(article_content: &str) -> Vec<ChatMessage> {
    let user = [
        "Decide whether the article content below describes any of:",
        "- a corporate action (merger, acquisition, spinoff, rights offering, tender offer)",
        "- a special situation or workout",
        "- a clear catalyst for a short-term price move",
        "",
        "Return ONLY a JSON object with the single key \"is_special_situation\" and a boolean value.",
        "Do not wrap in markdown. Do not add any other text.",
        "",
        "Example output:",
        "{\"is_special_situation\": true}",
        "",
        "Content:",
        clip(article_content),
    ]
    .join("\n");

    vec![
        ChatMessage::system(
            "You classify news as special situations and answer with a JSON object.",
        ),
        ChatMessage::user(user),
    ]
}

pub fn summarize_findings(findings_text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Summarize the following research notes for an event-driven small-cap investor. \
Keep the ticker, the catalyst, valuation, technical picture, insider activity and key risks.\n\n{}",
        clip(findings_text)
    ))]
}

pub fn trade_recommendation(finding_summary: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Based on the analysis below, write one trade recommendation. Include the ticker symbol, \
entry price, stop-loss, take-profit levels and time horizon, followed by the rationale and \
supporting evidence.\n\nAnalysis:\n{}",
        clip(finding_summary)
    ))]
}

pub fn score_recommendation(recommendation: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Evaluate the trade recommendation below on the likelihood of significant upside, how well \
the downside risk is understood, and the opportunity cost of capital. Start your answer with \
\"Score: N/10\" where N is an integer from 1 to 10, then justify the rating.\n\n\
Recommendation:\n{}",
        clip(recommendation)
    ))]
}

pub fn connectivity_check() -> Vec<ChatMessage> {
    vec![ChatMessage::user("Hello, World!")]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn classification_prompt_names_the_expected_key() {
        let msgs = classify_special_situation("Acme agrees to buy Globex");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[1].content.contains("\"is_special_situation\""));
        assert!(msgs[1].content.ends_with("Acme agrees to buy Globex"));
    }

    #[test]
    fn long_content_is_clipped_on_a_char_boundary() {
        let long = "é".repeat(MAX_PROMPT_CONTENT_CHARS + 10);
        let msgs = extract_companies(&long);
        let body = &msgs[1].content;
        assert_eq!(
            body.chars().filter(|c| *c == 'é').count(),
            MAX_PROMPT_CONTENT_CHARS
        );
    }
}
