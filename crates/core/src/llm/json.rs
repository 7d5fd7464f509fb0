use crate::domain::contract::{validate_company_names, LlmVerdict};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::Provider;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    fn delimiters(self) -> (char, char) {
        match self {
            JsonShape::Object => ('{', '}'),
            JsonShape::Array => ('[', ']'),
        }
    }
}

pub fn extract_json(text: &str, shape: JsonShape) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        let inner = inner.trim();
        if serde_json::from_str::<serde_json::Value>(inner).is_ok() {
            return Some(inner.to_string());
        }
        // Single-line fences keep the language tag; fall through to delimiter scanning.
    }

    // Best-effort extraction: first opening delimiter to the last closing one.
    let (open, close) = shape.delimiters();
    let start = trimmed.find(open)?;
    let end = trimmed.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

fn parse_shape<T: DeserializeOwned>(
    text: &str,
    shape: JsonShape,
    what: &str,
) -> anyhow::Result<T> {
    let json_str = extract_json(text, shape).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str::<T>(&json_str).map_err(|err| {
        LlmDiagnosticsError::new(
            Provider::OpenRouter,
            "parse",
            format!("output is not a valid {what}: {err}"),
            text,
        )
        .into()
    })
}

pub fn parse_verdict(text: &str) -> anyhow::Result<LlmVerdict> {
    parse_shape(text, JsonShape::Object, "is_special_situation object")
}

pub fn parse_company_names(text: &str) -> anyhow::Result<Vec<String>> {
    let raw: Vec<String> = parse_shape(text, JsonShape::Array, "array of company names")?;
    Ok(validate_company_names(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced, JsonShape::Object), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_delimiters() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(
            extract_json(s, JsonShape::Object),
            Some("{\"a\":1}".to_string())
        );

        let s = "Here you go: [\"Acme\", \"Globex\"] hope that helps";
        assert_eq!(
            extract_json(s, JsonShape::Array),
            Some("[\"Acme\", \"Globex\"]".to_string())
        );
    }

    #[test]
    fn parse_verdict_accepts_wrapped_object() {
        let v = parse_verdict("Sure!\n{\"is_special_situation\": false}").unwrap();
        assert!(!v.is_special_situation);
    }

    #[test]
    fn parse_verdict_rejects_wrong_shape_with_diagnostics() {
        let err = parse_verdict("[true]").unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "parse");
        assert_eq!(diag.raw_output.as_deref(), Some("[true]"));
    }

    #[test]
    fn parse_company_names_accepts_fenced_array() {
        let names =
            parse_company_names("```json\n[\"Apple Inc.\", \"Microsoft Corporation\"]\n```")
                .unwrap();
        assert_eq!(names, vec!["Apple Inc.", "Microsoft Corporation"]);
    }

    #[test]
    fn parse_company_names_accepts_single_line_fence() {
        let names = parse_company_names("```json [\"Acme\"]```").unwrap();
        assert_eq!(names, vec!["Acme"]);

        let v = parse_verdict("```{\"is_special_situation\": true}```").unwrap();
        assert!(v.is_special_situation);
    }

    #[test]
    fn parse_company_names_keeps_names_beside_an_overlong_one() {
        let raw = format!("[\"Acme\", \"{}\", \"Globex\"]", "x".repeat(300));
        assert_eq!(parse_company_names(&raw).unwrap(), vec!["Acme", "Globex"]);
    }

    #[test]
    fn parse_company_names_accepts_empty_array() {
        assert!(parse_company_names("[]").unwrap().is_empty());
    }

    #[test]
    fn parse_company_names_rejects_objects() {
        assert!(parse_company_names("{\"names\": \"Acme\"}").is_err());
        assert!(parse_company_names("[1, 2]").is_err());
    }
}
