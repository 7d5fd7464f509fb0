use crate::llm::Provider;
use std::fmt;

const RAW_EXCERPT_CHARS: usize = 160;

/// A completion that failed at `stage` (`http`, `upstream`, `decode`, `parse`), with the raw
/// output kept for the logs.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub model: Option<String>,
    pub raw_output: Option<String>,
}

impl LlmDiagnosticsError {
    pub fn new(
        provider: Provider,
        stage: &'static str,
        detail: impl Into<String>,
        raw_output: &str,
    ) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            model: None,
            raw_output: Some(raw_output.to_string()),
        }
    }

    /// Records which model produced `err`, if it is a diagnostics error without one.
    pub fn tag_model(mut err: anyhow::Error, model: &str) -> anyhow::Error {
        if let Some(diag) = err.downcast_mut::<Self>() {
            diag.model.get_or_insert_with(|| model.to_string());
        }
        err
    }

    pub fn raw_excerpt(&self) -> Option<&str> {
        let raw = self.raw_output.as_deref()?.trim();
        let end = raw
            .char_indices()
            .nth(RAW_EXCERPT_CHARS)
            .map_or(raw.len(), |(i, _)| i);
        Some(&raw[..end])
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LLM error (provider={:?}", self.provider)?;
        if let Some(model) = &self.model {
            write!(f, ", model={model}")?;
        }
        write!(f, ", stage={}): {}", self.stage, self.detail)?;
        match self.raw_excerpt() {
            Some(raw) if !raw.is_empty() => write!(f, "; raw output: {raw:?}"),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for LlmDiagnosticsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagging_names_the_model_once() {
        let err = anyhow::Error::new(LlmDiagnosticsError::new(
            Provider::OpenRouter,
            "parse",
            "not an array",
            "Sure! Acme",
        ));
        let err = LlmDiagnosticsError::tag_model(err, "fast/model");
        let err = LlmDiagnosticsError::tag_model(err, "other/model");
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.model.as_deref(), Some("fast/model"));
        assert_eq!(
            err.to_string(),
            "LLM error (provider=OpenRouter, model=fast/model, stage=parse): not an array; raw output: \"Sure! Acme\""
        );
    }

    #[test]
    fn tagging_leaves_other_errors_alone() {
        let err = LlmDiagnosticsError::tag_model(anyhow::anyhow!("connection reset"), "m");
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn raw_excerpt_is_clipped_on_a_char_boundary() {
        let raw = "é".repeat(RAW_EXCERPT_CHARS + 40);
        let diag = LlmDiagnosticsError::new(Provider::OpenRouter, "decode", "empty", &raw);
        assert_eq!(diag.raw_excerpt().unwrap().chars().count(), RAW_EXCERPT_CHARS);
    }
}
