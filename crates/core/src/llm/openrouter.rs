use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{ChatClient, ChatMessage, Provider};
use crate::resilience::{parse_retry_after, RateLimitedError};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const APP_TITLE: &str = "sitscout";

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::with_timeout(settings, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(settings: &Settings, timeout: Duration) -> anyhow::Result<Self> {
        let api_key = settings.require_openrouter_api_key()?.to_string();
        let base_url = settings
            .openrouter_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("OPENROUTER_API_KEY is not a valid header value")?,
        );
        headers.insert("X-Title", HeaderValue::from_static(APP_TITLE));
        Ok(headers)
    }

    async fn create_completion(&self, req: &CompletionRequest<'_>) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(req)
            .send()
            .await
            .context("OpenRouter request failed")?;

        let status = res.status();
        let retry_after = parse_retry_after(res.headers().get(RETRY_AFTER));
        let text = res
            .text()
            .await
            .context("failed to read OpenRouter response body")?;

        check_status(status, retry_after, &text)?;
        response_text(&text)
    }
}

fn check_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> anyhow::Result<()> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(anyhow::Error::new(RateLimitedError {
            service: "openrouter",
            retry_after,
        })
        .context(format!("OpenRouter HTTP {status}: {body}")));
    }
    if !status.is_success() {
        return Err(LlmDiagnosticsError::new(
            Provider::OpenRouter,
            "http",
            format!("status={status}"),
            body,
        )
        .into());
    }
    Ok(())
}

fn response_text(body: &str) -> anyhow::Result<String> {
    let parsed = serde_json::from_str::<CompletionResponse>(body)
        .with_context(|| format!("failed to decode OpenRouter response: {body}"))?;

    // OpenRouter reports some upstream failures inside a 200 body.
    if let Some(err) = parsed.error {
        if err.code == Some(429) {
            return Err(RateLimitedError {
                service: "openrouter",
                retry_after: None,
            }
            .into());
        }
        return Err(
            LlmDiagnosticsError::new(Provider::OpenRouter, "upstream", err.message, body).into(),
        );
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    content.ok_or_else(|| {
        LlmDiagnosticsError::new(
            Provider::OpenRouter,
            "decode",
            "response has no message content",
            body,
        )
        .into()
    })
}

#[async_trait::async_trait]
impl ChatClient for OpenRouterClient {
    fn provider(&self) -> Provider {
        Provider::OpenRouter
    }

    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let req = CompletionRequest { model, messages };
        let text = self
            .create_completion(&req)
            .await
            .map_err(|err| LlmDiagnosticsError::tag_model(err, model))?;
        tracing::debug!(model, chars = text.len(), "LLM completion received");
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_role_tagged_messages() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let req = CompletionRequest {
            model: "fast/model",
            messages: &messages,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "model": "fast/model",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"},
                ]
            })
        );
    }

    #[test]
    fn extracts_first_choice_content() {
        let body = json!({
            "id": "gen-1",
            "choices": [{"message": {"role": "assistant", "content": "  [\"Acme\"]\n"}}]
        })
        .to_string();
        assert_eq!(response_text(&body).unwrap(), "[\"Acme\"]");
    }

    #[test]
    fn empty_choices_are_a_decode_error() {
        let err = response_text(r#"{"choices": []}"#).unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "decode");
    }

    #[test]
    fn too_many_requests_maps_to_rate_limited() {
        let err = check_status(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(12)),
            "slow down",
        )
        .unwrap_err();
        let rl = err
            .chain()
            .find_map(|e| e.downcast_ref::<RateLimitedError>())
            .unwrap();
        assert_eq!(rl.retry_after, Some(Duration::from_secs(12)));
    }

    #[test]
    fn upstream_429_in_body_maps_to_rate_limited() {
        let err = response_text(r#"{"error": {"code": 429, "message": "busy"}}"#).unwrap_err();
        assert!(err.downcast_ref::<RateLimitedError>().is_some());
    }

    #[test]
    fn server_errors_keep_the_raw_body() {
        let err = check_status(StatusCode::BAD_GATEWAY, None, "upstream down").unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "http");
        assert_eq!(diag.raw_output.as_deref(), Some("upstream down"));
    }
}
