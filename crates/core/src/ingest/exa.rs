use crate::config::Settings;
use crate::domain::analysis::NewsExcerpt;
use crate::ingest::provider::NewsSearch;
use crate::resilience::{parse_retry_after, RateLimitedError};
use anyhow::{Context, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SEARCH_URL: &str = "https://api.exa.ai/search";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TEXT_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct ExaClient {
    http: reqwest::Client,
    api_key: String,
}

impl ExaClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_exa_api_key()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build Exa http client")?;
        Ok(Self { http, api_key })
    }
}

#[async_trait::async_trait]
impl NewsSearch for ExaClient {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<NewsExcerpt>> {
        let req = SearchRequest {
            query,
            kind: "neural",
            num_results,
            contents: Contents {
                text: TextOptions {
                    max_characters: MAX_TEXT_CHARS,
                },
            },
        };

        let res = self
            .http
            .post(SEARCH_URL)
            .header("x-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .context("Exa search request failed")?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RateLimitedError {
                service: "exa",
                retry_after: parse_retry_after(res.headers().get(RETRY_AFTER)),
            }
            .into());
        }
        let text = res.text().await.context("failed to read Exa response")?;
        if !status.is_success() {
            anyhow::bail!("Exa HTTP {status}: {text}");
        }

        let results = parse_search_response(&text)?;
        tracing::debug!(query, results = results.len(), "Exa search complete");
        Ok(results)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    num_results: usize,
    contents: Contents,
}

#[derive(Debug, Serialize)]
struct Contents {
    text: TextOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextOptions {
    max_characters: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
}

fn parse_search_response(body: &str) -> Result<Vec<NewsExcerpt>> {
    let parsed: SearchResponse =
        serde_json::from_str(body).context("failed to decode Exa search response")?;

    Ok(parsed
        .results
        .into_iter()
        .filter_map(|r| {
            let text = r.text.unwrap_or_default().trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(NewsExcerpt {
                title: r.title.unwrap_or_default().trim().to_string(),
                url: r.url,
                text,
            })
        })
        .collect())
}
