use crate::config::Settings;
use crate::ingest::provider::FilingRepository;
use crate::ingest::types::Filing;
use crate::resilience::{parse_retry_after, RateLimitedError, RateLimiter};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const SUBMISSIONS_BASE_URL: &str = "https://data.sec.gov/submissions";
const ARCHIVES_BASE_URL: &str = "https://www.sec.gov/Archives/edgar/data";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

// EDGAR fair-access policy allows 10 requests/second; stay under it.
const MAX_REQUESTS_PER_SECOND: f64 = 8.0;

#[derive(Debug)]
pub struct SecEdgarClient {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    cik_by_ticker: tokio::sync::Mutex<Option<HashMap<String, u64>>>,
}

impl SecEdgarClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_str(&settings.sec_user_agent)
                .context("SEC_USER_AGENT is not a valid header value")?,
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .context("failed to build SEC EDGAR http client")?;

        Ok(Self {
            http,
            limiter: Arc::new(RateLimiter::new(MAX_REQUESTS_PER_SECOND)),
            cik_by_ticker: tokio::sync::Mutex::new(None),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.limiter.acquire().await;
        let res = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("SEC EDGAR request failed: {url}"))?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RateLimitedError {
                service: "sec_edgar",
                retry_after: parse_retry_after(res.headers().get(RETRY_AFTER)),
            }
            .into());
        }
        let text = res
            .text()
            .await
            .context("failed to read SEC EDGAR response")?;
        if !status.is_success() {
            anyhow::bail!("SEC EDGAR HTTP {status}: {url}");
        }
        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get_text(url).await?;
        serde_json::from_str::<T>(&text)
            .with_context(|| format!("SEC EDGAR response is not the expected JSON: {url}"))
    }

    async fn cik_for(&self, ticker: &str) -> Result<u64> {
        let mut guard = self.cik_by_ticker.lock().await;
        if guard.is_none() {
            let raw: HashMap<String, TickerEntry> = self.get_json(TICKERS_URL).await?;
            let map = ticker_map(raw);
            tracing::debug!(tickers = map.len(), "loaded EDGAR ticker map");
            *guard = Some(map);
        }

        guard
            .as_ref()
            .and_then(|m| m.get(&normalize_ticker(ticker)).copied())
            .with_context(|| format!("no SEC CIK for ticker {ticker}"))
    }
}

#[async_trait::async_trait]
impl FilingRepository for SecEdgarClient {
    async fn filings(&self, ticker: &str, forms: &[&str], limit: usize) -> Result<Vec<Filing>> {
        let cik = self.cik_for(ticker).await?;
        let url = format!("{SUBMISSIONS_BASE_URL}/CIK{cik:010}.json");
        let submissions: Submissions = self.get_json(&url).await?;
        Ok(submissions.recent_filings(cik, forms, limit))
    }

    async fn document_text(&self, filing: &Filing) -> Result<String> {
        let html = self.get_text(&filing.url).await?;
        Ok(strip_markup(&html))
    }
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase().replace('.', "-")
}

fn ticker_map(raw: HashMap<String, TickerEntry>) -> HashMap<String, u64> {
    raw.into_values()
        .map(|e| (normalize_ticker(&e.ticker), e.cik_str))
        .collect()
}

#[derive(Debug, Deserialize)]
struct Submissions {
    filings: SubmissionFilings,
}

#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    recent: RecentFilings,
}

/// EDGAR returns the recent filings as parallel column arrays.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    #[serde(default)]
    accession_number: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
    #[serde(default)]
    form: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
}

impl Submissions {
    fn recent_filings(self, cik: u64, forms: &[&str], limit: usize) -> Vec<Filing> {
        let recent = self.filings.recent;
        let mut out = Vec::new();
        for (i, form) in recent.form.iter().enumerate() {
            if out.len() >= limit {
                break;
            }
            if !forms.iter().any(|f| f.eq_ignore_ascii_case(form)) {
                continue;
            }
            let (Some(accession), Some(document)) =
                (recent.accession_number.get(i), recent.primary_document.get(i))
            else {
                continue;
            };
            if document.is_empty() {
                continue;
            }

            out.push(Filing {
                form: form.clone(),
                filing_date: recent
                    .filing_date
                    .get(i)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
                accession_number: accession.clone(),
                url: document_url(cik, accession, document),
            });
        }
        out
    }
}

fn document_url(cik: u64, accession: &str, document: &str) -> String {
    format!(
        "{ARCHIVES_BASE_URL}/{cik}/{}/{document}",
        accession.replace('-', "")
    )
}

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|head)\b.*?</(script|style|head)\s*>").expect("static regex")
    })
}

fn break_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<\s*(br|/p|/div|/tr|/li|/h[1-6]|/table)\b[^>]*>").expect("static regex")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"))
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#x?[0-9a-fA-F]+|[a-zA-Z]+);").expect("static regex"))
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "rsquo" | "lsquo" => Some('\''),
        "rdquo" | "ldquo" => Some('"'),
        "mdash" | "ndash" => Some('-'),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or(entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            match char::from_u32(code)? {
                '\u{a0}' => Some(' '),
                c => Some(c),
            }
        }
    }
}

/// Reduces an EDGAR HTML document to plain text, one block element per line.
pub fn strip_markup(html: &str) -> String {
    let text = block_regex().replace_all(html, " ");
    let text = break_regex().replace_all(&text, "\n");
    let text = tag_regex().replace_all(&text, " ");
    let text = entity_regex().replace_all(&text, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[1]).map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
