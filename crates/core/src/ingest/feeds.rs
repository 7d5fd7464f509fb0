use crate::domain::article::CandidateArticle;
use crate::ingest::provider::FeedSource;
use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; sitscout/0.1; +https://github.com/sitscout)";

#[derive(Debug, Clone)]
pub struct RssFeedSource {
    http: reqwest::Client,
}

impl RssFeedSource {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build feed http client")?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl FeedSource for RssFeedSource {
    fn source_name(&self) -> &'static str {
        "rss"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<CandidateArticle>> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("feed request failed: {url}"))?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("feed HTTP {status}: {url}");
        }

        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = res
            .bytes()
            .await
            .with_context(|| format!("failed to read feed body: {url}"))?;

        let xml = decode_body(&bytes, content_type.as_deref());
        let articles = parse_feed(&xml).with_context(|| format!("invalid RSS document: {url}"))?;
        tracing::debug!(url, articles = articles.len(), "feed parsed");
        Ok(articles)
    }
}

pub fn parse_feed(xml: &str) -> Result<Vec<CandidateArticle>> {
    let channel = rss::Channel::read_from(xml.as_bytes()).context("failed to parse RSS channel")?;

    let articles = channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title().unwrap_or_default().trim();
            let link = item.link().unwrap_or_default().trim();
            if title.is_empty() && link.is_empty() {
                return None;
            }
            Some(CandidateArticle::new(
                title,
                link,
                item.pub_date().unwrap_or_default().trim(),
                item.description().unwrap_or_default().trim(),
            ))
        })
        .collect();

    Ok(articles)
}

/// Decodes a feed body to UTF-8 using the HTTP charset, then the XML declaration.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .or_else(|| declared_encoding(bytes))
        .unwrap_or(UTF_8);
    let (cow, _, _) = encoding.decode(bytes);
    cow.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("charset="))
        .find_map(|label| Encoding::for_label(label.trim_matches('"').as_bytes()))
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(256)];
    let head = std::str::from_utf8(head).ok().or_else(|| {
        // Truncation may split a multi-byte char; the declaration is ASCII anyway.
        let valid = head.iter().take_while(|b| b.is_ascii()).count();
        std::str::from_utf8(&head[..valid]).ok()
    })?;
    let decl_end = head.find("?>")?;
    let decl = &head[..decl_end];
    let rest = &decl[decl.find("encoding=")? + "encoding=".len()..];
    let mut chars = rest.chars();
    let quote = chars.next().filter(|c| matches!(c, '"' | '\''))?;
    let label = chars.as_str().split(quote).next()?;
    Encoding::for_label(label.as_bytes())
}
