mod isolation;
pub mod stages;

pub use isolation::isolate;
pub use stages::{resolve_tickers, LlmStages};

use crate::analysis::{render_findings, BundleBuilder, BundleOptions};
use crate::config::Settings;
use crate::domain::article::CandidateArticle;
use crate::domain::contract::ClassificationVerdict;
use crate::domain::recommendation::{Finding, Report};
use crate::ingest::provider::{
    CompanySearch, FeedSource, FilingRepository, MarketDataProvider, NewsSearch,
};
use crate::llm::ChatClient;
use crate::report::{render_body, ReportSink, SUBJECT};
use crate::resilience::CallExecutor;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// External collaborators, each behind its trait so tests can swap in fakes.
#[derive(Clone)]
pub struct PipelineDeps {
    pub feeds: Arc<dyn FeedSource>,
    pub chat: Arc<dyn ChatClient>,
    pub search: Arc<dyn CompanySearch>,
    pub market: Arc<dyn MarketDataProvider>,
    pub filings: Arc<dyn FilingRepository>,
    pub news: Arc<dyn NewsSearch>,
    pub sink: Arc<dyn ReportSink>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub fast_model: String,
    pub smart_model: String,
    /// Tickers at or above this market cap are skipped.
    pub market_cap_ceiling: f64,
    pub feed_urls: Vec<String>,
    pub bundle: BundleOptions,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        anyhow::ensure!(!settings.rss_feeds.is_empty(), "RSS_FEEDS is required");
        Ok(Self {
            fast_model: settings.require_fast_llm()?.to_string(),
            smart_model: settings.require_smart_llm()?.to_string(),
            market_cap_ceiling: settings.market_cap_ceiling,
            feed_urls: settings.rss_feeds.clone(),
            bundle: BundleOptions::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    NothingToDo { reason: &'static str },
    Reported { report: Report, delivered: bool },
}

pub struct Pipeline {
    deps: PipelineDeps,
    llm_exec: CallExecutor,
    data_exec: CallExecutor,
    bundles: BundleBuilder,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        deps: PipelineDeps,
        llm_exec: CallExecutor,
        data_exec: CallExecutor,
        options: PipelineOptions,
    ) -> Self {
        let bundles = BundleBuilder::new(
            deps.market.clone(),
            deps.filings.clone(),
            deps.news.clone(),
            data_exec.clone(),
            options.bundle.clone(),
        );
        Self {
            deps,
            llm_exec,
            data_exec,
            bundles,
            options,
        }
    }

    fn llm(&self) -> LlmStages<'_> {
        LlmStages {
            chat: self.deps.chat.as_ref(),
            exec: &self.llm_exec,
            fast_model: &self.options.fast_model,
            smart_model: &self.options.smart_model,
        }
    }

    /// One full pass: feeds to delivered report.
    pub async fn run(&self) -> anyhow::Result<PipelineOutcome> {
        let articles = self.fetch_articles().await;
        tracing::info!(articles = articles.len(), "fetched candidate articles");

        let mut findings = Vec::new();
        for (i, article) in articles.iter().enumerate() {
            tracing::info!(
                article = i + 1,
                total = articles.len(),
                title = %article.title,
                "processing article"
            );
            let scope = format!("article {}", article.link);
            if let Some(found) = isolate(&scope, self.process_article(article)).await {
                findings.extend(found);
            }
        }

        if findings.is_empty() {
            tracing::info!("no findings; nothing to recommend");
            return Ok(PipelineOutcome::NothingToDo {
                reason: "no findings",
            });
        }

        let llm = self.llm();
        let mut recommendations = Vec::with_capacity(findings.len());
        for finding in &findings {
            match llm.recommend(finding).await {
                Some(rec) => recommendations.push(rec),
                None => tracing::warn!(ticker = %finding.ticker, "recommendation dropped"),
            }
        }
        if recommendations.is_empty() {
            tracing::info!(findings = findings.len(), "no recommendations generated");
            return Ok(PipelineOutcome::NothingToDo {
                reason: "no recommendations",
            });
        }

        let mut scored = Vec::with_capacity(recommendations.len());
        for rec in recommendations {
            let ticker = rec.ticker.clone();
            match llm.score(rec).await {
                Some(s) => scored.push(s),
                None => tracing::warn!(%ticker, "score dropped"),
            }
        }
        if scored.is_empty() {
            tracing::info!("no recommendations survived scoring");
            return Ok(PipelineOutcome::NothingToDo {
                reason: "no scored recommendations",
            });
        }

        let report = Report::new(Utc::now(), scored);
        let body = render_body(&report.items);
        let delivered = match self.deps.sink.deliver(SUBJECT, &body, &report).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    channel = self.deps.sink.channel(),
                    run_id = %report.id,
                    error = %format!("{e:#}"),
                    "report delivery failed"
                );
                false
            }
        };

        tracing::info!(
            run_id = %report.id,
            items = report.items.len(),
            delivered,
            "pipeline complete"
        );
        Ok(PipelineOutcome::Reported { report, delivered })
    }

    /// Every configured feed in order; a failing feed is skipped.
    pub async fn fetch_articles(&self) -> Vec<CandidateArticle> {
        let mut articles = Vec::new();
        for url in &self.options.feed_urls {
            let scope = format!("{} feed {url}", self.deps.feeds.source_name());
            if let Some(items) = isolate(&scope, self.deps.feeds.fetch(url)).await {
                tracing::debug!(url = %url, items = items.len(), "feed fetched");
                articles.extend(items);
            }
        }
        articles
    }

    async fn process_article(&self, article: &CandidateArticle) -> anyhow::Result<Vec<Finding>> {
        let names = self.llm().extract_company_names(article).await;
        if names.is_empty() {
            tracing::info!(link = %article.link, "no companies extracted; skipping article");
            return Ok(Vec::new());
        }

        let tickers =
            resolve_tickers(self.deps.search.as_ref(), &self.data_exec, &names).await;
        if tickers.is_empty() {
            tracing::info!(link = %article.link, ?names, "no tickers resolved; skipping article");
            return Ok(Vec::new());
        }
        tracing::info!(link = %article.link, ?tickers, "extracted tickers");

        let mut verdict: Option<ClassificationVerdict> = None;
        let mut findings = Vec::new();
        for ticker in &tickers {
            let scope = format!("ticker {ticker}");
            let found = isolate(&scope, self.process_ticker(article, ticker, &mut verdict)).await;
            if let Some(Some(finding)) = found {
                findings.push(finding);
            }
        }
        Ok(findings)
    }

    async fn process_ticker(
        &self,
        article: &CandidateArticle,
        ticker: &str,
        verdict: &mut Option<ClassificationVerdict>,
    ) -> anyhow::Result<Option<Finding>> {
        let market = self.deps.market.as_ref();
        let snapshot = self
            .data_exec
            .execute("snapshot", || market.snapshot(ticker))
            .await
            .with_context(|| format!("market data unavailable for {ticker}"))?;

        let Some(market_cap) = snapshot.market_cap else {
            tracing::warn!(ticker, "market cap missing; skipping");
            return Ok(None);
        };
        if market_cap >= self.options.market_cap_ceiling {
            tracing::info!(
                ticker,
                market_cap,
                ceiling = self.options.market_cap_ceiling,
                "market cap at or above ceiling; skipping"
            );
            return Ok(None);
        }

        let is_special = match verdict.as_ref() {
            Some(v) => v.is_special_situation,
            None => {
                let v = self.llm().classify(article).await;
                let is_special = v.is_special_situation;
                *verdict = Some(v);
                is_special
            }
        };
        if !is_special {
            tracing::info!(ticker, link = %article.link, "not a special situation; skipping");
            return Ok(None);
        }

        let bundle = self.bundles.build(ticker).await;
        let findings_text = render_findings(article, &bundle);
        let summary = self
            .llm()
            .summarize(&findings_text)
            .await
            .with_context(|| format!("summarization failed for {ticker}"))?;

        tracing::info!(ticker, "analysis complete");
        Ok(Some(Finding {
            ticker: ticker.to_string(),
            article_title: article.title.clone(),
            article_link: article.link.clone(),
            summary,
        }))
    }
}
