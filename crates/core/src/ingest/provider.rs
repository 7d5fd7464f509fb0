use crate::domain::analysis::NewsExcerpt;
use crate::domain::article::CandidateArticle;
use crate::domain::market::{FinancialStatements, InsiderTrade, PriceBar, TickerSnapshot};
use crate::ingest::types::{Filing, HistoryRange};
use anyhow::Result;

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch(&self, url: &str) -> Result<Vec<CandidateArticle>>;
}

/// Free-text company name to the best matching ticker, if any.
#[async_trait::async_trait]
pub trait CompanySearch: Send + Sync {
    async fn lookup(&self, company_name: &str) -> Result<Option<String>>;
}

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn snapshot(&self, ticker: &str) -> Result<TickerSnapshot>;

    async fn price_history(&self, ticker: &str, range: HistoryRange) -> Result<Vec<PriceBar>>;

    async fn insider_trades(&self, ticker: &str) -> Result<Vec<InsiderTrade>>;

    async fn financials(&self, ticker: &str) -> Result<FinancialStatements>;
}

#[async_trait::async_trait]
pub trait FilingRepository: Send + Sync {
    /// Most recent filings first, restricted to `forms`, at most `limit` entries.
    async fn filings(&self, ticker: &str, forms: &[&str], limit: usize) -> Result<Vec<Filing>>;

    /// Plain text of the filing's primary document.
    async fn document_text(&self, filing: &Filing) -> Result<String>;
}

#[async_trait::async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<NewsExcerpt>>;
}
