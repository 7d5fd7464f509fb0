use crate::analysis::{dcf, sec, technical};
use crate::domain::analysis::AnalysisBundle;
use crate::domain::article::CandidateArticle;
use crate::ingest::provider::{FilingRepository, MarketDataProvider, NewsSearch};
use crate::ingest::types::HistoryRange;
use crate::pipeline::isolate;
use crate::resilience::CallExecutor;
use anyhow::Context;
use std::fmt::Write as _;
use std::sync::Arc;

const MAX_INSIDER_ROWS: usize = 10;

#[derive(Debug, Clone)]
pub struct BundleOptions {
    pub history_range: HistoryRange,
    pub max_filings: usize,
    pub news_results: usize,
    pub dcf: dcf::DcfAssumptions,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            history_range: HistoryRange::OneYear,
            max_filings: 3,
            news_results: 5,
            dcf: dcf::DcfAssumptions::default(),
        }
    }
}

/// Fills an [`AnalysisBundle`] one capability at a time; each failure only empties its own field.
pub struct BundleBuilder {
    market: Arc<dyn MarketDataProvider>,
    filings: Arc<dyn FilingRepository>,
    news: Arc<dyn NewsSearch>,
    exec: CallExecutor,
    options: BundleOptions,
}

impl BundleBuilder {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        filings: Arc<dyn FilingRepository>,
        news: Arc<dyn NewsSearch>,
        exec: CallExecutor,
        options: BundleOptions,
    ) -> Self {
        Self {
            market,
            filings,
            news,
            exec,
            options,
        }
    }

    pub async fn build(&self, ticker: &str) -> AnalysisBundle {
        let mut bundle = AnalysisBundle::new(ticker);

        bundle.filings = isolate(
            &format!("{ticker}: SEC filings"),
            sec::filing_excerpts(
                self.filings.as_ref(),
                &self.exec,
                ticker,
                self.options.max_filings,
            ),
        )
        .await;

        bundle.dcf = isolate(&format!("{ticker}: DCF"), async {
            let fin = self
                .exec
                .execute("financials", || self.market.financials(ticker))
                .await
                .context("financial statements unavailable")?;
            dcf::valuation(&fin, &self.options.dcf)
        })
        .await;

        bundle.technical = isolate(&format!("{ticker}: technical"), async {
            let bars = self
                .exec
                .execute("price_history", || {
                    self.market.price_history(ticker, self.options.history_range)
                })
                .await
                .context("price history unavailable")?;
            anyhow::ensure!(!bars.is_empty(), "empty price history");
            Ok(technical::compute_frame(&bars))
        })
        .await;

        bundle.insider_trades = isolate(&format!("{ticker}: insider trades"), async {
            self.exec
                .execute("insider_trades", || self.market.insider_trades(ticker))
                .await
                .context("insider trades unavailable")
        })
        .await;

        bundle.news = isolate(&format!("{ticker}: news"), async {
            let query = format!("{ticker} stock news");
            self.exec
                .execute("news_search", || {
                    self.news.search(&query, self.options.news_results)
                })
                .await
                .context("news search unavailable")
        })
        .await;

        tracing::info!(
            ticker,
            provider = self.market.provider_name(),
            filled = bundle.filled_fields(),
            "analysis bundle built"
        );
        bundle
    }
}

/// Plain-text findings handed to the summarization prompt.
pub fn render_findings(article: &CandidateArticle, bundle: &AnalysisBundle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ticker: {}", bundle.ticker);
    let _ = writeln!(out, "Source article: {} ({})", article.title, article.link);
    let _ = writeln!(out, "Article summary: {}", article.content());

    out.push_str("\nSEC Analysis:\n");
    match &bundle.filings {
        Some(filings) if !filings.is_empty() => {
            for f in filings {
                let filed = f.filed.map(|d| d.to_string()).unwrap_or_default();
                let _ = writeln!(out, "[{} {}]", f.form, filed);
                for (title, text) in &f.sections {
                    let _ = writeln!(out, "{title}:\n{text}");
                }
            }
        }
        Some(_) => out.push_str("No relevant filings.\n"),
        None => out.push_str("Unavailable.\n"),
    }

    out.push_str("\nDCF Value:\n");
    match &bundle.dcf {
        Some(v) => {
            let _ = write!(
                out,
                "Enterprise value {:.0} (WACC {:.2}%, base FCF {:.0})",
                v.enterprise_value,
                v.wacc * 100.0,
                v.base_free_cash_flow
            );
            if let Some(ps) = v.per_share {
                let _ = write!(out, "; {ps:.2} per share");
            }
            out.push('\n');
        }
        None => out.push_str("Unavailable.\n"),
    }

    out.push_str("\nTechnical Analysis:\n");
    match &bundle.technical {
        Some(frame) => {
            let _ = writeln!(out, "{}", technical::summarize(frame));
        }
        None => out.push_str("Unavailable.\n"),
    }

    out.push_str("\nInsider Trades:\n");
    match &bundle.insider_trades {
        Some(trades) if !trades.is_empty() => {
            for t in trades.iter().take(MAX_INSIDER_ROWS) {
                let date = t.date.map(|d| d.to_string()).unwrap_or_default();
                let shares = t.shares.map(|s| format!("{s:.0} shares")).unwrap_or_default();
                let value = t.value.map(|v| format!(" (${v:.0})")).unwrap_or_default();
                let _ = writeln!(
                    out,
                    "{date} {} ({}): {} {shares}{value}",
                    t.insider, t.relation, t.transaction
                );
            }
        }
        Some(_) => out.push_str("None reported.\n"),
        None => out.push_str("Unavailable.\n"),
    }

    if let Some(news) = bundle.news.as_ref().filter(|n| !n.is_empty()) {
        out.push_str("\nRecent News:\n");
        for n in news {
            let _ = writeln!(out, "- {} ({})\n{}", n.title, n.url, n.text);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::DcfValuation;
    use crate::domain::market::InsiderTrade;

    #[test]
    fn render_marks_missing_capabilities() {
        let article = CandidateArticle::new("Acme spinoff", "https://n.example/a", "", "Acme splits.");
        let mut bundle = AnalysisBundle::new("ACME");
        bundle.dcf = Some(DcfValuation {
            enterprise_value: 1_000_000.0,
            per_share: Some(4.5),
            wacc: 0.0759,
            base_free_cash_flow: 50_000.0,
        });
        bundle.insider_trades = Some(vec![InsiderTrade {
            insider: "Jane Roe".into(),
            relation: "CEO".into(),
            transaction: "Purchase".into(),
            shares: Some(1000.0),
            value: Some(4200.0),
            date: None,
        }]);

        let text = render_findings(&article, &bundle);
        assert!(text.starts_with("Ticker: ACME\nSource article: Acme spinoff"));
        assert!(text.contains("SEC Analysis:\nUnavailable."));
        assert!(text.contains("Enterprise value 1000000 (WACC 7.59%, base FCF 50000); 4.50 per share"));
        assert!(text.contains("Technical Analysis:\nUnavailable."));
        assert!(text.contains("Jane Roe (CEO): Purchase 1000 shares ($4200)"));
        assert!(!text.contains("Recent News"));
    }
}
