use crate::domain::market::{FinancialStatements, InsiderTrade, PriceBar, TickerSnapshot};
use crate::ingest::provider::{CompanySearch, MarketDataProvider};
use crate::ingest::types::HistoryRange;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const QUERY_BASE_URL: &str = "https://query2.finance.yahoo.com";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const FINANCIAL_MODULES: &str =
    "price,defaultKeyStatistics,cashflowStatementHistory,balanceSheetHistory,incomeStatementHistory";

#[derive(Debug)]
pub struct YahooFinanceClient {
    http: reqwest::Client,
    base_url: String,
    // quoteSummary needs a crumb bound to the session cookie; fetched once per process run.
    crumb: tokio::sync::Mutex<Option<String>>,
}

impl YahooFinanceClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()
            .context("failed to build Yahoo Finance http client")?;

        Ok(Self {
            http,
            base_url: QUERY_BASE_URL.to_string(),
            crumb: tokio::sync::Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Yahoo Finance request failed: {url}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Yahoo Finance response")?;
        if status == StatusCode::UNAUTHORIZED {
            self.crumb.lock().await.take();
        }
        if !status.is_success() {
            anyhow::bail!("Yahoo Finance HTTP {status}: {text}");
        }

        serde_json::from_str::<Value>(&text)
            .with_context(|| format!("Yahoo Finance response is not valid JSON: {text}"))
    }

    async fn crumb(&self) -> Result<String> {
        let mut guard = self.crumb.lock().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }

        // This endpoint answers 404 but sets the session cookie we need.
        let _ = self.http.get(COOKIE_URL).send().await;

        let res = self
            .http
            .get(self.url("/v1/test/getcrumb"))
            .send()
            .await
            .context("Yahoo Finance crumb request failed")?;
        let status = res.status();
        let crumb = res
            .text()
            .await
            .context("failed to read Yahoo Finance crumb")?
            .trim()
            .to_string();
        anyhow::ensure!(
            status.is_success() && !crumb.is_empty() && !crumb.contains('<'),
            "Yahoo Finance crumb unavailable (HTTP {status})"
        );

        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    async fn quote_summary(&self, ticker: &str, modules: &str) -> Result<Value> {
        let crumb = self.crumb().await?;
        let url = self.url(&format!("/v10/finance/quoteSummary/{ticker}"));
        let body = self
            .get_json(&url, &[("modules", modules), ("crumb", crumb.as_str())])
            .await?;
        quote_summary_result(body).with_context(|| format!("quoteSummary for {ticker}"))
    }
}

#[async_trait::async_trait]
impl CompanySearch for YahooFinanceClient {
    async fn lookup(&self, company_name: &str) -> Result<Option<String>> {
        let url = self.url("/v1/finance/search");
        let body = self
            .get_json(
                &url,
                &[
                    ("q", company_name),
                    ("quotesCount", "1"),
                    ("newsCount", "0"),
                    ("country", "United States"),
                ],
            )
            .await?;
        let parsed = serde_json::from_value::<SearchResponse>(body)
            .context("failed to decode Yahoo Finance search response")?;
        Ok(parsed.best_symbol())
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooFinanceClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_finance"
    }

    async fn snapshot(&self, ticker: &str) -> Result<TickerSnapshot> {
        let result = self.quote_summary(ticker, "price").await?;
        Ok(TickerSnapshot {
            ticker: ticker.to_string(),
            market_cap: raw(&result, "/price/marketCap"),
        })
    }

    async fn price_history(&self, ticker: &str, range: HistoryRange) -> Result<Vec<PriceBar>> {
        let url = self.url(&format!("/v8/finance/chart/{ticker}"));
        let body = self
            .get_json(&url, &[("range", range.as_query()), ("interval", "1d")])
            .await?;
        parse_chart(body).with_context(|| format!("chart for {ticker}"))
    }

    async fn insider_trades(&self, ticker: &str) -> Result<Vec<InsiderTrade>> {
        let result = self.quote_summary(ticker, "insiderTransactions").await?;
        Ok(parse_insider_trades(&result))
    }

    async fn financials(&self, ticker: &str) -> Result<FinancialStatements> {
        let result = self.quote_summary(ticker, FINANCIAL_MODULES).await?;
        Ok(parse_financials(&result))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    #[serde(default)]
    symbol: Option<String>,
}

impl SearchResponse {
    fn best_symbol(self) -> Option<String> {
        self.quotes
            .into_iter()
            .next()
            .and_then(|q| q.symbol)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

fn quote_summary_result(body: Value) -> Result<Value> {
    let summary = body
        .get("quoteSummary")
        .context("response has no quoteSummary")?;
    if let Some(err) = summary.get("error").filter(|e| !e.is_null()) {
        anyhow::bail!("quoteSummary error: {err}");
    }
    summary
        .pointer("/result/0")
        .cloned()
        .context("quoteSummary has no result")
}

/// Reads a Yahoo `{"raw": .., "fmt": ..}` value, or a bare number.
fn raw(v: &Value, pointer: &str) -> Option<f64> {
    let node = v.pointer(pointer)?;
    node.get("raw")
        .and_then(Value::as_f64)
        .or_else(|| node.as_f64())
}

fn epoch_date(secs: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

pub fn parse_chart(body: Value) -> Result<Vec<PriceBar>> {
    let chart: ChartResponse =
        serde_json::from_value(body).context("failed to decode chart response")?;
    if let Some(err) = chart.chart.error.filter(|e| !e.is_null()) {
        anyhow::bail!("chart error: {err}");
    }
    let result = chart
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .context("chart has no result")?;
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let at = |col: &Vec<Option<f64>>| col.get(i).copied().flatten();
        // Rows with any missing column are dropped.
        let (Some(date), Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            epoch_date(*ts),
            at(&quote.open),
            at(&quote.high),
            at(&quote.low),
            at(&quote.close),
            at(&quote.volume),
        ) else {
            continue;
        };
        bars.push(PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }
    Ok(bars)
}

pub fn parse_insider_trades(result: &Value) -> Vec<InsiderTrade> {
    let Some(rows) = result
        .pointer("/insiderTransactions/transactions")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    rows.iter()
        .map(|row| {
            let text = |key: &str| {
                row.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            };
            InsiderTrade {
                insider: text("filerName"),
                relation: text("filerRelation"),
                transaction: text("transactionText"),
                shares: raw(row, "/shares"),
                value: raw(row, "/value"),
                date: raw(row, "/startDate").and_then(|s| epoch_date(s as i64)),
            }
        })
        .collect()
}

pub fn parse_financials(result: &Value) -> FinancialStatements {
    let cash_flows = result
        .pointer("/cashflowStatementHistory/cashflowStatements")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut operating_cash_flow = Vec::new();
    let mut capital_expenditures = Vec::new();
    for stmt in &cash_flows {
        if let Some(ocf) = raw(stmt, "/totalCashFromOperatingActivities") {
            operating_cash_flow.push(ocf);
            capital_expenditures.push(raw(stmt, "/capitalExpenditures").unwrap_or(0.0));
        }
    }

    let balance = "/balanceSheetHistory/balanceSheetStatements/0";
    let income = "/incomeStatementHistory/incomeStatementHistory/0";
    let long_debt = raw(result, &format!("{balance}/longTermDebt"));
    let short_debt = raw(result, &format!("{balance}/shortLongTermDebt"));
    let total_debt = match (long_debt, short_debt) {
        (None, None) => None,
        (l, s) => Some(l.unwrap_or(0.0) + s.unwrap_or(0.0)),
    };

    FinancialStatements {
        operating_cash_flow,
        capital_expenditures,
        total_debt,
        interest_expense: raw(result, &format!("{income}/interestExpense")),
        income_tax_expense: raw(result, &format!("{income}/incomeTaxExpense")),
        pretax_income: raw(result, &format!("{income}/incomeBeforeTax")),
        market_cap: raw(result, "/price/marketCap"),
        beta: raw(result, "/defaultKeyStatistics/beta"),
        shares_outstanding: raw(result, "/defaultKeyStatistics/sharesOutstanding"),
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_picks_first_symbol() {
        let parsed: SearchResponse = serde_json::from_value(json!({
            "quotes": [{"symbol": "ACME", "shortname": "Acme Corp"}, {"symbol": "ACM"}]
        }))
        .unwrap();
        assert_eq!(parsed.best_symbol().as_deref(), Some("ACME"));

        let empty: SearchResponse = serde_json::from_value(json!({"quotes": []})).unwrap();
        assert_eq!(empty.best_symbol(), None);
    }

    #[test]
    fn market_cap_reads_raw_value_or_none() {
        let result = quote_summary_result(json!({
            "quoteSummary": {"result": [{"price": {"marketCap": {"raw": 4.2e8, "fmt": "420M"}}}], "error": null}
        }))
        .unwrap();
        assert_eq!(raw(&result, "/price/marketCap"), Some(4.2e8));

        let result = quote_summary_result(json!({
            "quoteSummary": {"result": [{"price": {"marketCap": {}}}], "error": null}
        }))
        .unwrap();
        assert_eq!(raw(&result, "/price/marketCap"), None);
    }

    #[test]
    fn quote_summary_surfaces_errors() {
        let err = quote_summary_result(json!({
            "quoteSummary": {"result": null, "error": {"code": "Not Found"}}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn chart_drops_incomplete_rows() {
        let body = json!({
            "chart": {
                "result": [{
                    "timestamp": [1_704_200_400, 1_704_286_800, 1_704_373_200],
                    "indicators": {"quote": [{
                        "open":   [10.0, null, 10.4],
                        "high":   [10.5, 10.6, 10.9],
                        "low":    [9.8, 10.0, 10.1],
                        "close":  [10.2, 10.3, 10.8],
                        "volume": [1000.0, 1100.0, 900.0]
                    }]}
                }],
                "error": null
            }
        });
        let bars = parse_chart(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].close, 10.8);
    }

    #[test]
    fn chart_error_is_reported() {
        let err = parse_chart(json!({
            "chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn insider_rows_are_mapped() {
        let result = json!({
            "insiderTransactions": {"transactions": [{
                "filerName": "DOE JANE",
                "filerRelation": "Chief Executive Officer",
                "transactionText": "Purchase at price 4.10 per share.",
                "shares": {"raw": 25000, "fmt": "25k"},
                "value": {"raw": 102500},
                "startDate": {"raw": 1_704_200_400}
            }]}
        });
        let trades = parse_insider_trades(&result);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].insider, "DOE JANE");
        assert_eq!(trades[0].shares, Some(25_000.0));
        assert_eq!(trades[0].date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert!(parse_insider_trades(&json!({})).is_empty());
    }

    #[test]
    fn financials_collect_statement_lines() {
        let result = json!({
            "price": {"marketCap": {"raw": 3.0e8}},
            "defaultKeyStatistics": {"beta": {"raw": 1.2}, "sharesOutstanding": {"raw": 5.0e7}},
            "cashflowStatementHistory": {"cashflowStatements": [
                {"totalCashFromOperatingActivities": {"raw": 4.0e7}, "capitalExpenditures": {"raw": -1.0e7}},
                {"totalCashFromOperatingActivities": {"raw": 3.5e7}}
            ]},
            "balanceSheetHistory": {"balanceSheetStatements": [
                {"longTermDebt": {"raw": 8.0e7}}
            ]},
            "incomeStatementHistory": {"incomeStatementHistory": [
                {"interestExpense": {"raw": -4.0e6}, "incomeTaxExpense": {"raw": 5.0e6}, "incomeBeforeTax": {"raw": 2.5e7}}
            ]}
        });
        let f = parse_financials(&result);
        assert_eq!(f.operating_cash_flow, vec![4.0e7, 3.5e7]);
        assert_eq!(f.capital_expenditures, vec![-1.0e7, 0.0]);
        assert_eq!(f.total_debt, Some(8.0e7));
        assert_eq!(f.interest_expense, Some(-4.0e6));
        assert_eq!(f.beta, Some(1.2));
        assert_eq!(f.market_cap, Some(3.0e8));
    }
}
