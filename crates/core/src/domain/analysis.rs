use crate::domain::market::InsiderTrade;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingExcerpt {
    pub form: String,
    pub filed: Option<NaiveDate>,
    /// `(section title, text)`; a single `("Full text", ..)` entry for forms without sections.
    pub sections: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfValuation {
    pub enterprise_value: f64,
    pub per_share: Option<f64>,
    pub wacc: f64,
    pub base_free_cash_flow: f64,
}

/// Indicator columns aligned with `dates`; `None` where the lookback window is not yet filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalFrame {
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
    pub sma20: Vec<Option<f64>>,
    pub sma50: Vec<Option<f64>>,
    pub ema12: Vec<Option<f64>>,
    pub ema26: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_hist: Vec<Option<f64>>,
    pub rsi14: Vec<Option<f64>>,
    pub boll_upper: Vec<Option<f64>>,
    pub boll_middle: Vec<Option<f64>>,
    pub boll_lower: Vec<Option<f64>>,
    pub atr14: Vec<Option<f64>>,
    pub obv: Vec<f64>,
}

impl TechnicalFrame {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsExcerpt {
    pub title: String,
    pub url: String,
    pub text: String,
}

/// Per-ticker research inputs. Each field is filled independently and may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBundle {
    pub ticker: String,
    pub filings: Option<Vec<FilingExcerpt>>,
    pub dcf: Option<DcfValuation>,
    pub technical: Option<TechnicalFrame>,
    pub insider_trades: Option<Vec<InsiderTrade>>,
    pub news: Option<Vec<NewsExcerpt>>,
}

impl AnalysisBundle {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Default::default()
        }
    }

    pub fn filled_fields(&self) -> usize {
        [
            self.filings.is_some(),
            self.dcf.is_some(),
            self.technical.is_some(),
            self.insider_trades.is_some(),
            self.news.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count()
    }
}
