use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub ticker: String,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderTrade {
    pub insider: String,
    pub relation: String,
    pub transaction: String,
    pub shares: Option<f64>,
    pub value: Option<f64>,
    pub date: Option<NaiveDate>,
}

/// Annual statement lines needed for the DCF, most recent period first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub operating_cash_flow: Vec<f64>,
    pub capital_expenditures: Vec<f64>,
    pub total_debt: Option<f64>,
    pub interest_expense: Option<f64>,
    pub income_tax_expense: Option<f64>,
    pub pretax_income: Option<f64>,
    pub market_cap: Option<f64>,
    pub beta: Option<f64>,
    pub shares_outstanding: Option<f64>,
}
