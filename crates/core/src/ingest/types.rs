use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One EDGAR filing index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub form: String,
    pub filing_date: Option<NaiveDate>,
    pub accession_number: String,
    pub url: String,
}

/// Yahoo chart `range` values used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    SixMonths,
    OneYear,
    TwoYears,
}

impl HistoryRange {
    pub fn as_query(self) -> &'static str {
        match self {
            HistoryRange::SixMonths => "6mo",
            HistoryRange::OneYear => "1y",
            HistoryRange::TwoYears => "2y",
        }
    }
}
