use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub ticker: String,
    pub article_title: String,
    pub article_link: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub ticker: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecommendation {
    pub recommendation: Recommendation,
    /// Score text as returned by the model (number plus justification).
    pub score: String,
    /// First 1..=10 integer found in `score`, when there is one.
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub run_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ScoredRecommendation>,
}

impl Report {
    pub fn new(generated_at: DateTime<Utc>, items: Vec<ScoredRecommendation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_date: generated_at.date_naive(),
            generated_at,
            items,
        }
    }
}
