pub mod email;
pub mod file;
pub mod postgres;

use crate::domain::recommendation::{Report, ScoredRecommendation};

pub use email::EmailSink;
pub use file::FileSink;
pub use postgres::PostgresSink;

pub const SUBJECT: &str = "Daily Trade Recommendations";

/// One `Recommendation:/Score:` block per item, blank-line separated.
pub fn render_body(items: &[ScoredRecommendation]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "Recommendation:\n{}\nScore:\n{}",
                item.recommendation.text, item.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn deliver(&self, subject: &str, body: &str, report: &Report) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::Recommendation;

    fn item(text: &str, score: &str) -> ScoredRecommendation {
        ScoredRecommendation {
            recommendation: Recommendation {
                ticker: "X".to_string(),
                text: text.to_string(),
            },
            score: score.to_string(),
            rating: None,
        }
    }

    #[test]
    fn single_item_has_no_trailing_separator() {
        assert_eq!(
            render_body(&[item("Buy X", "8")]),
            "Recommendation:\nBuy X\nScore:\n8"
        );
    }

    #[test]
    fn items_are_joined_by_blank_lines() {
        assert_eq!(
            render_body(&[item("Buy X", "8"), item("Sell Y", "3")]),
            "Recommendation:\nBuy X\nScore:\n8\n\nRecommendation:\nSell Y\nScore:\n3"
        );
        assert_eq!(render_body(&[]), "");
    }
}
