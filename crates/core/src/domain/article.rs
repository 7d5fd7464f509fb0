use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One feed entry considered for a pipeline pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateArticle {
    pub title: String,
    pub link: String,
    /// Raw `pubDate` as published by the feed.
    pub published: String,
    pub published_at: Option<DateTime<Utc>>,
    pub description: String,
}

impl CandidateArticle {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        published: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let published = published.into();
        let published_at = DateTime::parse_from_rfc2822(published.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        Self {
            title: title.into(),
            link: link.into(),
            published,
            published_at,
            description: description.into(),
        }
    }

    /// Text handed to the LLM; falls back to the title when the feed omits a description.
    pub fn content(&self) -> &str {
        if self.description.trim().is_empty() {
            &self.title
        } else {
            &self.description
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc2822_publication_dates() {
        let a = CandidateArticle::new("t", "l", "Tue, 01 Oct 2024 13:30:00 +0200", "d");
        assert_eq!(
            a.published_at,
            Some(Utc.with_ymd_and_hms(2024, 10, 1, 11, 30, 0).unwrap())
        );

        let b = CandidateArticle::new("t", "l", "yesterday", "d");
        assert!(b.published_at.is_none());
        assert_eq!(b.published, "yesterday");
    }

    #[test]
    fn content_falls_back_to_title() {
        let a = CandidateArticle::new("Acme to spin off unit", "l", "", "  ");
        assert_eq!(a.content(), "Acme to spin off unit");
    }
}
