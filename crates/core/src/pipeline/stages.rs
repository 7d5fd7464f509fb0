use crate::domain::article::CandidateArticle;
use crate::domain::contract::{rating_from_score, ClassificationVerdict, LlmVerdict};
use crate::domain::recommendation::{Finding, Recommendation, ScoredRecommendation};
use crate::ingest::provider::CompanySearch;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{json, prompts, ChatClient, ChatMessage};
use crate::resilience::CallExecutor;

/// LLM steps of the pipeline, each wrapped in the LLM executor.
pub struct LlmStages<'a> {
    pub chat: &'a dyn ChatClient,
    pub exec: &'a CallExecutor,
    pub fast_model: &'a str,
    pub smart_model: &'a str,
}

impl LlmStages<'_> {
    /// Company names mentioned by the article; empty once retries are exhausted.
    pub async fn extract_company_names(&self, article: &CandidateArticle) -> Vec<String> {
        let messages = prompts::extract_companies(article.content());
        let messages = &messages;
        let (chat, model) = (self.chat, self.fast_model);
        self.exec
            .execute_or("extract_companies", Vec::new(), || async move {
                let text = chat.complete(model, messages).await?;
                json::parse_company_names(&text)
                    .map_err(|err| LlmDiagnosticsError::tag_model(err, model))
            })
            .await
    }

    /// `false` once retries are exhausted.
    pub async fn classify(&self, article: &CandidateArticle) -> ClassificationVerdict {
        let messages = prompts::classify_special_situation(article.content());
        let messages = &messages;
        let (chat, model) = (self.chat, self.fast_model);
        let fallback = LlmVerdict {
            is_special_situation: false,
        };
        self.exec
            .execute_or("classify_special_situation", fallback, || async move {
                let text = chat.complete(model, messages).await?;
                json::parse_verdict(&text).map_err(|err| LlmDiagnosticsError::tag_model(err, model))
            })
            .await
            .into_verdict(&article.link)
    }

    pub async fn summarize(&self, findings_text: &str) -> Option<String> {
        let messages = prompts::summarize_findings(findings_text);
        self.complete("summarize_findings", self.fast_model, &messages)
            .await
    }

    pub async fn recommend(&self, finding: &Finding) -> Option<Recommendation> {
        let messages = prompts::trade_recommendation(&finding.summary);
        let text = self
            .complete("trade_recommendation", self.smart_model, &messages)
            .await?;
        Some(Recommendation {
            ticker: finding.ticker.clone(),
            text,
        })
    }

    pub async fn score(&self, recommendation: Recommendation) -> Option<ScoredRecommendation> {
        let messages = prompts::score_recommendation(&recommendation.text);
        let score = self
            .complete("score_recommendation", self.smart_model, &messages)
            .await?;
        Some(ScoredRecommendation {
            rating: rating_from_score(&score),
            recommendation,
            score,
        })
    }

    async fn complete(
        &self,
        label: &str,
        model: &str,
        messages: &[ChatMessage],
    ) -> Option<String> {
        let chat = self.chat;
        self.exec
            .execute(label, || async move {
                let text = chat.complete(model, messages).await?;
                anyhow::ensure!(!text.trim().is_empty(), "empty completion");
                Ok(text)
            })
            .await
    }
}

/// Resolves names to tickers in order, dropping unresolved names and repeats.
pub async fn resolve_tickers(
    search: &dyn CompanySearch,
    exec: &CallExecutor,
    names: &[String],
) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for name in names {
        let resolved = exec
            .execute("company_search", || search.lookup(name))
            .await
            .flatten();
        match resolved {
            Some(ticker) => {
                let ticker = ticker.trim().to_ascii_uppercase();
                if !ticker.is_empty() && !tickers.contains(&ticker) {
                    tickers.push(ticker);
                }
            }
            None => tracing::debug!(company = %name, "no ticker for company"),
        }
    }
    tickers
}
