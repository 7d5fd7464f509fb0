use crate::domain::recommendation::Report;
use crate::report::ReportSink;
use crate::storage::reports::persist_report;

pub struct PostgresSink {
    pool: sqlx::PgPool,
}

impl PostgresSink {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReportSink for PostgresSink {
    fn channel(&self) -> &'static str {
        "postgres"
    }

    async fn deliver(&self, _subject: &str, body: &str, report: &Report) -> anyhow::Result<()> {
        let run_id = persist_report(&self.pool, report, self.channel(), body).await?;
        tracing::info!(%run_id, items = report.items.len(), "report persisted");
        Ok(())
    }
}
