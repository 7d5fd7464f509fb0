use crate::domain::recommendation::Report;
use crate::report::ReportSink;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Writes the rendered body and the structured report side by side.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// `report_<run_date>_<HHMMSS>`, shared by the `.txt` and `.json` files.
pub fn file_stem(report: &Report) -> String {
    format!(
        "report_{}_{}",
        report.run_date.format("%Y%m%d"),
        report.generated_at.format("%H%M%S")
    )
}

#[async_trait::async_trait]
impl ReportSink for FileSink {
    fn channel(&self) -> &'static str {
        "file"
    }

    async fn deliver(&self, subject: &str, body: &str, report: &Report) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create report dir {}", self.dir.display()))?;

        let stem = file_stem(report);
        let txt_path = self.dir.join(format!("{stem}.txt"));
        let json_path = self.dir.join(format!("{stem}.json"));

        tokio::fs::write(&txt_path, format!("{subject}\n\n{body}\n"))
            .await
            .with_context(|| format!("failed to write {}", txt_path.display()))?;

        let json = serde_json::to_vec_pretty(report).context("failed to serialize report")?;
        tokio::fs::write(&json_path, json)
            .await
            .with_context(|| format!("failed to write {}", json_path.display()))?;

        tracing::info!(
            run_id = %report.id,
            path = %txt_path.display(),
            items = report.items.len(),
            "report written"
        );
        Ok(())
    }
}
