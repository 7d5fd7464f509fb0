use crate::domain::recommendation::{Recommendation, Report, ScoredRecommendation};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A persisted run as served by the API.
#[derive(Debug, Clone, Serialize)]
pub struct StoredReport {
    pub channel: String,
    pub body: String,
    pub report: Report,
}

pub async fn persist_report(
    pool: &sqlx::PgPool,
    report: &Report,
    channel: &str,
    body: &str,
) -> anyhow::Result<Uuid> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query(
        "INSERT INTO report_runs (id, run_date, generated_at, channel, item_count, body) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(report.id)
    .bind(report.run_date)
    .bind(report.generated_at)
    .bind(channel)
    .bind(report.items.len() as i32)
    .bind(body)
    .execute(&mut *tx)
    .await
    .context("insert report_runs failed")?;

    for (position, item) in report.items.iter().enumerate() {
        insert_item(&mut tx, report.id, position as i32, item).await?;
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(report.id)
}

async fn insert_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    run_id: Uuid,
    position: i32,
    item: &ScoredRecommendation,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO report_items (run_id, position, ticker, recommendation, score, rating) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(run_id)
    .bind(position)
    .bind(&item.recommendation.ticker)
    .bind(&item.recommendation.text)
    .bind(&item.score)
    .bind(item.rating.map(i16::from))
    .execute(&mut **tx)
    .await
    .context("insert report_items failed")?;

    Ok(())
}

pub async fn load_latest(pool: &sqlx::PgPool) -> anyhow::Result<Option<StoredReport>> {
    load(pool, None).await
}

/// Latest run for `run_date`, when several ran that day.
pub async fn load_by_date(
    pool: &sqlx::PgPool,
    run_date: NaiveDate,
) -> anyhow::Result<Option<StoredReport>> {
    load(pool, Some(run_date)).await
}

type RunRow = (Uuid, NaiveDate, DateTime<Utc>, String, String);

async fn load(
    pool: &sqlx::PgPool,
    run_date: Option<NaiveDate>,
) -> anyhow::Result<Option<StoredReport>> {
    let row = match run_date {
        Some(d) => {
            sqlx::query_as::<_, RunRow>(
                "SELECT id, run_date, generated_at, channel, body \
                 FROM report_runs \
                 WHERE run_date = $1 \
                 ORDER BY generated_at DESC \
                 LIMIT 1",
            )
            .bind(d)
            .fetch_optional(pool)
            .await
            .context("select report_runs by date failed")?
        }
        None => {
            sqlx::query_as::<_, RunRow>(
                "SELECT id, run_date, generated_at, channel, body \
                 FROM report_runs \
                 ORDER BY run_date DESC, generated_at DESC \
                 LIMIT 1",
            )
            .fetch_optional(pool)
            .await
            .context("select latest report_runs failed")?
        }
    };

    let Some((id, run_date, generated_at, channel, body)) = row else {
        return Ok(None);
    };

    let items = load_items(pool, id).await?;
    Ok(Some(StoredReport {
        channel,
        body,
        report: Report {
            id,
            run_date,
            generated_at,
            items,
        },
    }))
}

async fn load_items(pool: &sqlx::PgPool, run_id: Uuid) -> anyhow::Result<Vec<ScoredRecommendation>> {
    let rows = sqlx::query_as::<_, (String, String, String, Option<i16>)>(
        "SELECT ticker, recommendation, score, rating \
         FROM report_items \
         WHERE run_id = $1 \
         ORDER BY position ASC",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
    .context("select report_items failed")?;

    Ok(rows
        .into_iter()
        .map(|(ticker, text, score, rating)| ScoredRecommendation {
            recommendation: Recommendation { ticker, text },
            score,
            rating: rating.and_then(|r| u8::try_from(r).ok()),
        })
        .collect())
}
