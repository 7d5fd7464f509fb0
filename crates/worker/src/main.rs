use anyhow::Context;
use clap::Parser;
use sitscout_core::config::{ReportChannel, Settings};
use sitscout_core::ingest::edgar::SecEdgarClient;
use sitscout_core::ingest::exa::ExaClient;
use sitscout_core::ingest::feeds::RssFeedSource;
use sitscout_core::ingest::yahoo::YahooFinanceClient;
use sitscout_core::llm::openrouter::OpenRouterClient;
use sitscout_core::pipeline::{Pipeline, PipelineDeps, PipelineOptions, PipelineOutcome};
use sitscout_core::report::{EmailSink, FileSink, PostgresSink, ReportSink};
use sitscout_core::resilience::{CallExecutor, RateLimiter, RetryPolicy};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod selftest;

// Yahoo has no published quota; stay well under what it tolerates from one client.
const MARKET_DATA_MAX_PER_SECOND: f64 = 2.0;

#[derive(Debug, Parser)]
#[command(name = "sitscout_worker")]
struct Args {
    /// Check configuration and LLM connectivity instead of running the pipeline.
    #[arg(long = "self-test", alias = "test")]
    self_test: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if args.self_test {
        return selftest::run(&settings).await.inspect_err(|e| {
            sentry_anyhow::capture_anyhow(e);
        });
    }

    if let Err(e) = settings.ensure_pipeline_ready() {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "configuration incomplete; not running");
        return Err(e);
    }

    let run_date = chrono::Utc::now().date_naive();

    let pool = match settings.database_url.as_deref() {
        Some(db_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .context("connect DATABASE_URL failed")?;
            sitscout_core::storage::migrate(&pool).await?;
            Some(pool)
        }
        None => None,
    };

    let mut lock_conn = match &pool {
        Some(pool) => {
            let mut conn = pool.acquire().await.context("acquire lock connection failed")?;
            let acquired =
                sitscout_core::storage::lock::try_acquire_run_date_lock(&mut conn, run_date)
                    .await?;
            if !acquired {
                tracing::warn!(%run_date, "run_date lock not acquired; another run in progress");
                return Ok(());
            }
            Some(conn)
        }
        None => None,
    };

    let result = run_pipeline(&settings, pool).await;

    if let Some(conn) = lock_conn.as_mut() {
        let _ = sitscout_core::storage::lock::release_run_date_lock(conn, run_date).await;
    }

    match result {
        Ok(PipelineOutcome::NothingToDo { reason }) => {
            tracing::info!(%run_date, reason, "nothing to report today");
            Ok(())
        }
        Ok(PipelineOutcome::Reported { report, delivered }) => {
            tracing::info!(
                %run_date,
                run_id = %report.id,
                items = report.items.len(),
                delivered,
                "daily run finished"
            );
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(%run_date, error = %format!("{err:#}"), "daily run failed");
            Err(err)
        }
    }
}

async fn run_pipeline(
    settings: &Settings,
    pool: Option<sqlx::PgPool>,
) -> anyhow::Result<PipelineOutcome> {
    let sink: Arc<dyn ReportSink> = match settings.report_channel {
        ReportChannel::Email => Arc::new(EmailSink::from_settings(settings)?),
        ReportChannel::File => Arc::new(FileSink::new(&settings.report_dir)),
        ReportChannel::Postgres => Arc::new(PostgresSink::new(
            pool.context("postgres report channel requires DATABASE_URL")?,
        )),
    };

    let yahoo = Arc::new(YahooFinanceClient::new()?);
    let deps = PipelineDeps {
        feeds: Arc::new(RssFeedSource::new()?),
        chat: Arc::new(OpenRouterClient::from_settings(settings)?),
        search: yahoo.clone(),
        market: yahoo,
        filings: Arc::new(SecEdgarClient::from_settings(settings)?),
        news: Arc::new(ExaClient::from_settings(settings)?),
        sink,
    };

    let llm_exec = CallExecutor::new(
        "openrouter",
        Arc::new(RateLimiter::new(settings.llm_max_per_second)),
        RetryPolicy::default(),
    );
    let data_exec = CallExecutor::new(
        "market_data",
        Arc::new(RateLimiter::new(MARKET_DATA_MAX_PER_SECOND)),
        RetryPolicy::default(),
    );

    let pipeline = Pipeline::new(
        deps,
        llm_exec,
        data_exec,
        PipelineOptions::from_settings(settings)?,
    );
    pipeline.run().await
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_self_test_flag_and_alias() {
        assert!(!Args::try_parse_from(["sitscout_worker"]).unwrap().self_test);
        assert!(Args::try_parse_from(["sitscout_worker", "--self-test"]).unwrap().self_test);
        assert!(Args::try_parse_from(["sitscout_worker", "--test"]).unwrap().self_test);
        assert!(Args::try_parse_from(["sitscout_worker", "--bogus"]).is_err());
    }
}
