use anyhow::Context;
use sitscout_core::config::Settings;
use sitscout_core::llm::openrouter::OpenRouterClient;
use sitscout_core::llm::{prompts, ChatClient};
use std::time::Duration;

const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs every check, logs each result, and fails if any check failed.
pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let checks = [
        ("config", check_config(settings)),
        ("openrouter", check_openrouter(settings).await),
    ];

    let mut failed = Vec::new();
    for (name, result) in &checks {
        match result {
            Ok(()) => tracing::info!(check = name, "self-test passed"),
            Err(e) => {
                tracing::error!(check = name, error = %format!("{e:#}"), "self-test failed");
                failed.push(*name);
            }
        }
    }

    anyhow::ensure!(failed.is_empty(), "self-test failed: {}", failed.join(", "));
    tracing::info!("all self-tests passed");
    Ok(())
}

fn check_config(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_pipeline_ready()
}

async fn check_openrouter(settings: &Settings) -> anyhow::Result<()> {
    let client = OpenRouterClient::with_timeout(settings, CONNECTIVITY_TIMEOUT)?;
    let model = settings.require_fast_llm()?;
    let reply = client
        .complete(model, &prompts::connectivity_check())
        .await
        .context("OpenRouter connectivity check failed")?;
    tracing::debug!(provider = ?client.provider(), model, reply = %reply, "LLM replied");
    Ok(())
}
