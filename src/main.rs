use std::sync::Arc;
use anyhow::{Result, Context};
use crate::bluesky::BlueskyApiClient;
use crate::config::load_config;
use crate::polling::PollingService;
use crate::webhook::DiscordWebhookClient;
use tracing_subscriber::EnvFilter;
use tracing::{info, error};

mod at_uri;
mod bluesky;
mod cache;
mod config;
mod feed;
mod models;
mod polling;
mod webhook;

#[cfg(test)]
mod tests;

#[tokio::main]
async fn main() -> Result<()> {
    // Load Configuration
    let app_settings = load_config()
        .with_context(|| "Failed to load configuration")?;

    // RUST_LOG wins over LOG_LEVEL when both are set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&app_settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Bluesky webhook forwarder started.");
    info!("Using log level: {}", app_settings.log_level);

    let bsky_client = BlueskyApiClient::new(&app_settings)
        .with_context(|| "Failed to create Bluesky client")?;

    // Authentication failure is the one fatal runtime error
    match bsky_client.login(&app_settings.username, &app_settings.password).await {
        Ok(session) => info!("Logged in as {}", session.handle),
        Err(e) => {
            error!("Failed to authenticate: {}", e);
            std::process::exit(1);
        }
    }

    let webhook_client = DiscordWebhookClient::new(&app_settings)
        .with_context(|| "Failed to create Discord webhook client")?;

    let config_arc = Arc::new(app_settings);
    let polling_service = PollingService::new(
        Arc::new(bsky_client),
        Arc::new(webhook_client),
        config_arc.clone(),
    )?;

    info!("Starting polling service with interval of {} seconds...", config_arc.poll_interval);

    // Runs until Ctrl-C
    polling_service.start_polling().await?;

    Ok(())
}
