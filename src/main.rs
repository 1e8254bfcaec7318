use anyhow::{Context, Result};
use clap::Parser;
use jobbot::core::ConfigManager;
use jobbot::{handle_command, BotCli, BotContext};
use std::fs::OpenOptions;
use tracing::info;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = BotCli::parse();

    let config = ConfigManager::load()?;
    std::fs::create_dir_all(&config.environment.logs_path)
        .context("Failed to create logs directory")?;

    // Initialize logging first
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.environment.logs_path.join("jobbot.log"))
        .expect("Failed to open log file");

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false),
        )
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jobbot=info,rocket=warn")),
        )
        .init();

    info!("Starting JobBot {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Environment: {}",
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string())
    );
    info!("Data: {}", config.environment.data_path.display());

    let context = BotContext::assemble(config).await?;
    handle_command(cli, context).await
}
