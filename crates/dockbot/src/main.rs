mod config;
mod runtime;
mod telegram;

use std::sync::Arc;

use anyhow::{Context, Result};
use panel::gate::AccessGate;
use panel::nav::Navigator;
use tracing::{error, info, warn};

use crate::config::{BotConfig, LogFormat};
use crate::telegram::{Poller, TelegramClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Phase 1: basic thread-local tracing so config loading can log
    let basic_tracing = init_tracing_basic();

    info!("Starting dockbot v{}", env!("CARGO_PKG_VERSION"));

    let config = BotConfig::load().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    // Phase 2: global subscriber honouring the configured level and format
    drop(basic_tracing);
    init_tracing_from_config(&config);

    info!(
        mode = ?config.runtime.mode,
        allowed_users = config.telegram.allowed_users.len(),
        "Configuration loaded"
    );

    let backend = runtime::connect(&config).await?;
    let gate = AccessGate::new(config.telegram.allowed_users.iter().copied());
    if gate.is_open() {
        warn!("No allowed users configured, every Telegram user can control containers");
    }
    let navigator = Navigator::new(backend, gate).with_log_limits(config.logs.tail_lines, config.logs.max_bytes);

    let api = TelegramClient::new(
        &config.telegram.api_base,
        &config.telegram.token,
        config.telegram.poll_timeout_secs,
    )
    .context("Failed to create Telegram client")?;
    let me = api.get_me().await.context("Telegram API is not reachable")?;
    info!(bot_id = me.id, username = me.username.as_deref().unwrap_or("?"), "Connected to Telegram");

    Poller::new(Arc::new(api), Arc::new(navigator))
        .run(shutdown_signal())
        .await;

    info!("dockbot shut down");
    Ok(())
}

fn init_tracing_basic() -> tracing::subscriber::DefaultGuard {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dockbot=debug"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_default(subscriber)
}

fn init_tracing_from_config(config: &BotConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            let layer = fmt::layer().json().with_target(true).with_thread_ids(true);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, shutting down"),
        _ = terminate => warn!("Received SIGTERM, shutting down"),
    }
}
