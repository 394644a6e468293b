use std::sync::Arc;

use anyhow::Context;
use live_notify::api::{ApiServer, AppState};
use live_notify::config::{AppConfig, TriggerMode};
use live_notify::database::{self, DedupStore, SqlxKvStore};
use live_notify::monitor::{StatusEngine, SystemClock};
use live_notify::notification::DiscordChannel;
use live_notify::scheduler::{self, IntervalScheduler};
use live_notify::logging;
use live_platform::TikTokClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let log_level = std::env::var("LOG_LEVEL").ok();
    let (logging_config, _guard) = logging::init_logging(&log_dir, log_level.as_deref())?;
    logging_config.install_panic_hook();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    info!(
        unique_id = %config.unique_id,
        transport = config.transport.name(),
        trigger = ?config.trigger,
        filter = logging_config.filter(),
        "Starting live-notify"
    );

    let shutdown = CancellationToken::new();
    logging_config.start_retention_cleanup(shutdown.clone());

    // Initialize database
    let pool = database::init_pool(&config.database_url)
        .await
        .context("failed to open database")?;
    database::run_migrations(&pool).await?;
    let store = SqlxKvStore::new(pool, config.unique_id.clone());
    info!(namespace = store.namespace(), "Dedup store ready");

    let transport = TikTokClient::new(
        &config.unique_id,
        config.transport.clone(),
        config.transport_timeout,
    )?
    .with_presence_interval(config.presence_interval);
    let channel = DiscordChannel::new(config.discord.clone())?;

    let engine = scheduler::share(StatusEngine::new(
        Arc::new(transport),
        Arc::new(channel),
        DedupStore::new(Arc::new(store)),
        Arc::new(SystemClock),
        config.engine.clone(),
    ));

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
            shutdown.cancel();
        }
    });

    let result = match config.trigger {
        TriggerMode::Interval => {
            IntervalScheduler::new(engine, config.poll_interval)
                .run(shutdown.clone())
                .await
        }
        TriggerMode::Http => {
            ApiServer::new(config.api.clone(), AppState::new(engine))
                .with_cancel_token(shutdown.clone())
                .run()
                .await
        }
    };

    shutdown.cancel();
    result?;

    info!("live-notify stopped");
    Ok(())
}
