mod api;
mod bootstrap;
mod health;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use propmatch_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use propmatch_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let maintenance = app.spawn_maintenance();

    let api_state =
        api::ApiState { runtime: app.runtime.clone(), inventory: app.inventory.clone() };
    let router = api::router(api_state).merge(health::router(health::HealthState {
        db_pool: app.db_pool.clone(),
        inventory: app.inventory.clone(),
    }));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "propmatch-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, router)
        .with_graceful_shutdown({
            let stop = stop.clone();
            async move { stop.notified().await }
        })
        .into_future();
    let mut server = std::pin::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = wait_for_shutdown() => {
            stop.notify_one();
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(
                    event_name = "system.server.drain_timeout",
                    correlation_id = "shutdown",
                    grace_secs = grace.as_secs(),
                    "in-flight requests abandoned after grace period"
                ),
            }
        }
    }

    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "propmatch-server stopping");
    for handle in maintenance {
        handle.abort();
    }
    app.db_pool.close().await;
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(event_name = "system.server.signal_error", error = %error, "ctrl-c handler failed");
    }
}
