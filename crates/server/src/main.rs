mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use leaveflow_core::config::{AppConfig, LoadOptions};
use leaveflow_workflow::SweepScheduler;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use leaveflow_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
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
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let health_task = health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
        app.config.scheduler.enabled,
        shutdown_rx.clone(),
    )
    .await?;

    let scheduler_task = if app.config.scheduler.enabled {
        Some(SweepScheduler::new(app.workflow.clone(), app.config.scheduler.clone()).spawn(shutdown_rx))
    } else {
        tracing::info!(
            event_name = "scheduler.disabled",
            correlation_id = "bootstrap",
            "escalation sweeps disabled by configuration"
        );
        None
    };

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        scheduler_enabled = app.config.scheduler.enabled,
        "leaveflow-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "leaveflow-server stopping"
    );

    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let drain = async {
        if let Some(task) = scheduler_task {
            let _ = task.await;
        }
        let _ = health_task.await;
    };
    if tokio::time::timeout(grace, drain).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = app.config.server.graceful_shutdown_secs,
            "background tasks did not stop within the grace period"
        );
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
