mod bootstrap;
mod health;

use anyhow::Result;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use yaruki_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use yaruki_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.trim().to_ascii_lowercase()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.connection_status.clone(),
    )
    .await?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(error) = wait_for_shutdown().await {
            tracing::error!(
                event_name = "system.server.signal_error",
                correlation_id = "shutdown",
                error = %error,
                "signal listener failed; shutting down"
            );
        }
        let _ = shutdown_tx.send(true);
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "yaruki-server started"
    );
    app.slack_runner.start(shutdown_rx.clone()).await;

    if !*shutdown_rx.borrow() {
        tracing::warn!(
            event_name = "system.server.degraded",
            correlation_id = "bootstrap",
            "slack socket gave up reconnecting; serving degraded health until shutdown"
        );
        let _ = shutdown_rx.changed().await;
    }
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "yaruki-server stopping"
    );

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
