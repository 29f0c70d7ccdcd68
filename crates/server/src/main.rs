mod bootstrap;
mod health;
mod http;
mod keepalive;

use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use paybot_core::config::{AppConfig, DeliveryMode, LoadOptions};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use paybot_core::config::LogFormat::*;

    // RUST_LOG wins when set so individual crates can be turned up
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_ascii_lowercase()));

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
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut routes = health::router(health::HealthState {
        csv_path: app.config.storage.csv_path.clone(),
        sessions: app.sessions.clone(),
        mode: app.mode,
    });
    if app.mode == DeliveryMode::Http {
        let signing_secret = app
            .config
            .slack
            .signing_secret
            .clone()
            .context("slack.signing_secret is required in HTTP mode")?;
        routes = routes.merge(http::router(http::SlackHttpState {
            ingress: app.ingress.clone(),
            signing_secret,
        }));
    }

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("could not bind {address}"))?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        delivery_mode = ?app.mode,
        "paybot-server listening"
    );

    let server = tokio::spawn(serve(listener, routes, shutdown_rx.clone()));
    let keepalive = keepalive::spawn(&app.config.keepalive, shutdown_rx.clone());
    let runner = app.socket_runner.map(|runner| {
        let shutdown = shutdown_signal(shutdown_rx.clone());
        tokio::spawn(async move { runner.start_with_shutdown(shutdown).await })
    });

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = app.config.server.graceful_shutdown_secs,
        "paybot-server stopping"
    );
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let ingress = app.ingress.clone();
    let drained = tokio::time::timeout(grace, async {
        if let Some(runner) = runner {
            if let Ok(Err(error)) = runner.await {
                tracing::warn!(error = %error, "socket mode runner ended with an error");
            }
        }
        if let Some(keepalive) = keepalive {
            let _ = keepalive.await;
        }
        let _ = server.await;
        ingress.drain().await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight work did not finish within the grace period"
        );
    }

    Ok(())
}

async fn serve(listener: tokio::net::TcpListener, routes: Router, shutdown: watch::Receiver<bool>) {
    if let Err(error) =
        axum::serve(listener, routes).with_graceful_shutdown(shutdown_signal(shutdown)).await
    {
        tracing::error!(
            event_name = "system.server.error",
            correlation_id = "shutdown",
            error = %error,
            "http server terminated unexpectedly"
        );
    }
}

async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
