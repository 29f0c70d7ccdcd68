//! Periodic self-ping so free-tier hosts do not idle the process out.

use std::time::Duration;

use paybot_core::config::KeepAliveConfig;
use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// The URL pinged for a configured base URL.
pub fn ping_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/health") {
        base.to_owned()
    } else {
        format!("{base}/health")
    }
}

/// Starts the pinger when `keepalive.url` is set. The task stops once `shutdown` flips.
pub fn spawn(config: &KeepAliveConfig, mut shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
    let url = ping_url(config.url.as_deref()?);
    let interval = Duration::from_secs(config.interval_secs);
    let client = match Client::builder().timeout(PING_TIMEOUT).build() {
        Ok(client) => client,
        Err(error) => {
            warn!(event_name = "system.keepalive.disabled", error = %error, "keep-alive client failed");
            return None;
        }
    };

    info!(
        event_name = "system.keepalive.start",
        url = %url,
        interval_secs = config.interval_secs,
        "keep-alive pinger started"
    );
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick fires immediately; the server has only just bound
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => ping(&client, &url).await,
                _ = shutdown.changed() => break,
            }
        }
        debug!(event_name = "system.keepalive.stop", "keep-alive pinger stopped");
    }))
}

async fn ping(client: &Client, url: &str) {
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => {
            debug!(event_name = "system.keepalive.ping", url, status = %response.status(), "ping ok");
        }
        Ok(response) => {
            warn!(event_name = "system.keepalive.ping", url, status = %response.status(), "ping returned an error status");
        }
        Err(error) => {
            warn!(event_name = "system.keepalive.ping", url, error = %error, "ping failed");
        }
    }
}
