//! CellarTracker sensor service
//!
//! Main entry point: loads the configuration, checks the account, keeps the
//! inventory refreshed and serves the sensor states over HTTP.

mod api;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cellar_client::CellarTrackerClient;
use cellar_config::{CellarConfig, Config};
use cellar_coordinator::CellarData;
use cellar_sensor::{SensorPlatform, StateStore};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable naming the config directory
const CONFIG_DIR_ENV: &str = "CELLAR_CONFIG_DIR";

/// Used when neither an argument nor the environment names one
const DEFAULT_CONFIG_DIR: &str = "./config";

/// How much longer a request may run than the fetch timeout around it
const REQUEST_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

fn config_dir() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR))
}

/// Client for the configured account
///
/// The request timeout outlasts the fetch timeout, so a slow CellarTracker
/// is reported as a timeout rather than as a failed request.
fn build_client(account: &CellarConfig) -> Result<CellarTrackerClient> {
    let mut client = CellarTrackerClient::new(account.username.as_str(), account.password.as_str())
        .context("building the CellarTracker client")?
        .with_request_timeout(account.fetch_timeout() + REQUEST_TIMEOUT_GRACE);
    if let Some(base_url) = &account.base_url {
        client = client.with_base_url(base_url);
    }
    Ok(client)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_dir = config_dir();
    info!(config_dir = %config_dir.display(), "Starting CellarTracker sensors");

    let config = Config::load(&config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;
    let account = &config.cellar_tracker;

    let client = build_client(account)?;
    let data = Arc::new(CellarData::from_config(Arc::new(client), account));

    // One fetch up front: bad credentials abort startup, and the snapshot
    // it produces seeds the sensors
    if let Err(err) = data.validate().await {
        error!(error = %err, "Unable to set up CellarTracker");
        return Err(err).context("validating the CellarTracker account");
    }

    let states = Arc::new(StateStore::new());
    let platform = Arc::new(SensorPlatform::new(Arc::clone(&states), account.currency.as_str()));
    let sensors = Arc::clone(&platform).run(Arc::clone(&data));
    let polling = data.spawn_polling();

    let state = api::AppState {
        data: Arc::clone(&data),
        states,
        platform,
    };
    let addr = config.http.bind_addr();

    info!(
        total_bottles = data.total_bottles(),
        total_value = data.total_value(),
        "CellarTracker sensors are running"
    );

    tokio::select! {
        result = api::start_server(state, &addr) => {
            result.with_context(|| format!("serving the API on {addr}"))?;
            warn!("API server stopped");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            info!("Shutting down...");
        }
    }

    polling.stop();
    sensors.abort();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellar_config::MAX_FETCH_TIMEOUT_SECS;

    #[test]
    fn test_request_timeout_outlasts_fetch_timeout() {
        for fetch_timeout in [1, 10, 30, 45, MAX_FETCH_TIMEOUT_SECS, 600] {
            let mut account = CellarConfig::new("me", "pw");
            account.fetch_timeout = fetch_timeout;
            let client = build_client(&account).unwrap();
            assert!(client.request_timeout() > account.fetch_timeout());
        }
    }

    #[test]
    fn test_client_uses_configured_base_url() {
        let mut account = CellarConfig::new("me", "pw");
        account.base_url = Some("http://127.0.0.1:8081/".into());
        let client = build_client(&account).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8081");
    }
}
