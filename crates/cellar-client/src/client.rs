//! HTTP client for the CellarTracker export endpoint

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use cellar_core::BottleRecord;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{ClientError, ClientResult};
use crate::export::parse_inventory;
use crate::InventorySource;

/// Public CellarTracker site
pub const DEFAULT_BASE_URL: &str = "https://www.cellartracker.com";

/// Per-request ceiling used unless [`CellarTrackerClient::with_request_timeout`] says otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one CellarTracker account
#[derive(Clone)]
pub struct CellarTrackerClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    username: String,
    password: String,
}

impl CellarTrackerClient {
    /// Create a client for the public site
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Point the client at another host
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Give up on a request after `timeout`
    ///
    /// Keep this above any timeout the caller wraps around the fetch, so
    /// that the caller's timeout is the one that fires.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Download and parse the inventory table
    #[instrument(skip(self), fields(username = %self.username))]
    pub async fn get_inventory(&self) -> ClientResult<Vec<BottleRecord>> {
        let url = format!("{}/xlquery.asp", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .query(&[
                ("User", self.username.as_str()),
                ("Password", self.password.as_str()),
                ("Format", "tab"),
                ("Table", "Inventory"),
                ("Location", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        // The export is served as Windows-1252 regardless of headers
        let bytes = response.bytes().await?;
        let (body, _, had_errors) = encoding_rs::WINDOWS_1252.decode(&bytes);
        if had_errors {
            debug!("Inventory export contained undecodable bytes");
        }

        let records = parse_inventory(&body)?;
        debug!(records = records.len(), "Downloaded inventory");
        Ok(records)
    }
}

#[async_trait]
impl InventorySource for CellarTrackerClient {
    async fn fetch_inventory(&self) -> ClientResult<Vec<BottleRecord>> {
        self.get_inventory().await
    }
}

impl fmt::Debug for CellarTrackerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellarTrackerClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
