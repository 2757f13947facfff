//! Per-account inventory state

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use cellar_client::InventorySource;
use cellar_config::{
    CellarConfig, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_SCAN_INTERVAL_SECS, MIN_SCAN_INTERVAL_SECS,
};
use cellar_core::{Aggregation, AnnotatedBottle, InventoryAggregator, WineGroup};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, instrument, warn};

use crate::error::{FailureKind, RefreshError, SetupError};

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// One successful refresh
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub aggregation: Aggregation,
    pub refreshed_at: DateTime<Utc>,
    /// Number of successful refreshes up to and including this one
    pub generation: u64,
}

/// Announcements sent after every refresh attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CellarEvent {
    Updated { generation: u64 },
    RefreshFailed { reason: String },
}

/// Inventory state for one account
pub struct CellarData {
    source: Arc<dyn InventorySource>,
    aggregator: InventoryAggregator,
    scan_interval: Duration,
    fetch_timeout: Duration,
    /// Held for the whole fetch-then-aggregate sequence
    refresh_lock: Mutex<()>,
    /// Completed refresh attempts, successful or not
    attempts: AtomicU64,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Kind and reason of the most recent attempt, if it failed
    last_error: RwLock<Option<(FailureKind, String)>>,
    events: broadcast::Sender<CellarEvent>,
}

/// Shared handle to an account's state
pub type SharedCellarData = Arc<CellarData>;

impl CellarData {
    /// Create state for a source with default intervals
    pub fn new(source: Arc<dyn InventorySource>, aggregator: InventoryAggregator) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            aggregator,
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            refresh_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
            snapshot: RwLock::new(None),
            last_error: RwLock::new(None),
            events,
        }
    }

    /// Create state using the intervals and key style of an account config
    pub fn from_config(source: Arc<dyn InventorySource>, config: &CellarConfig) -> Self {
        Self::new(source, InventoryAggregator::new(config.wine_key_style()))
            .with_scan_interval(config.scan_interval())
            .with_fetch_timeout(config.fetch_timeout())
    }

    /// Set the poll interval; anything below the minimum is raised to it
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval.max(Duration::from_secs(MIN_SCAN_INTERVAL_SECS));
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Fetch the inventory and rebuild the aggregation
    ///
    /// On failure the previous snapshot stays current.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let seen = self.attempts.load(Ordering::SeqCst);
        let _guard = self.refresh_lock.lock().await;

        if self.attempts.load(Ordering::SeqCst) != seen {
            if let Some((kind, reason)) = read(&self.last_error).clone() {
                return Err(RefreshError::Joined { kind, reason });
            }
            if let Some(snapshot) = self.snapshot() {
                debug!(generation = snapshot.generation, "Joined refresh already in flight");
                return Ok(snapshot);
            }
        }

        debug!("Starting update from CellarTracker");
        let fetched =
            tokio::time::timeout(self.fetch_timeout, self.source.fetch_inventory()).await;
        let inventory = match fetched {
            Ok(Ok(inventory)) => inventory,
            Ok(Err(err)) => return Err(self.record_failure(RefreshError::Fetch(err))),
            Err(_) => return Err(self.record_failure(RefreshError::Timeout(self.fetch_timeout))),
        };

        if inventory.is_empty() {
            warn!("Empty inventory received from CellarTracker");
        }

        let aggregation = self.aggregator.aggregate(&inventory);
        let generation = self.snapshot().map_or(0, |s| s.generation) + 1;
        let snapshot = Arc::new(Snapshot {
            aggregation,
            refreshed_at: Utc::now(),
            generation,
        });

        *write(&self.snapshot) = Some(Arc::clone(&snapshot));
        *write(&self.last_error) = None;
        self.attempts.fetch_add(1, Ordering::SeqCst);

        debug!(
            generation,
            total_bottles = snapshot.aggregation.totals.total_bottles,
            "CellarTracker data updated successfully"
        );
        // No subscribers is fine
        let _ = self.events.send(CellarEvent::Updated { generation });

        Ok(snapshot)
    }

    fn record_failure(&self, err: RefreshError) -> RefreshError {
        error!(error = %err, "Error fetching CellarTracker data");
        let reason = err.to_string();
        *write(&self.last_error) = Some((err.kind(), reason.clone()));
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.send(CellarEvent::RefreshFailed { reason });
        err
    }

    /// Fetch once to check that the account is reachable
    pub async fn validate(&self) -> Result<(), SetupError> {
        self.refresh().await.map(|_| ()).map_err(SetupError::from)
    }

    /// Latest successful refresh, if any
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        read(&self.snapshot).clone()
    }

    /// Reason the latest attempt failed, if it did
    pub fn last_error(&self) -> Option<String> {
        read(&self.last_error)
            .as_ref()
            .map(|(_, reason)| reason.clone())
    }

    pub fn total_bottles(&self) -> usize {
        self.snapshot()
            .map_or(0, |s| s.aggregation.totals.total_bottles)
    }

    pub fn total_value(&self) -> f64 {
        self.snapshot()
            .map_or(0.0, |s| s.aggregation.totals.total_value)
    }

    /// All wine groups of the latest snapshot
    pub fn readings(&self) -> IndexMap<String, WineGroup> {
        self.snapshot()
            .map(|s| s.aggregation.groups.clone())
            .unwrap_or_default()
    }

    /// One wine group of the latest snapshot
    pub fn reading(&self, key: &str) -> Option<WineGroup> {
        self.snapshot()?.aggregation.group(key).cloned()
    }

    /// One bottle of the latest snapshot
    pub fn bottle(&self, unique_bottle_id: &str) -> Option<AnnotatedBottle> {
        self.snapshot()?.aggregation.bottle(unique_bottle_id).cloned()
    }

    /// Receive an event after every refresh attempt
    pub fn subscribe(&self) -> broadcast::Receiver<CellarEvent> {
        self.events.subscribe()
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
