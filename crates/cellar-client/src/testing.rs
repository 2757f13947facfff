//! In-memory inventory source for tests

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use cellar_core::BottleRecord;

use crate::error::{ClientError, ClientResult};
use crate::InventorySource;

/// Serves a fixed record list, optionally slowly or with a failure
#[derive(Debug, Default)]
pub struct StaticInventory {
    records: RwLock<Vec<BottleRecord>>,
    delay_ms: AtomicU64,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticInventory {
    pub fn new(records: Vec<BottleRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Default::default()
        }
    }

    /// Sleep this long before answering each fetch
    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    /// Change the delay applied to later fetches
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Replace the records served by later fetches
    pub fn set_records(&self, records: Vec<BottleRecord>) {
        *self.records.write().unwrap_or_else(|e| e.into_inner()) = records;
    }

    /// Make later fetches fail with [`ClientError::Authentication`]
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventorySource for StaticInventory {
    async fn fetch_inventory(&self) -> ClientResult<Vec<BottleRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::Authentication);
        }
        Ok(self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}
