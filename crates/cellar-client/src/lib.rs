//! CellarTracker inventory client
//!
//! Downloads a user's inventory from the CellarTracker export endpoint and
//! parses it into [`BottleRecord`]s. The coordinator only sees the
//! [`InventorySource`] trait, so tests can swap in the in-memory source
//! from the `testing` module, built with the `testing` feature.

mod client;
mod error;
mod export;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{CellarTrackerClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ClientError, ClientResult};
pub use export::parse_inventory;

use async_trait::async_trait;
use cellar_core::BottleRecord;

/// Something that can produce the current inventory
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Fetch the full inventory, one record per bottle
    async fn fetch_inventory(&self) -> ClientResult<Vec<BottleRecord>>;
}
