//! Scheduled refreshes

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::data::CellarData;

/// Running poll loop; stops when dropped
#[derive(Debug)]
pub struct PollingHandle {
    task: JoinHandle<()>,
}

impl PollingHandle {
    /// Stop polling
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl CellarData {
    /// Refresh every scan interval until the returned handle is dropped
    ///
    /// The first scheduled refresh happens one interval from now; callers
    /// run the initial refresh themselves.
    pub fn spawn_polling(self: &Arc<Self>) -> PollingHandle {
        let data = Arc::clone(self);
        let period = self.scan_interval();
        info!(interval = ?period, "Polling CellarTracker");

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Failures are logged and announced by refresh itself
                if let Err(err) = data.refresh().await {
                    debug!(error = %err, "Scheduled refresh failed");
                }
            }
        });

        PollingHandle { task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellar_client::testing::StaticInventory;
    use cellar_core::{BottleRecord, InventoryAggregator};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_polls_every_interval() {
        let source = Arc::new(StaticInventory::new(vec![BottleRecord::new()
            .with("iWine", 1)
            .with("Valuation", "10")]));
        let data = Arc::new(
            CellarData::new(source.clone(), InventoryAggregator::default())
                .with_scan_interval(Duration::from_secs(30)),
        );

        let handle = data.spawn_polling();
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(source.calls(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(data.total_bottles(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls(), 2);

        handle.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_survives_failures() {
        let source = Arc::new(StaticInventory::new(vec![]));
        source.set_failing(true);
        let data = Arc::new(CellarData::new(
            source.clone(),
            InventoryAggregator::default(),
        ));
        let mut events = data.subscribe();

        let _handle = data.spawn_polling();
        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert!(matches!(
            events.recv().await.unwrap(),
            crate::CellarEvent::RefreshFailed { .. }
        ));

        source.set_failing(false);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(source.calls(), 2);
        assert!(data.snapshot().is_some());
    }
}
