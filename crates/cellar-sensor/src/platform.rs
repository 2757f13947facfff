//! Keeps sensor states in step with the coordinator

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use cellar_coordinator::{CellarEvent, SharedCellarData, Snapshot};
use indexmap::IndexMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::sensor::Sensor;
use crate::store::SharedStateStore;
use crate::EntityId;

/// A sensor that has been given its ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSensor {
    pub unique_id: String,
    pub entity_id: EntityId,
}

/// Outcome of one [`SensorPlatform::sync`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Sensors registered by this sync
    pub added: usize,
    /// Registered sensors whose data is missing from the snapshot
    pub unavailable: usize,
    /// The snapshot was older than one already synced and was ignored
    pub stale: bool,
}

#[derive(Default)]
struct Registry {
    sensors: IndexMap<Sensor, RegisteredSensor>,
    unique_ids: HashSet<String>,
    entity_ids: HashSet<EntityId>,
    /// Generation of the newest snapshot written to the store
    synced_generation: Option<u64>,
}

impl Registry {
    /// Give `sensor` ids not used by any other sensor
    fn register(&mut self, sensor: Sensor) -> Option<RegisteredSensor> {
        let base_entity_id = match sensor.entity_id() {
            Ok(id) => id,
            Err(err) => {
                warn!(?sensor, error = %err, "Skipping sensor without a valid entity id");
                return None;
            }
        };
        let base_unique_id = sensor.unique_id();

        let mut unique_id = base_unique_id.clone();
        let mut entity_id = base_entity_id.clone();
        let mut suffix = 2;
        while self.unique_ids.contains(&unique_id) || self.entity_ids.contains(&entity_id) {
            unique_id = format!("{base_unique_id}_{suffix}");
            entity_id = base_entity_id.with_suffix(suffix);
            suffix += 1;
        }

        let registered = RegisteredSensor {
            unique_id,
            entity_id,
        };
        self.unique_ids.insert(registered.unique_id.clone());
        self.entity_ids.insert(registered.entity_id.clone());
        self.sensors.insert(sensor, registered.clone());
        Some(registered)
    }
}

/// Registers sensors for everything in a snapshot and writes their states
///
/// Sensors are never removed. A wine or bottle that disappears upstream
/// keeps its entity, reported as unavailable until it comes back.
pub struct SensorPlatform {
    store: SharedStateStore,
    registry: Mutex<Registry>,
}

impl SensorPlatform {
    /// Create a platform with the two cellar-wide sensors registered
    pub fn new(store: SharedStateStore, currency: impl Into<String>) -> Self {
        let mut registry = Registry::default();
        registry.register(Sensor::TotalBottles);
        registry.register(Sensor::TotalValue {
            currency: currency.into(),
        });
        Self {
            store,
            registry: Mutex::new(registry),
        }
    }

    pub fn store(&self) -> &SharedStateStore {
        &self.store
    }

    /// Every registered sensor, in registration order
    pub fn sensors(&self) -> Vec<(Sensor, RegisteredSensor)> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sensors
            .iter()
            .map(|(sensor, registered)| (sensor.clone(), registered.clone()))
            .collect()
    }

    /// Register sensors for new wines and bottles, then render every sensor
    ///
    /// A snapshot older than the last one synced is ignored, so a slow
    /// caller cannot roll the states back.
    pub fn sync(&self, snapshot: &Snapshot) -> SyncReport {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = SyncReport::default();

        if let Some(synced) = registry.synced_generation {
            if snapshot.generation < synced {
                debug!(
                    generation = snapshot.generation,
                    synced, "Ignoring snapshot older than the synced one"
                );
                report.stale = true;
                return report;
            }
        }
        registry.synced_generation = Some(snapshot.generation);

        let discovered = snapshot
            .aggregation
            .groups
            .keys()
            .map(|key| Sensor::Wine { key: key.clone() })
            .chain(snapshot.aggregation.bottles.keys().map(|id| Sensor::Bottle {
                unique_bottle_id: id.clone(),
            }));
        for sensor in discovered {
            if registry.sensors.contains_key(&sensor) {
                continue;
            }
            if let Some(registered) = registry.register(sensor) {
                debug!(entity_id = %registered.entity_id, "Registered sensor");
                report.added += 1;
            }
        }

        for (sensor, registered) in &registry.sensors {
            let value = sensor.render(snapshot);
            if !value.available {
                report.unavailable += 1;
            }
            self.store.set(registered.entity_id.clone(), value);
        }

        debug!(
            generation = snapshot.generation,
            added = report.added,
            unavailable = report.unavailable,
            "Synced sensors"
        );
        report
    }

    /// Sync now and after every successful refresh of `data`
    pub fn run(self: Arc<Self>, data: SharedCellarData) -> JoinHandle<()> {
        let mut events = data.subscribe();
        if let Some(snapshot) = data.snapshot() {
            self.sync(&snapshot);
        }

        tokio::spawn(async move {
            info!("Sensor platform started");
            loop {
                match events.recv().await {
                    Ok(CellarEvent::Updated { .. }) | Err(RecvError::Lagged(_)) => {
                        if let Some(snapshot) = data.snapshot() {
                            self.sync(&snapshot);
                        }
                    }
                    Ok(CellarEvent::RefreshFailed { reason }) => {
                        debug!(%reason, "Keeping sensor states after failed refresh");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
