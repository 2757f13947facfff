//! Sensor state storage
//!
//! The [`StateStore`] holds the current state of every sensor entity and
//! broadcasts a [`StateChanged`] event whenever one of them changes.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, instrument, trace};

use crate::{EntityId, SensorState, SensorValue};

/// Capacity of the state change channel
const STATE_CHANNEL_CAPACITY: usize = 256;

/// Sent when an entity's state is written or removed
#[derive(Debug, Clone, PartialEq)]
pub struct StateChanged {
    pub entity_id: EntityId,
    pub old_state: Option<SensorState>,
    /// `None` when the entity was removed
    pub new_state: Option<SensorState>,
}

/// Current state of all sensor entities
pub struct StateStore {
    /// All entity states keyed by entity_id string
    states: DashMap<String, SensorState>,
    events: broadcast::Sender<StateChanged>,
}

impl StateStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            states: DashMap::new(),
            events,
        }
    }

    /// Set the state of an entity
    ///
    /// Writing a value identical to the current one is a no-op. Otherwise
    /// `last_changed` only moves when the state value itself changes, and a
    /// [`StateChanged`] event is sent.
    #[instrument(skip(self, value), fields(entity_id = %entity_id))]
    pub fn set(&self, entity_id: EntityId, value: SensorValue) -> SensorState {
        let key = entity_id.to_string();
        let old_state = self.get(&key);

        if let Some(existing) = &old_state {
            if existing.matches(&value) {
                trace!("State unchanged");
                return existing.clone();
            }
        }

        let new_state = match &old_state {
            Some(existing) => existing.with_update(value),
            None => SensorState::new(entity_id.clone(), value),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map_or(true, |s| s.state != new_state.state),
            "Setting entity state"
        );

        self.states.insert(key, new_state.clone());

        // No subscribers is fine
        let _ = self.events.send(StateChanged {
            entity_id,
            old_state,
            new_state: Some(new_state.clone()),
        });

        new_state
    }

    /// Get the current state of an entity
    pub fn get(&self, entity_id: &str) -> Option<SensorState> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value, or None if the entity doesn't exist
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// All states, ordered by entity id
    pub fn all(&self) -> Vec<SensorState> {
        let mut states: Vec<SensorState> =
            self.states.iter().map(|r| r.value().clone()).collect();
        states.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        states
    }

    /// All entity ids, sorted
    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Remove an entity's state
    #[instrument(skip(self), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId) -> Option<SensorState> {
        let old_state = self.states.remove(&entity_id.to_string()).map(|(_, s)| s);

        if let Some(state) = &old_state {
            trace!("Removing entity state");
            let _ = self.events.send(StateChanged {
                entity_id: entity_id.clone(),
                old_state: Some(state.clone()),
                new_state: None,
            });
        }

        old_state
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Receive every state change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StateChanged> {
        self.events.subscribe()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a state store
pub type SharedStateStore = Arc<StateStore>;

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(object_id: &str) -> EntityId {
        EntityId::new("sensor", object_id).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = StateStore::new();
        let mut rx = store.subscribe();

        let state = store.set(entity("total_bottles"), SensorValue::new("12"));
        assert_eq!(state.state, "12");
        assert_eq!(store.get_state("sensor.total_bottles").as_deref(), Some("12"));
        assert_eq!(store.len(), 1);

        let event = rx.recv().await.unwrap();
        assert!(event.old_state.is_none());
        assert_eq!(event.new_state.unwrap().state, "12");
    }

    #[tokio::test]
    async fn test_identical_write_sends_nothing() {
        let store = StateStore::new();
        store.set(entity("total_bottles"), SensorValue::new("12"));
        let mut rx = store.subscribe();

        store.set(entity("total_bottles"), SensorValue::new("12"));
        store.set(entity("total_bottles"), SensorValue::new("13"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.old_state.unwrap().state, "12");
        assert_eq!(event.new_state.unwrap().state, "13");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = StateStore::new();
        store.set(entity("total_value"), SensorValue::new("10.00"));
        let mut rx = store.subscribe();

        let removed = store.remove(&entity("total_value")).unwrap();
        assert_eq!(removed.state, "10.00");
        assert!(store.is_empty());
        assert!(store.remove(&entity("total_value")).is_none());

        let event = rx.recv().await.unwrap();
        assert!(event.new_state.is_none());
    }

    #[test]
    fn test_all_is_sorted() {
        let store = StateStore::new();
        store.set(entity("b"), SensorValue::new("2"));
        store.set(entity("a"), SensorValue::new("1"));
        store.set(entity("c"), SensorValue::new("3"));

        let ids: Vec<String> = store.all().iter().map(|s| s.entity_id.to_string()).collect();
        assert_eq!(ids, vec!["sensor.a", "sensor.b", "sensor.c"]);
        assert_eq!(store.entity_ids(), ids);
    }
}
