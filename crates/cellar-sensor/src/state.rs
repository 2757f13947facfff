//! State of a sensor entity

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::EntityId;

/// State value of a sensor whose data is gone
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State value of a sensor whose data has no usable value
pub const STATE_UNKNOWN: &str = "unknown";

/// Attribute map, in the order the sensor produced it
pub type Attributes = IndexMap<String, Value>;

/// What a sensor reports for one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SensorValue {
    pub state: String,
    pub attributes: Attributes,
    pub unit_of_measurement: Option<String>,
    pub icon: Option<String>,
    pub available: bool,
}

impl SensorValue {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: Attributes::new(),
            unit_of_measurement: None,
            icon: None,
            available: true,
        }
    }

    /// A value for a sensor whose data vanished from the snapshot
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(STATE_UNAVAILABLE)
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// The state of a sensor entity at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorState {
    pub entity_id: EntityId,

    /// The state value (e.g. "12", "2015 Margaux", "unavailable")
    pub state: String,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    pub available: bool,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When anything about the state last changed
    pub last_updated: DateTime<Utc>,
}

impl SensorState {
    pub fn new(entity_id: EntityId, value: SensorValue) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: value.state,
            attributes: value.attributes,
            unit_of_measurement: value.unit_of_measurement,
            icon: value.icon,
            available: value.available,
            last_changed: now,
            last_updated: now,
        }
    }

    /// Create an updated state, preserving last_changed if the state value is the same
    pub fn with_update(&self, value: SensorValue) -> Self {
        let now = Utc::now();
        let state_changed = self.state != value.state;

        Self {
            entity_id: self.entity_id.clone(),
            state: value.state,
            attributes: value.attributes,
            unit_of_measurement: value.unit_of_measurement,
            icon: value.icon,
            available: value.available,
            last_changed: if state_changed {
                now
            } else {
                self.last_changed
            },
            last_updated: now,
        }
    }

    /// Whether applying `value` would leave this state as it is
    pub fn matches(&self, value: &SensorValue) -> bool {
        self.state == value.state
            && self.attributes == value.attributes
            && self.unit_of_measurement == value.unit_of_measurement
            && self.icon == value.icon
            && self.available == value.available
    }

    pub fn is_unavailable(&self) -> bool {
        !self.available
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for SensorState {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
            && self.available == other.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity() -> EntityId {
        "sensor.cellar_tracker_total_bottles".parse().unwrap()
    }

    #[test]
    fn test_with_update_keeps_last_changed_for_same_value() {
        let first = SensorState::new(entity(), SensorValue::new("12"));
        let mut attributes = Attributes::new();
        attributes.insert("note".to_string(), json!("restocked"));

        let second = first.with_update(SensorValue::new("12").with_attributes(attributes));
        assert_eq!(second.last_changed, first.last_changed);
        assert!(second.last_updated >= first.last_updated);
        assert_eq!(second.attribute::<String>("note").as_deref(), Some("restocked"));

        let third = second.with_update(SensorValue::new("13"));
        assert!(third.last_changed >= second.last_changed);
        assert_eq!(third.last_changed, third.last_updated);
    }

    #[test]
    fn test_unavailable_value() {
        let state = SensorState::new(entity(), SensorValue::unavailable().with_icon("mdi:counter"));
        assert!(state.is_unavailable());
        assert_eq!(state.state, STATE_UNAVAILABLE);
        assert_eq!(state.icon.as_deref(), Some("mdi:counter"));
    }

    #[test]
    fn test_matches() {
        let value = SensorValue::new("3").with_unit("bottles");
        let state = SensorState::new(entity(), value.clone());
        assert!(state.matches(&value));
        assert!(!state.matches(&SensorValue::new("3")));
        assert!(!state.matches(&SensorValue::new("4").with_unit("bottles")));
    }

    #[test]
    fn test_serialize_omits_missing_unit() {
        let state = SensorState::new(entity(), SensorValue::new("3"));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["entity_id"], "sensor.cellar_tracker_total_bottles");
        assert_eq!(json["state"], "3");
        assert!(json.get("unit_of_measurement").is_none());
        assert_eq!(json["available"], true);
    }
}
